/// Local weather forecast from pressure trend, wind direction and season
///
/// A near-enough Zambretti forecaster: sea-level pressure is shifted by
/// wind-direction and seasonal-trend corrections, placed in one of 22 bands of
/// the local barometer window, and looked up in rise/steady/fall tables.
use std::fmt;
use std::str::FromStr;

use crate::models::Reading;

/// Readings kept for the trend: 3 hours at 6 readings per hour.
const HISTORY_LEN: usize = 18;
/// Change over the history that counts as rising or falling.
const TREND_THRESHOLD_HPA: f32 = 1.6;
const LAPSE_RATE: f32 = 0.0065; // K per metre
const BAND_COUNT: i32 = 22;

const FORECAST_TEXT: [&str; 26] = [
    "Settled fine",
    "Fine weather",
    "Becoming fine",
    "Fine, becoming less settled",
    "Fine, possible showers",
    "Fairly fine, improving",
    "Fairly fine, possible showers early",
    "Fairly fine, showery later",
    "Showery early, improving",
    "Changeable, mending",
    "Fairly fine, showers likely",
    "Rather unsettled clearing later",
    "Unsettled, probably improving",
    "Showery, bright intervals",
    "Showery, becoming less settled",
    "Changeable, some rain",
    "Unsettled, short fine intervals",
    "Unsettled, rain later",
    "Unsettled, some rain",
    "Mostly very unsettled",
    "Occasional rain, worsening",
    "Rain at times, very unsettled",
    "Rain at frequent intervals",
    "Rain, very unsettled",
    "Stormy, may improve",
    "Stormy, much rain",
];

// Zambretti dial window letters A-Z per pressure band
const RISE_OPTIONS: [u8; 22] = [
    25, 25, 25, 24, 24, 19, 16, 12, 11, 9, 8, 6, 5, 2, 1, 1, 0, 0, 0, 0, 0, 0,
];
const STEADY_OPTIONS: [u8; 22] = [
    25, 25, 25, 25, 25, 25, 23, 23, 22, 18, 15, 13, 10, 4, 1, 1, 0, 0, 0, 0, 0, 0,
];
const FALL_OPTIONS: [u8; 22] = [
    25, 25, 25, 25, 25, 25, 25, 25, 23, 23, 21, 20, 17, 14, 7, 3, 1, 1, 1, 0, 0, 0,
];

/// Pressure correction in percent of the barometer window, indexed by compass
/// point for the northern hemisphere. The southern table is this one rotated
/// by half a turn.
const WIND_ADJUST_PCT: [f32; 16] = [
    6.0, 5.0, 5.0, 2.0, -0.5, -2.0, -5.0, -8.5, -12.0, -10.0, -6.0, -4.5, -3.0, -0.5, 1.5, 3.0,
];
const TREND_ADJUST_PCT: f32 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
}

impl FromStr for Hemisphere {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Ok(Hemisphere::North),
            "south" | "s" => Ok(Hemisphere::South),
            other => Err(format!("unknown hemisphere '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassPoint {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassPoint {
    const ALL: [CompassPoint; 16] = [
        CompassPoint::N,
        CompassPoint::NNE,
        CompassPoint::NE,
        CompassPoint::ENE,
        CompassPoint::E,
        CompassPoint::ESE,
        CompassPoint::SE,
        CompassPoint::SSE,
        CompassPoint::S,
        CompassPoint::SSW,
        CompassPoint::SW,
        CompassPoint::WSW,
        CompassPoint::W,
        CompassPoint::WNW,
        CompassPoint::NW,
        CompassPoint::NNW,
    ];
    const SECTOR_DEG: f32 = 360.0 / 16.0;

    /// Nearest of the 16 compass points.
    pub fn from_degrees(degrees: f32) -> Self {
        let sector = ((degrees + Self::SECTOR_DEG / 2.0).rem_euclid(360.0) / Self::SECTOR_DEG) as usize;
        Self::ALL[sector.min(15)]
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureTrend {
    Steady,
    Rising,
    Falling,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forecast {
    pub code: u8,
    pub text: &'static str,
    /// Pressure fell outside the barometer window
    pub extreme: bool,
}

/// Reduce station pressure to sea level (hypsometric approximation).
pub fn altitude_normalized_pressure(pressure_hpa: f32, temp_c: f32, altitude_m: f32) -> f32 {
    let lapse = LAPSE_RATE * altitude_m;
    pressure_hpa * (1.0 - lapse / (temp_c + lapse + 273.15)).powf(-5.257)
}

/// Ring of the most recent sea-level pressure readings.
#[derive(Debug, Clone, Default)]
pub struct PressureHistory {
    readings: [f32; HISTORY_LEN],
    next: usize,
    recorded: usize,
}

impl PressureHistory {
    pub fn record(&mut self, normalized_hpa: f32) {
        self.readings[self.next] = normalized_hpa;
        self.next = (self.next + 1) % HISTORY_LEN;
        self.recorded = (self.recorded + 1).min(HISTORY_LEN);
    }

    pub fn last(&self) -> Option<f32> {
        if self.recorded == 0 {
            return None;
        }
        Some(self.readings[(self.next + HISTORY_LEN - 1) % HISTORY_LEN])
    }

    /// Newest minus oldest once the full three hours are recorded.
    pub fn trend(&self) -> PressureTrend {
        if self.recorded < HISTORY_LEN {
            return PressureTrend::Unknown;
        }
        let oldest = self.readings[self.next];
        let newest = self.readings[(self.next + HISTORY_LEN - 1) % HISTORY_LEN];
        let difference = newest - oldest;
        if difference <= -TREND_THRESHOLD_HPA {
            PressureTrend::Falling
        } else if difference >= TREND_THRESHOLD_HPA {
            PressureTrend::Rising
        } else {
            PressureTrend::Steady
        }
    }
}

/// Local barometer window, e.g. 950-1050 hPa for the UK.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zambretti {
    pub baro_low_hpa: f32,
    pub baro_high_hpa: f32,
}

impl Zambretti {
    pub fn cast(
        &self,
        normalized_hpa: f32,
        month: u8,
        wind: CompassPoint,
        trend: PressureTrend,
        hemisphere: Hemisphere,
    ) -> Forecast {
        let range = self.baro_high_hpa - self.baro_low_hpa;
        let band_width = ((range / BAND_COUNT as f32) * 1000.0) as i32 as f32 / 1000.0;
        let percent = |pct: f32| pct / 100.0 * range;
        let summer = (4..=9).contains(&month);

        let (rotation, trend_season) = match hemisphere {
            Hemisphere::North => (0, summer),
            Hemisphere::South => (8, !summer),
        };

        let mut hpa = normalized_hpa + percent(WIND_ADJUST_PCT[(wind.index() + rotation) % 16]);
        if trend_season {
            match trend {
                PressureTrend::Rising => hpa += percent(TREND_ADJUST_PCT),
                PressureTrend::Falling => hpa -= percent(TREND_ADJUST_PCT),
                _ => {}
            }
        }
        if hpa == self.baro_high_hpa {
            hpa = self.baro_high_hpa - 1.0;
        }

        let band = ((hpa - self.baro_low_hpa) / band_width).floor() as i32;
        let extreme = !(0..BAND_COUNT).contains(&band);
        let band = band.clamp(0, BAND_COUNT - 1) as usize;

        let code = match trend {
            PressureTrend::Rising => RISE_OPTIONS[band],
            PressureTrend::Falling => FALL_OPTIONS[band],
            _ => STEADY_OPTIONS[band],
        };
        Forecast {
            code,
            text: FORECAST_TEXT[usize::from(code)],
            extreme,
        }
    }
}

/// Feeds readings with pressure into the history and casts a forecast once
/// the trend is known.
#[derive(Debug, Clone)]
pub struct Forecaster {
    history: PressureHistory,
    zambretti: Zambretti,
    altitude_m: f32,
    hemisphere: Hemisphere,
}

impl Forecaster {
    pub fn new(zambretti: Zambretti, altitude_m: f32, hemisphere: Hemisphere) -> Self {
        Self {
            history: PressureHistory::default(),
            zambretti,
            altitude_m,
            hemisphere,
        }
    }

    pub fn trend(&self) -> PressureTrend {
        self.history.trend()
    }

    /// Record a reading; readings without pressure are ignored.
    pub fn observe(&mut self, reading: &Reading, month: u8) -> Option<Forecast> {
        if reading.pressure_hpa <= 0.0 {
            return None;
        }
        let normalized =
            altitude_normalized_pressure(reading.pressure_hpa, reading.temperature_c, self.altitude_m);
        self.history.record(normalized);

        let trend = self.history.trend();
        if trend == PressureTrend::Unknown {
            return None;
        }
        let latest = self.history.last()?;
        Some(self.zambretti.cast(
            latest,
            month,
            CompassPoint::from_degrees(reading.wind_direction_deg),
            trend,
            self.hemisphere,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UK: Zambretti = Zambretti {
        baro_low_hpa: 950.0,
        baro_high_hpa: 1050.0,
    };

    #[test]
    fn rounds_to_nearest_compass_point() {
        assert_eq!(CompassPoint::from_degrees(0.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(11.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(12.0), CompassPoint::NNE);
        assert_eq!(CompassPoint::from_degrees(225.0), CompassPoint::SW);
        assert_eq!(CompassPoint::from_degrees(337.5), CompassPoint::NNW);
        assert_eq!(CompassPoint::from_degrees(355.0), CompassPoint::N);
        assert_eq!(CompassPoint::SW.to_string(), "SW");
    }

    #[test]
    fn normalizes_to_sea_level() {
        assert_eq!(altitude_normalized_pressure(1000.0, 15.0, 0.0), 1000.0);
        let normalized = altitude_normalized_pressure(1000.0, 15.0, 100.0);
        assert!((1011.5..1012.3).contains(&normalized), "{}", normalized);
    }

    #[test]
    fn trend_needs_three_hours_of_readings() {
        let mut history = PressureHistory::default();
        for i in 0..HISTORY_LEN - 1 {
            history.record(1020.0 - i as f32 * 0.5);
        }
        assert_eq!(history.trend(), PressureTrend::Unknown);

        history.record(1011.5);
        assert_eq!(history.trend(), PressureTrend::Falling);
        assert_eq!(history.last(), Some(1011.5));
    }

    #[test]
    fn trend_uses_oldest_retained_reading() {
        let mut history = PressureHistory::default();
        for _ in 0..HISTORY_LEN {
            history.record(1000.0);
        }
        assert_eq!(history.trend(), PressureTrend::Steady);

        // Wrap around: the oldest slot is overwritten each time
        for i in 1..=HISTORY_LEN {
            history.record(1000.0 + i as f32 * 0.1);
        }
        assert_eq!(history.trend(), PressureTrend::Rising);
    }

    #[test]
    fn casts_steady_northerly_winter() {
        let forecast = UK.cast(
            1000.0,
            1,
            CompassPoint::N,
            PressureTrend::Steady,
            Hemisphere::North,
        );
        assert_eq!(forecast.code, 10);
        assert_eq!(forecast.text, "Fairly fine, showers likely");
        assert!(!forecast.extreme);
    }

    #[test]
    fn flags_pressure_outside_window() {
        let high = UK.cast(1100.0, 1, CompassPoint::N, PressureTrend::Steady, Hemisphere::North);
        assert_eq!(high.text, "Settled fine");
        assert!(high.extreme);

        let low = UK.cast(900.0, 1, CompassPoint::S, PressureTrend::Steady, Hemisphere::North);
        assert_eq!(low.text, "Stormy, much rain");
        assert!(low.extreme);
    }

    #[test]
    fn southern_summer_applies_trend() {
        let forecast = UK.cast(
            1000.0,
            1,
            CompassPoint::S,
            PressureTrend::Rising,
            Hemisphere::South,
        );
        assert_eq!(forecast.code, 2);
        assert_eq!(forecast.text, "Becoming fine");
    }

    #[test]
    fn forecaster_waits_for_history_and_skips_missing_pressure() {
        let mut forecaster = Forecaster::new(UK, 0.0, Hemisphere::North);
        let mut reading = Reading {
            pressure_hpa: 0.0,
            ..Default::default()
        };
        assert_eq!(forecaster.observe(&reading, 6), None);
        assert_eq!(forecaster.trend(), PressureTrend::Unknown);

        reading.pressure_hpa = 1000.0;
        for _ in 0..HISTORY_LEN - 1 {
            assert_eq!(forecaster.observe(&reading, 6), None);
        }
        let forecast = forecaster.observe(&reading, 6).unwrap();
        assert_eq!(forecaster.trend(), PressureTrend::Steady);
        assert_eq!(forecast.code, 10);
    }

    #[test]
    fn parses_hemisphere() {
        assert_eq!("North".parse::<Hemisphere>(), Ok(Hemisphere::North));
        assert_eq!(" s ".parse::<Hemisphere>(), Ok(Hemisphere::South));
        assert!("east".parse::<Hemisphere>().is_err());
    }
}
