use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use time::macros::format_description;
use time::UtcOffset;
use tokio::time::Duration;

use crate::forecast::{Hemisphere, Zambretti};
use crate::storage::buffer::DEFAULT_CAPACITY;

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub frame_source: PathBuf,
    pub receive_timeout: Duration,
    pub database_url: String,
    pub weather_table: String,
    pub buffer_path: Option<PathBuf>,
    pub buffer_capacity: usize,
    pub pressure_sensor_path: Option<PathBuf>,
    pub schedule_path: Option<PathBuf>,
    pub interval_minutes: u32,
    pub utc_offset: UtcOffset,
    pub altitude_m: f32,
    pub hemisphere: Hemisphere,
    pub zambretti: Zambretti,
}

impl StationConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        info!(
            "Frames from {}, sampling every {} minute(s), delivering to table {}",
            config.frame_source.display(),
            config.interval_minutes,
            config.weather_table
        );
        match &config.buffer_path {
            Some(path) => info!("Buffering up to {} reading(s) in {}", config.buffer_capacity, path.display()),
            None => info!("Buffering up to {} reading(s) in memory", config.buffer_capacity),
        }
        Ok(config)
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let frame_source = value("FRAME_SOURCE").ok_or("FRAME_SOURCE environment variable not set")?;
        let database_url = value("DATABASE_URL").ok_or("DATABASE_URL environment variable not set")?;

        let weather_table = value("WEATHER_TABLE").unwrap_or_else(|| "weather_data".to_string());
        if !is_identifier(&weather_table) {
            return Err(format!("WEATHER_TABLE '{}' is not a valid table name", weather_table).into());
        }

        let interval_minutes: u32 = parse_or(&value, "SAMPLE_INTERVAL_MINUTES", 10)?;
        if interval_minutes == 0 || 60 % interval_minutes != 0 {
            return Err(format!(
                "SAMPLE_INTERVAL_MINUTES must divide an hour evenly, got {}",
                interval_minutes
            )
            .into());
        }

        let utc_offset = match value("UTC_OFFSET") {
            Some(text) => UtcOffset::parse(&text, format_description!("[offset_hour]:[offset_minute]"))
                .map_err(|e| format!("UTC_OFFSET '{}' is invalid: {}", text, e))?,
            None => UtcOffset::UTC,
        };

        let zambretti = Zambretti {
            baro_low_hpa: parse_or(&value, "BARO_LOW_HPA", 950.0)?,
            baro_high_hpa: parse_or(&value, "BARO_HIGH_HPA", 1050.0)?,
        };
        if zambretti.baro_low_hpa >= zambretti.baro_high_hpa {
            return Err("BARO_LOW_HPA must be below BARO_HIGH_HPA".into());
        }

        Ok(StationConfig {
            frame_source: PathBuf::from(frame_source),
            receive_timeout: Duration::from_secs(parse_or(&value, "RECEIVE_TIMEOUT_SECS", 30)?),
            database_url,
            weather_table,
            buffer_path: value("BUFFER_PATH").map(PathBuf::from),
            buffer_capacity: parse_or(&value, "BUFFER_CAPACITY", DEFAULT_CAPACITY)?,
            pressure_sensor_path: value("PRESSURE_SENSOR_PATH").map(PathBuf::from),
            schedule_path: value("SCHEDULE_PATH").map(PathBuf::from),
            interval_minutes,
            utc_offset,
            altitude_m: parse_or(&value, "ALTITUDE_METRES", 0.0)?,
            hemisphere: parse_or(&value, "HEMISPHERE", Hemisphere::North)?,
            zambretti,
        })
    }
}

fn parse_or<T, V>(value: &V, key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match value(key) {
        Some(text) => text
            .parse()
            .map_err(|e| format!("{} '{}' is invalid: {}", key, text, e).into()),
        None => Ok(default),
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
