use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// One decoded transmission from the Bresser 5-in-1 outdoor unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: u8,
    pub sensor_type: u8,
    pub temperature_c: f32,
    pub humidity: u8,
    pub wind_direction_deg: f32,
    pub wind_gust_ms: f32,
    pub wind_avg_ms: f32,
    pub rain_mm: f32,
    pub battery_low: bool,
    /// Filled in after decode when a barometer is attached, otherwise 0.
    pub pressure_hpa: f32,
}

/// A reading stamped with the local time it was captured at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferEntry {
    pub captured_at: PrimitiveDateTime,
    pub reading: Reading,
}
