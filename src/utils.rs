/// Utility functions for formatting readings and timestamps
use time::formatting::Formattable;
use time::macros::format_description;
use time::PrimitiveDateTime;

const METERS_SEC_TO_MPH: f32 = 2.237;

/// Format a timestamp for human-readable logging
///
/// Converts a local timestamp to YY-MM-DDTHH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &PrimitiveDateTime) -> String {
    format_with(
        dt,
        format_description!("[year repr:last_two]-[month]-[day]T[hour]:[minute]:[second]"),
    )
}

/// Format a timestamp with any format description, falling back to the
/// default representation on error.
pub fn format_with(dt: &PrimitiveDateTime, description: &(impl Formattable + ?Sized)) -> String {
    dt.format(description).unwrap_or_else(|_| dt.to_string())
}

/// Convert a wind speed in m/s to mph for log output
pub fn ms_to_mph(meters_sec: f32) -> f32 {
    meters_sec * METERS_SEC_TO_MPH
}
