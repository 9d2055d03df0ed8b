use time::macros::format_description;

use crate::models::BufferEntry;
use crate::utils::format_with;

/// How a field is presented to the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Passed through as quoted text
    Text(String),
    /// Decimal text to be stored as a number
    Numeric(String),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Text(s) | FieldValue::Numeric(s) => s,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Numeric(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub value: FieldValue,
}

/// One row for the remote sheet/table, fields in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeliveryRecord {
    fields: Vec<Field>,
}

impl DeliveryRecord {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }

    /// Standard row layout for a buffered reading
    ///
    /// Dates use a two-digit year, matching the timestamp captured on the
    /// station: `date` is `YY/MM/DD`, `time` is `HH:MM:SS`, `timestamp` is
    /// `YY-MM-DDTHH:MM:SSZ`.
    pub fn from_entry(entry: &BufferEntry) -> Self {
        let at = &entry.captured_at;
        let reading = &entry.reading;

        RecordBuilder::new()
            .text("date", format_with(at, format_description!("[year repr:last_two]/[month]/[day]")))
            .text("time", format_with(at, format_description!("[hour]:[minute]:[second]")))
            .text(
                "timestamp",
                format_with(
                    at,
                    format_description!(
                        "[year repr:last_two]-[month]-[day]T[hour]:[minute]:[second]Z"
                    ),
                ),
            )
            .numeric("humidity", f32::from(reading.humidity), 2)
            .numeric("rain_mm", reading.rain_mm, 3)
            .numeric("temperature_c", reading.temperature_c, 2)
            .numeric("wind_avg_ms", reading.wind_avg_ms, 2)
            .numeric("wind_gust_ms", reading.wind_gust_ms, 2)
            .numeric("wind_direction_deg", reading.wind_direction_deg, 2)
            .numeric("pressure_hpa", reading.pressure_hpa, 2)
            .build()
    }
}

#[derive(Debug, Default)]
pub struct RecordBuilder {
    fields: Vec<Field>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name,
            value: FieldValue::Text(value.into()),
        });
        self
    }

    /// Numeric field rendered with a fixed number of decimal places.
    pub fn numeric(mut self, name: &'static str, value: f32, decimals: usize) -> Self {
        self.fields.push(Field {
            name,
            value: FieldValue::Numeric(format!("{:.*}", decimals, value)),
        });
        self
    }

    pub fn build(self) -> DeliveryRecord {
        DeliveryRecord {
            fields: self.fields,
        }
    }
}
