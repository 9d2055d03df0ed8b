/// Database operations for storing delivery records
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;

use crate::upload::DeliveryRecord;

/// Build the INSERT for a record
///
/// Columns are named after the record fields, in record order. Numeric fields
/// travel as text and are cast server-side, so the expected table is:
///
/// ```sql
/// CREATE TABLE weather_data (
///     "date" text, "time" text, "timestamp" text,
///     humidity double precision, rain_mm double precision,
///     temperature_c double precision, wind_avg_ms double precision,
///     wind_gust_ms double precision, wind_direction_deg double precision,
///     pressure_hpa double precision
/// );
/// ```
///
/// `table` must already be a validated identifier.
pub fn insert_statement(table: &str, record: &DeliveryRecord) -> String {
    let columns = record
        .fields()
        .iter()
        .map(|field| format!("\"{}\"", field.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = record
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if field.value.is_numeric() {
                format!("${}::text::double precision", i + 1)
            } else {
                format!("${}", i + 1)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {}({}) VALUES ({})", table, columns, placeholders)
}

/// Insert one record into `table`
///
/// # Returns
/// Number of rows inserted
pub async fn insert_record(
    client: &Client,
    table: &str,
    record: &DeliveryRecord,
) -> Result<u64, tokio_postgres::Error> {
    let values: Vec<&str> = record.fields().iter().map(|field| field.value.as_str()).collect();
    let params: Vec<&(dyn ToSql + Sync)> = values
        .iter()
        .map(|value| value as &(dyn ToSql + Sync))
        .collect();

    client
        .execute(insert_statement(table, record).as_str(), &params)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::record::RecordBuilder;

    #[test]
    fn statement_casts_numeric_fields() {
        let record = RecordBuilder::new()
            .text("time", "12:10:00")
            .numeric("humidity", 89.0, 2)
            .numeric("rain_mm", 54.4, 3)
            .build();

        assert_eq!(
            insert_statement("weather_data", &record),
            "INSERT INTO weather_data(\"time\", \"humidity\", \"rain_mm\") \
             VALUES ($1, $2::text::double precision, $3::text::double precision)"
        );
    }
}
