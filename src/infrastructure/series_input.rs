// Series ingestion - Row, column or native telemetry payloads
use crate::domain::telemetry::{TelemetrySample, TelemetrySeries};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("row {index}: unparseable timestamp '{value}'")]
    Timestamp { index: usize, value: String },
    #[error("column {column} has {found} values, expected {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RowInput {
    pub timestamp: String,
    #[serde(default)]
    pub vibration_mm_s: Option<f64>,
    #[serde(default)]
    pub bearing_temp_c: Option<f64>,
    #[serde(default)]
    pub motor_current_pu: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInput {
    pub timestamp: Vec<String>,
    #[serde(default)]
    pub vibration_mm_s: Vec<Option<f64>>,
    #[serde(default)]
    pub bearing_temp_c: Vec<Option<f64>>,
    #[serde(default)]
    pub motor_current_pu: Vec<Option<f64>>,
}

/// Telemetry supplied by a caller, in one of the accepted shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SeriesInput {
    RowOriented { rows: Vec<RowInput> },
    ColumnOriented { columns: ColumnInput },
    NativeSeries { series: TelemetrySeries },
}

impl SeriesInput {
    /// Resolve into a time-ordered series. Non-finite values become missing.
    pub fn into_series(self) -> Result<TelemetrySeries, IngestError> {
        let mut samples = match self {
            SeriesInput::RowOriented { rows } => rows
                .into_iter()
                .enumerate()
                .map(|(index, row)| {
                    Ok(TelemetrySample {
                        timestamp: parse_timestamp(index, &row.timestamp)?,
                        vibration_mm_s: row.vibration_mm_s,
                        bearing_temp_c: row.bearing_temp_c,
                        motor_current_pu: row.motor_current_pu,
                    })
                })
                .collect::<Result<Vec<_>, IngestError>>()?,
            SeriesInput::ColumnOriented { columns } => from_columns(columns)?,
            SeriesInput::NativeSeries { series } => series.samples,
        };

        for sample in &mut samples {
            for value in [
                &mut sample.vibration_mm_s,
                &mut sample.bearing_temp_c,
                &mut sample.motor_current_pu,
            ] {
                if value.is_some_and(|v| !v.is_finite()) {
                    *value = None;
                }
            }
        }
        samples.sort_by_key(|s| s.timestamp);

        Ok(TelemetrySeries::new(samples))
    }
}

fn from_columns(columns: ColumnInput) -> Result<Vec<TelemetrySample>, IngestError> {
    let expected = columns.timestamp.len();
    let channels = [
        ("vibration_mm_s", &columns.vibration_mm_s),
        ("bearing_temp_c", &columns.bearing_temp_c),
        ("motor_current_pu", &columns.motor_current_pu),
    ];
    // An omitted column means the channel was not recorded at all.
    for (column, values) in channels {
        if !values.is_empty() && values.len() != expected {
            return Err(IngestError::ColumnLength {
                column,
                expected,
                found: values.len(),
            });
        }
    }

    columns
        .timestamp
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            Ok(TelemetrySample {
                timestamp: parse_timestamp(i, raw)?,
                vibration_mm_s: value_at(&columns.vibration_mm_s, i),
                bearing_temp_c: value_at(&columns.bearing_temp_c, i),
                motor_current_pu: value_at(&columns.motor_current_pu, i),
            })
        })
        .collect()
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// RFC 3339, or a naive timestamp taken as UTC.
fn parse_timestamp(index: usize, raw: &str) -> Result<DateTime<Utc>, IngestError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| IngestError::Timestamp {
            index,
            value: raw.to_string(),
        })
}
