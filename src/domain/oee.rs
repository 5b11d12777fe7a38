// OEE domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OeePoint {
    pub timestamp: DateTime<Utc>,
    pub oee_percent: f64,
}

impl OeePoint {
    pub fn new(timestamp: DateTime<Utc>, oee_percent: f64) -> Self {
        Self {
            timestamp,
            oee_percent,
        }
    }
}

/// OEE in percent from availability, performance and quality ratios (0..1),
/// rounded to one decimal.
pub fn calc_oee_percent(availability: f64, performance: f64, quality: f64) -> f64 {
    (availability * performance * quality * 1000.0).round_ties_even() / 10.0
}
