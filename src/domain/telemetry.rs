// Telemetry data domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One sensor read. A missing channel is `None`, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub vibration_mm_s: Option<f64>,
    pub bearing_temp_c: Option<f64>,
    pub motor_current_pu: Option<f64>,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Utc>, vibration: f64, temperature: f64, current: f64) -> Self {
        Self {
            timestamp,
            vibration_mm_s: Some(vibration),
            bearing_temp_c: Some(temperature),
            motor_current_pu: Some(current),
        }
    }

    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            vibration_mm_s: None,
            bearing_temp_c: None,
            motor_current_pu: None,
        }
    }

    /// Values of a complete read, `None` unless all three channels are present.
    pub fn readings(&self) -> Option<ChannelValues> {
        Some(ChannelValues {
            vibration_mm_s: self.vibration_mm_s?,
            bearing_temp_c: self.bearing_temp_c?,
            motor_current_pu: self.motor_current_pu?,
        })
    }

    pub fn has_any_value(&self) -> bool {
        self.vibration_mm_s.is_some() || self.bearing_temp_c.is_some() || self.motor_current_pu.is_some()
    }

    pub fn clear(&mut self) {
        self.vibration_mm_s = None;
        self.bearing_temp_c = None;
        self.motor_current_pu = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelValues {
    pub vibration_mm_s: f64,
    pub bearing_temp_c: f64,
    pub motor_current_pu: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySeries {
    pub samples: Vec<TelemetrySample>,
}

impl TelemetrySeries {
    pub fn new(samples: Vec<TelemetrySample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if at least one channel of one sample carries a value.
    pub fn has_any_value(&self) -> bool {
        self.samples.iter().any(TelemetrySample::has_any_value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("{channel} thresholds must be finite numbers")]
    NotFinite { channel: &'static str },
    #[error("{channel} warn threshold {warn} must be below alarm threshold {alarm}")]
    Inverted {
        channel: &'static str,
        warn: f64,
        alarm: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryThresholds {
    pub vibration_warn: f64,
    pub vibration_alarm: f64,
    pub temp_warn: f64,
    pub temp_alarm: f64,
    pub current_warn: f64,
    pub current_alarm: f64,
}

impl Default for TelemetryThresholds {
    fn default() -> Self {
        Self {
            vibration_warn: 8.0,
            vibration_alarm: 11.0,
            temp_warn: 80.0,
            temp_alarm: 92.0,
            current_warn: 0.85,
            current_alarm: 0.95,
        }
    }
}

impl TelemetryThresholds {
    pub fn new(
        vibration_warn: f64,
        vibration_alarm: f64,
        temp_warn: f64,
        temp_alarm: f64,
        current_warn: f64,
        current_alarm: f64,
    ) -> Result<Self, ThresholdError> {
        let thresholds = Self {
            vibration_warn,
            vibration_alarm,
            temp_warn,
            temp_alarm,
            current_warn,
            current_alarm,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (channel, warn, alarm) in [
            ("vibration", self.vibration_warn, self.vibration_alarm),
            ("temperature", self.temp_warn, self.temp_alarm),
            ("current", self.current_warn, self.current_alarm),
        ] {
            if !warn.is_finite() || !alarm.is_finite() {
                return Err(ThresholdError::NotFinite { channel });
            }
            if warn >= alarm {
                return Err(ThresholdError::Inverted {
                    channel,
                    warn,
                    alarm,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    Ok,
    Warn,
    Alarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStatus {
    pub vibration: AlarmLevel,
    pub temperature: AlarmLevel,
    pub current: AlarmLevel,
}

impl AlarmStatus {
    pub fn all_ok() -> Self {
        Self {
            vibration: AlarmLevel::Ok,
            temperature: AlarmLevel::Ok,
            current: AlarmLevel::Ok,
        }
    }

    pub fn levels(&self) -> [AlarmLevel; 3] {
        [self.vibration, self.temperature, self.current]
    }

    pub fn any(&self, level: AlarmLevel) -> bool {
        self.levels().contains(&level)
    }
}

/// Per-channel values where any entry may be undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelReadings {
    pub vibration_mm_s: Option<f64>,
    pub bearing_temp_c: Option<f64>,
    pub motor_current_pu: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub vibration_last: Option<f64>,
    pub temp_last: Option<f64>,
    pub current_last: Option<f64>,
    pub vibration_max: Option<f64>,
    pub temp_max: Option<f64>,
    pub current_max: Option<f64>,
}

impl TelemetrySummary {
    pub fn last(&self) -> ChannelReadings {
        ChannelReadings {
            vibration_mm_s: self.vibration_last,
            bearing_temp_c: self.temp_last,
            motor_current_pu: self.current_last,
        }
    }

    pub fn max(&self) -> ChannelReadings {
        ChannelReadings {
            vibration_mm_s: self.vibration_max,
            bearing_temp_c: self.temp_max,
            motor_current_pu: self.current_max,
        }
    }
}
