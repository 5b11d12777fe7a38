// Telemetry hint passed to the recommendation and maintenance-request paths
use super::economics::Economics;
use super::machine::MachineState;
use super::telemetry::{AlarmStatus, ChannelReadings, TelemetryThresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryStatus {
    Ok,
    NoData,
    Disabled,
    Unknown,
}

impl fmt::Display for TelemetryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TelemetryStatus::Ok => "OK",
            TelemetryStatus::NoData => "NO_DATA",
            TelemetryStatus::Disabled => "DISABLED",
            TelemetryStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryHint {
    Ok(TelemetryReport),
    NoData(NoDataReport),
    Disabled(DisabledReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub state: MachineState,
    pub cutoff_ts: Option<DateTime<Utc>>,
    pub last: ChannelReadings,
    pub max: ChannelReadings,
    pub alarms: AlarmStatus,
    pub thresholds: TelemetryThresholds,
    pub window_minutes: u32,
    pub sample_step_sec: u32,
    pub economics: Option<Economics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoDataReport {
    pub reason: String,
    pub state: MachineState,
    pub cutoff_ts: Option<DateTime<Utc>>,
    pub economics: Option<Economics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisabledReport {
    pub reason: String,
    pub economics: Option<Economics>,
}

impl TelemetryHint {
    pub fn status(&self) -> TelemetryStatus {
        match self {
            TelemetryHint::Ok(_) => TelemetryStatus::Ok,
            TelemetryHint::NoData(_) => TelemetryStatus::NoData,
            TelemetryHint::Disabled(_) => TelemetryStatus::Disabled,
        }
    }

    pub fn report(&self) -> Option<&TelemetryReport> {
        match self {
            TelemetryHint::Ok(report) => Some(report),
            _ => None,
        }
    }

    pub fn economics(&self) -> Option<&Economics> {
        match self {
            TelemetryHint::Ok(report) => report.economics.as_ref(),
            TelemetryHint::NoData(report) => report.economics.as_ref(),
            TelemetryHint::Disabled(report) => report.economics.as_ref(),
        }
    }
}
