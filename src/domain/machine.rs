// Machine domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineState {
    Run,
    Idle,
    Down,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Run => "RUN",
            MachineState::Idle => "IDLE",
            MachineState::Down => "DOWN",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equipment sophistication level of the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Basic,
    Standard,
    Advanced,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "BASIC",
            Tier::Standard => "STANDARD",
            Tier::Advanced => "ADVANCED",
        }
    }

    /// Number of transient spikes injected into a running machine's series.
    pub fn spike_count(&self) -> usize {
        match self {
            Tier::Basic => 2,
            Tier::Standard => 3,
            Tier::Advanced => 4,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DownReason {
    Maint,
    Repair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftInfo {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineOverview {
    pub machine_id: String,
    pub name: String,
    pub kind: String,
    pub state: MachineState,
    pub shift: ShiftInfo,
    #[serde(default)]
    pub stops_count: u32,
    #[serde(default)]
    pub run_time_hours: f64,
    #[serde(default)]
    pub planned_time_hours: f64,
    pub oee_percent: Option<f64>,
    pub down_start_ts: Option<DateTime<Utc>>,
    pub down_reason: Option<DownReason>,
}

impl MachineOverview {
    pub fn new(
        machine_id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        state: MachineState,
        shift: ShiftInfo,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            name: name.into(),
            kind: kind.into(),
            state,
            shift,
            stops_count: 0,
            run_time_hours: 0.0,
            planned_time_hours: 0.0,
            oee_percent: None,
            down_start_ts: None,
            down_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StopReason {
    Setup,
    Fault,
    Microstop,
    Repair,
    Maint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopEvent {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub reason: StopReason,
    pub note: Option<String>,
}

impl StopEvent {
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        reason: StopReason,
        note: Option<&str>,
    ) -> Self {
        Self {
            start,
            end,
            reason,
            note: note.map(str::to_string),
        }
    }

    /// A stop without a recorded end is still in progress.
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn duration_min(&self) -> Option<f64> {
        self.end
            .map(|end| (end - self.start).num_seconds() as f64 / 60.0)
    }
}
