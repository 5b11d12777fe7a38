// Cutoff policy - Telemetry goes dark from the moment a machine stopped
use crate::domain::machine::{MachineOverview, MachineState, StopEvent};
use crate::domain::telemetry::TelemetrySeries;
use chrono::{DateTime, Utc};

/// Copy of `series` with every sample at or after `cutoff` cleared.
pub fn apply_cutoff(series: &TelemetrySeries, cutoff: Option<DateTime<Utc>>) -> TelemetrySeries {
    let mut truncated = series.clone();
    if let Some(cutoff) = cutoff {
        truncated
            .samples
            .iter_mut()
            .filter(|sample| sample.timestamp >= cutoff)
            .for_each(|sample| sample.clear());
    }
    truncated
}

/// Moment the machine stopped producing telemetry, if any.
///
/// - DOWN: the recorded down start.
/// - IDLE: the start of a stop that is still open, otherwise the start of the
///   most recently started stop.
/// - RUN: never.
pub fn derive_cutoff(machine: &MachineOverview, stops: &[StopEvent]) -> Option<DateTime<Utc>> {
    match machine.state {
        MachineState::Run => None,
        MachineState::Down => machine.down_start_ts,
        MachineState::Idle => stops
            .iter()
            .find(|stop| stop.is_open())
            .or_else(|| stops.iter().max_by_key(|stop| stop.start))
            .map(|stop| stop.start),
    }
}
