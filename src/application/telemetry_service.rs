// Telemetry service - Cached simulation, cutoff, evaluation and telemetry hints
use crate::application::cutoff::{apply_cutoff, derive_cutoff};
use crate::application::evaluator::{compute_alarms, summarize};
use crate::application::signal_generator::{SignalGenerator, SimulationError};
use crate::application::telemetry_cache::{CacheKey, TelemetryCache};
use crate::domain::economics::Economics;
use crate::domain::hint::{DisabledReport, NoDataReport, TelemetryHint, TelemetryReport};
use crate::domain::machine::{MachineOverview, MachineState, StopEvent, Tier};
use crate::domain::maintenance::Priority;
use crate::domain::telemetry::{
    AlarmLevel, AlarmStatus, TelemetrySeries, TelemetrySummary, TelemetryThresholds,
};
use crate::infrastructure::config::TelemetrySettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

const DISABLED_REASON: &str = "telemetry feature flag is off";
const NO_DATA_REASON: &str = "no link or data, or cut off by machine state";

/// Cutoff-applied series with its evaluation, as shown on a chart.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryView {
    pub machine_id: String,
    pub state: MachineState,
    pub cutoff_ts: Option<DateTime<Utc>>,
    pub series: TelemetrySeries,
    pub summary: TelemetrySummary,
    pub alarms: AlarmStatus,
    pub thresholds: TelemetryThresholds,
}

#[derive(Debug, Clone)]
pub struct TelemetryService {
    enabled: bool,
    tier: Tier,
    generator: SignalGenerator,
    thresholds: TelemetryThresholds,
}

impl TelemetryService {
    pub fn new(enabled: bool, tier: Tier, settings: &TelemetrySettings) -> Result<Self, SimulationError> {
        Ok(Self {
            enabled,
            tier,
            generator: SignalGenerator::new(settings.window_minutes, settings.sample_step_sec)?,
            thresholds: settings.thresholds,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn thresholds(&self) -> TelemetryThresholds {
        self.thresholds
    }

    /// The pre-cutoff series for the machine's current state, generated on
    /// first access within the session.
    pub fn canonical_series(
        &self,
        cache: &mut TelemetryCache,
        machine: &MachineOverview,
        now: DateTime<Utc>,
    ) -> Result<Arc<TelemetrySeries>, SimulationError> {
        let key = CacheKey::new(self.tier, machine.machine_id.clone(), machine.state);
        cache.get_or_try_insert_with(key, || {
            self.generator
                .generate(&machine.machine_id, self.tier, machine.state, now)
        })
    }

    pub fn view(
        &self,
        cache: &mut TelemetryCache,
        machine: &MachineOverview,
        stops: &[StopEvent],
        now: DateTime<Utc>,
    ) -> Result<TelemetryView, SimulationError> {
        let canonical = self.canonical_series(cache, machine, now)?;
        let cutoff_ts = derive_cutoff(machine, stops);
        let series = apply_cutoff(&canonical, cutoff_ts);

        Ok(TelemetryView {
            machine_id: machine.machine_id.clone(),
            state: machine.state,
            cutoff_ts,
            summary: summarize(&series),
            alarms: compute_alarms(&series, &self.thresholds),
            thresholds: self.thresholds,
            series,
        })
    }

    /// Bundle the telemetry evidence handed to recommendations and requests.
    pub fn build_hint(
        &self,
        cache: &mut TelemetryCache,
        machine: &MachineOverview,
        stops: &[StopEvent],
        economics: Option<Economics>,
        now: DateTime<Utc>,
    ) -> Result<TelemetryHint, SimulationError> {
        if !self.enabled {
            return Ok(TelemetryHint::Disabled(DisabledReport {
                reason: DISABLED_REASON.to_string(),
                economics,
            }));
        }

        let view = self.view(cache, machine, stops, now)?;

        if !view.series.has_any_value() {
            tracing::info!(
                "No telemetry for {} in state {} (cutoff: {:?})",
                machine.machine_id,
                machine.state,
                view.cutoff_ts
            );
            return Ok(TelemetryHint::NoData(NoDataReport {
                reason: NO_DATA_REASON.to_string(),
                state: machine.state,
                cutoff_ts: view.cutoff_ts,
                economics,
            }));
        }

        Ok(TelemetryHint::Ok(TelemetryReport {
            state: machine.state,
            cutoff_ts: view.cutoff_ts,
            last: view.summary.last(),
            max: view.summary.max(),
            alarms: view.alarms,
            thresholds: self.thresholds,
            window_minutes: self.generator.window_minutes(),
            sample_step_sec: self.generator.step_seconds(),
            economics,
        }))
    }
}

/// Default request priority from a telemetry hint. Never returns `Low`;
/// only a person downgrades a request.
pub fn infer_priority(hint: Option<&TelemetryHint>) -> Priority {
    let Some(report) = hint.and_then(TelemetryHint::report) else {
        return Priority::Medium;
    };

    if report.alarms.any(AlarmLevel::Alarm) {
        Priority::Critical
    } else if report.alarms.any(AlarmLevel::Warn) {
        Priority::High
    } else {
        Priority::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::evaluator::classify;
    use crate::domain::hint::TelemetryStatus;
    use crate::domain::machine::{ShiftInfo, StopReason};
    use crate::domain::telemetry::ChannelReadings;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn machine(id: &str, state: MachineState) -> MachineOverview {
        MachineOverview::new(
            id,
            id,
            "CNC",
            state,
            ShiftInfo {
                start: at(8, 0),
                end: at(16, 0),
            },
        )
    }

    fn service(enabled: bool) -> TelemetryService {
        TelemetryService::new(enabled, Tier::Standard, &TelemetrySettings::default()).unwrap()
    }

    fn ok_hint(alarms: AlarmStatus) -> TelemetryHint {
        TelemetryHint::Ok(TelemetryReport {
            state: MachineState::Run,
            cutoff_ts: None,
            last: ChannelReadings::default(),
            max: ChannelReadings::default(),
            alarms,
            thresholds: TelemetryThresholds::default(),
            window_minutes: 240,
            sample_step_sec: 30,
            economics: None,
        })
    }

    #[test]
    fn test_idle_machine_with_open_stop() {
        let service = service(true);
        let mut cache = TelemetryCache::new();
        let lathe = machine("CNC-LATHE-1", MachineState::Idle);
        let stops = vec![
            StopEvent::new(at(9, 0), Some(at(9, 20)), StopReason::Setup, None),
            StopEvent::new(at(10, 0), None, StopReason::Fault, Some("Door sensor")),
        ];

        let view = service.view(&mut cache, &lathe, &stops, at(12, 0)).unwrap();
        assert_eq!(view.cutoff_ts, Some(at(10, 0)));
        assert_eq!(view.series.samples.first().unwrap().timestamp, at(8, 0));
        assert_eq!(view.series.samples.last().unwrap().timestamp, at(12, 0));

        for sample in &view.series.samples {
            if sample.timestamp >= at(10, 0) {
                assert!(!sample.has_any_value());
            } else {
                assert!(sample.readings().is_some());
            }
        }

        // "Last" comes from the final sample before the stop.
        let canonical = cache
            .get(&CacheKey::new(Tier::Standard, "CNC-LATHE-1", MachineState::Idle))
            .unwrap();
        let expected = canonical
            .samples
            .iter()
            .find(|s| s.timestamp == at(10, 0) - Duration::seconds(30))
            .and_then(|s| s.readings())
            .unwrap();
        assert_eq!(view.summary.vibration_last, Some(expected.vibration_mm_s));
        assert_eq!(view.summary.temp_last, Some(expected.bearing_temp_c));
        assert_eq!(view.summary.current_last, Some(expected.motor_current_pu));

        let thr = TelemetryThresholds::default();
        assert_eq!(
            view.alarms,
            AlarmStatus {
                vibration: classify(expected.vibration_mm_s, thr.vibration_warn, thr.vibration_alarm),
                temperature: classify(expected.bearing_temp_c, thr.temp_warn, thr.temp_alarm),
                current: classify(expected.motor_current_pu, thr.current_warn, thr.current_alarm),
            }
        );

        // The cached canonical series keeps its post-stop values.
        assert!(canonical.samples.last().unwrap().readings().is_some());
    }

    #[test]
    fn test_repeated_reads_reuse_cached_series() {
        let service = service(true);
        let mut cache = TelemetryCache::new();
        let mill = machine("CNC-MILL-1", MachineState::Run);

        let first = service.canonical_series(&mut cache, &mill, at(12, 0)).unwrap();
        let second = service.canonical_series(&mut cache, &mill, at(13, 0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.samples.last().unwrap().timestamp, at(12, 0));
    }

    #[test]
    fn test_running_machine_hint_is_ok() {
        let service = service(true);
        let mut cache = TelemetryCache::new();
        let mill = machine("CNC-MILL-1", MachineState::Run);
        let stops = vec![StopEvent::new(at(10, 0), None, StopReason::Fault, None)];

        let hint = service.build_hint(&mut cache, &mill, &stops, None, at(12, 0)).unwrap();
        let report = hint.report().expect("running machine has telemetry");
        assert_eq!(report.cutoff_ts, None);
        assert!(report.last.vibration_mm_s.is_some());
        assert!(report.max.bearing_temp_c.is_some());
        assert_eq!(report.window_minutes, 240);
        assert_eq!(report.sample_step_sec, 30);
    }

    #[test]
    fn test_down_machine_hint_is_no_data() {
        let service = service(true);
        let mut cache = TelemetryCache::new();
        let mut cut = machine("CNC-CUT-1", MachineState::Down);
        cut.down_start_ts = Some(at(10, 20));

        let hint = service.build_hint(&mut cache, &cut, &[], None, at(12, 0)).unwrap();
        assert_eq!(hint.status(), TelemetryStatus::NoData);
        match hint {
            TelemetryHint::NoData(report) => {
                assert_eq!(report.cutoff_ts, Some(at(10, 20)));
                assert_eq!(report.state, MachineState::Down);
            }
            other => panic!("unexpected hint: {other:?}"),
        }
    }

    #[test]
    fn test_disabled_hint_carries_economics() {
        let service = service(false);
        let mut cache = TelemetryCache::new();
        let mill = machine("CNC-MILL-1", MachineState::Run);
        let economics = Economics::what_if(&Default::default(), 2.0);

        let hint = service
            .build_hint(&mut cache, &mill, &[], Some(economics.clone()), at(12, 0))
            .unwrap();
        assert_eq!(hint.status(), TelemetryStatus::Disabled);
        assert_eq!(hint.economics(), Some(&economics));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_infer_priority() {
        let alarm = AlarmStatus {
            vibration: AlarmLevel::Alarm,
            ..AlarmStatus::all_ok()
        };
        let warn = AlarmStatus {
            vibration: AlarmLevel::Warn,
            ..AlarmStatus::all_ok()
        };
        let mixed = AlarmStatus {
            vibration: AlarmLevel::Warn,
            current: AlarmLevel::Alarm,
            ..AlarmStatus::all_ok()
        };

        assert_eq!(infer_priority(Some(&ok_hint(alarm))), Priority::Critical);
        assert_eq!(infer_priority(Some(&ok_hint(warn))), Priority::High);
        assert_eq!(infer_priority(Some(&ok_hint(mixed))), Priority::Critical);
        assert_eq!(infer_priority(Some(&ok_hint(AlarmStatus::all_ok()))), Priority::Medium);

        let no_data = TelemetryHint::NoData(NoDataReport {
            reason: NO_DATA_REASON.to_string(),
            state: MachineState::Down,
            cutoff_ts: None,
            economics: None,
        });
        assert_eq!(infer_priority(Some(&no_data)), Priority::Medium);
        assert_eq!(infer_priority(None), Priority::Medium);
    }
}
