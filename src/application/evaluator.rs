// Summary and alarm evaluation over partially missing telemetry
use crate::domain::telemetry::{
    AlarmLevel, AlarmStatus, ChannelValues, TelemetrySample, TelemetrySeries, TelemetrySummary,
    TelemetryThresholds,
};

/// Classify one value against its warn/alarm thresholds.
pub fn classify(value: f64, warn: f64, alarm: f64) -> AlarmLevel {
    if value >= alarm {
        AlarmLevel::Alarm
    } else if value >= warn {
        AlarmLevel::Warn
    } else {
        AlarmLevel::Ok
    }
}

/// Most recent sample where all three channels were read together.
pub fn last_complete_reading(series: &TelemetrySeries) -> Option<ChannelValues> {
    series.samples.iter().rev().find_map(TelemetrySample::readings)
}

pub fn summarize(series: &TelemetrySeries) -> TelemetrySummary {
    let last = last_complete_reading(series);

    TelemetrySummary {
        vibration_last: last.map(|r| r.vibration_mm_s),
        temp_last: last.map(|r| r.bearing_temp_c),
        current_last: last.map(|r| r.motor_current_pu),
        vibration_max: channel_max(series.samples.iter().map(|s| s.vibration_mm_s)),
        temp_max: channel_max(series.samples.iter().map(|s| s.bearing_temp_c)),
        current_max: channel_max(series.samples.iter().map(|s| s.motor_current_pu)),
    }
}

/// Alarm status of the last complete reading. No complete reading means
/// every channel reports `ok`.
pub fn compute_alarms(series: &TelemetrySeries, thresholds: &TelemetryThresholds) -> AlarmStatus {
    let Some(last) = last_complete_reading(series) else {
        return AlarmStatus::all_ok();
    };

    AlarmStatus {
        vibration: classify(
            last.vibration_mm_s,
            thresholds.vibration_warn,
            thresholds.vibration_alarm,
        ),
        temperature: classify(last.bearing_temp_c, thresholds.temp_warn, thresholds.temp_alarm),
        current: classify(
            last.motor_current_pu,
            thresholds.current_warn,
            thresholds.current_alarm,
        ),
    }
}

fn channel_max(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().reduce(f64::max)
}
