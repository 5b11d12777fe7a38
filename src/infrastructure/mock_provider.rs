// Mock shopfloor provider - Demo floor of three machines per data tier
use crate::application::shopfloor_provider::ShopfloorProvider;
use crate::domain::machine::{
    DownReason, MachineOverview, MachineState, ShiftInfo, StopEvent, StopReason, Tier,
};
use crate::domain::oee::{calc_oee_percent, OeePoint};
use crate::infrastructure::config::ConfigError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

pub const MILL_ID: &str = "CNC-MILL-1";
pub const LATHE_ID: &str = "CNC-LATHE-1";
pub const CUT_ID: &str = "CNC-CUT-1";

const OEE_STEP_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct MockShopfloorProvider {
    tier: Tier,
    day: Option<NaiveDate>,
}

impl MockShopfloorProvider {
    /// Provider whose shift is always today's.
    pub fn new(tier: Tier) -> Self {
        Self { tier, day: None }
    }

    /// Provider pinned to a fixed shift day.
    pub fn for_day(tier: Tier, day: NaiveDate) -> Self {
        Self {
            tier,
            day: Some(day),
        }
    }

    /// Resolve a configured provider name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let tier = match name {
            "mock_basic" => Tier::Basic,
            "mes_standard_stub" => Tier::Standard,
            "iot_advanced_stub" => Tier::Advanced,
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown provider: {} (use mock_basic | mes_standard_stub | iot_advanced_stub)",
                    other
                )));
            }
        };
        Ok(Self::new(tier))
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    fn day(&self) -> NaiveDate {
        self.day.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn at(&self, hour: u32, minute: u32) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        self.day().and_time(time).and_utc()
    }

    fn shift(&self) -> ShiftInfo {
        ShiftInfo {
            start: self.at(8, 0),
            end: self.at(16, 0),
        }
    }

    fn build_overview(&self) -> Vec<MachineOverview> {
        let oee_mill_base = calc_oee_percent(0.92, 0.88, 0.97);
        let oee_lathe_base = calc_oee_percent(0.85, 0.90, 0.99);

        // BASIC is manual entry: coarser, slightly lower OEE and fewer recorded stops.
        let (oee_mill, oee_lathe, mill_stops, lathe_stops) = match self.tier {
            Tier::Basic => (
                (oee_mill_base - 3.0).max(0.0),
                (oee_lathe_base - 2.0).max(0.0),
                2,
                1,
            ),
            Tier::Standard => (oee_mill_base, oee_lathe_base, 3, 2),
            Tier::Advanced => (oee_mill_base, oee_lathe_base, 6, 4),
        };

        let mut mill = MachineOverview::new(
            MILL_ID,
            "Milling machine",
            "CNC mill",
            MachineState::Run,
            self.shift(),
        );
        mill.stops_count = mill_stops;
        mill.run_time_hours = 7.5;
        mill.planned_time_hours = 8.0;
        mill.oee_percent = Some(oee_mill);

        let mut lathe = MachineOverview::new(
            LATHE_ID,
            "Lathe",
            "CNC lathe",
            MachineState::Idle,
            self.shift(),
        );
        lathe.stops_count = lathe_stops;
        lathe.run_time_hours = if self.tier == Tier::Basic { 4.8 } else { 5.2 };
        lathe.planned_time_hours = 8.0;
        lathe.oee_percent = Some(oee_lathe);

        let mut cut = MachineOverview::new(
            CUT_ID,
            "Metal cutting machine",
            "Metal cutting",
            MachineState::Down,
            self.shift(),
        );
        cut.down_start_ts = Some(self.at(10, 20));
        cut.down_reason = Some(DownReason::Repair);

        vec![mill, lathe, cut]
    }

    fn build_oee(&self, machine_id: &str) -> Vec<OeePoint> {
        let shift = self.shift();
        let base = match machine_id {
            MILL_ID => 78.5,
            LATHE_ID => 75.7,
            CUT_ID => 60.0,
            _ => 70.0,
        };
        let down_ts = self.at(10, 20);
        let count = (shift.end - shift.start).num_minutes() / OEE_STEP_MINUTES + 1;

        let mut points: Vec<OeePoint> = (0..count)
            .map(|i| {
                let timestamp = shift.start + Duration::minutes(OEE_STEP_MINUTES * i);
                let drift = (i % 8 - 4) as f64;
                let value = match self.tier {
                    Tier::Basic => base + drift * 0.6,
                    Tier::Standard => base + drift,
                    Tier::Advanced => {
                        // Micro-stop dip roughly every 1.5 hours.
                        let v = base + drift * 1.4;
                        if i % 6 == 0 { v * 0.88 } else { v }
                    }
                };
                let value = if machine_id == CUT_ID && timestamp >= down_ts {
                    0.0
                } else {
                    value.clamp(0.0, 100.0)
                };
                OeePoint::new(timestamp, value)
            })
            .collect();

        if self.tier == Tier::Standard {
            smooth_rolling_mean(&mut points, 3);
        }

        points
    }

    fn build_stops(&self, machine_id: &str) -> Vec<StopEvent> {
        let start = self.shift().start;
        let span = |h0: i64, m0: i64, h1: i64, m1: i64| {
            (
                start + Duration::minutes(h0 * 60 + m0),
                Some(start + Duration::minutes(h1 * 60 + m1)),
            )
        };
        let stop = |(from, to): (DateTime<Utc>, Option<DateTime<Utc>>), reason, note| {
            StopEvent::new(from, to, reason, note)
        };

        let mut stops = match machine_id {
            MILL_ID => {
                let mut stops = vec![
                    stop(span(3, 35, 3, 55), StopReason::Setup, Some("Tool change")),
                    stop(span(6, 5, 6, 15), StopReason::Fault, Some("Door signal / sensor")),
                ];
                if self.tier != Tier::Basic {
                    let (reason, note) = if self.tier == Tier::Advanced {
                        (StopReason::Microstop, "Chip removal")
                    } else {
                        (StopReason::Fault, "Short stop")
                    };
                    stops.insert(0, stop(span(1, 10, 1, 18), reason, Some(note)));
                }
                if self.tier == Tier::Advanced {
                    stops.push(stop(
                        span(2, 5, 2, 7),
                        StopReason::Microstop,
                        Some("Auto-detected: feed / chips"),
                    ));
                    stops.push(stop(
                        span(5, 15, 5, 16),
                        StopReason::Microstop,
                        Some("Auto-detected: door sensor"),
                    ));
                }
                stops
            }
            LATHE_ID => match self.tier {
                // Operator logged a single large stop without details.
                Tier::Basic => vec![stop(span(4, 0, 4, 25), StopReason::Setup, None)],
                Tier::Standard => vec![stop(span(4, 0, 4, 25), StopReason::Setup, Some("Changeover"))],
                Tier::Advanced => vec![
                    stop(span(4, 0, 4, 25), StopReason::Setup, Some("Changeover")),
                    stop(
                        span(1, 50, 1, 52),
                        StopReason::Microstop,
                        Some("Auto-detected: short pause"),
                    ),
                    stop(
                        span(6, 40, 6, 41),
                        StopReason::Microstop,
                        Some("Auto-detected: sensor reset"),
                    ),
                ],
            },
            CUT_ID => {
                let mut stops = vec![stop(
                    span(2, 20, 4, 0),
                    StopReason::Repair,
                    Some("Belt replacement / feed adjustment"),
                )];
                if self.tier == Tier::Advanced {
                    stops.insert(
                        0,
                        stop(
                            span(2, 5, 2, 7),
                            StopReason::Microstop,
                            Some("Auto-detected: load rising before failure"),
                        ),
                    );
                }
                stops
            }
            _ => Vec::new(),
        };

        // MES aggregates micro-stops into generic faults.
        if self.tier == Tier::Standard {
            for s in stops.iter_mut().filter(|s| s.reason == StopReason::Microstop) {
                s.reason = StopReason::Fault;
            }
        }

        stops
    }
}

/// Trailing rolling mean over `window` points; the first points average
/// whatever is available.
fn smooth_rolling_mean(points: &mut [OeePoint], window: usize) {
    let raw: Vec<f64> = points.iter().map(|p| p.oee_percent).collect();
    for (i, point) in points.iter_mut().enumerate() {
        let from = (i + 1).saturating_sub(window);
        let slice = &raw[from..=i];
        point.oee_percent = slice.iter().sum::<f64>() / slice.len() as f64;
    }
}

#[async_trait]
impl ShopfloorProvider for MockShopfloorProvider {
    async fn overview(&self) -> Result<Vec<MachineOverview>> {
        Ok(self.build_overview())
    }

    async fn oee_timeseries(&self, machine_id: &str) -> Result<Vec<OeePoint>> {
        Ok(self.build_oee(machine_id))
    }

    async fn stops(&self, machine_id: &str) -> Result<Vec<StopEvent>> {
        Ok(self.build_stops(machine_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[tokio::test]
    async fn test_overview_per_tier() {
        let basic = MockShopfloorProvider::for_day(Tier::Basic, day());
        let machines = basic.overview().await.unwrap();

        assert_eq!(machines.len(), 3);
        assert_eq!(machines[0].state, MachineState::Run);
        assert_eq!(machines[0].oee_percent, Some(75.5));
        assert_eq!(machines[0].stops_count, 2);
        assert_eq!(machines[1].state, MachineState::Idle);
        assert_eq!(machines[1].run_time_hours, 4.8);
        assert_eq!(machines[2].state, MachineState::Down);
        assert_eq!(machines[2].down_reason, Some(DownReason::Repair));
        assert_eq!(
            machines[2].down_start_ts.unwrap().to_rfc3339(),
            "2026-03-02T10:20:00+00:00"
        );

        let advanced = MockShopfloorProvider::for_day(Tier::Advanced, day());
        let machines = advanced.overview().await.unwrap();
        assert_eq!(machines[0].oee_percent, Some(78.5));
        assert_eq!(machines[0].stops_count, 6);
        assert_eq!(machines[1].stops_count, 4);
    }

    #[tokio::test]
    async fn test_machine_lookup() {
        let provider = MockShopfloorProvider::for_day(Tier::Standard, day());
        assert!(provider.machine(LATHE_ID).await.unwrap().is_some());
        assert!(provider.machine("PRESS-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oee_series_shape() {
        let provider = MockShopfloorProvider::for_day(Tier::Basic, day());
        let points = provider.oee_timeseries(MILL_ID).await.unwrap();

        assert_eq!(points.len(), 33);
        // drift -4 on the first point, scaled by 0.6
        assert!((points[0].oee_percent - (78.5 - 2.4)).abs() < 1e-9);
        assert!(points.iter().all(|p| (0.0..=100.0).contains(&p.oee_percent)));
    }

    #[tokio::test]
    async fn test_cut_oee_drops_after_breakdown() {
        let provider = MockShopfloorProvider::for_day(Tier::Advanced, day());
        let points = provider.oee_timeseries(CUT_ID).await.unwrap();
        let down = provider.at(10, 20);

        assert!(points.iter().filter(|p| p.timestamp >= down).all(|p| p.oee_percent == 0.0));
        assert!(points.iter().filter(|p| p.timestamp < down).all(|p| p.oee_percent > 0.0));
    }

    #[tokio::test]
    async fn test_advanced_dips_every_sixth_point() {
        let provider = MockShopfloorProvider::for_day(Tier::Advanced, day());
        let points = provider.oee_timeseries(MILL_ID).await.unwrap();
        let expected = (78.5 + (6 % 8 - 4) as f64 * 1.4) * 0.88;
        assert!((points[6].oee_percent - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_standard_is_smoothed() {
        let provider = MockShopfloorProvider::for_day(Tier::Standard, day());
        let points = provider.oee_timeseries(LATHE_ID).await.unwrap();

        // Raw values: 71.7, 72.7, 73.7 -> trailing means.
        assert!((points[0].oee_percent - 71.7).abs() < 1e-9);
        assert!((points[1].oee_percent - 72.2).abs() < 1e-9);
        assert!((points[2].oee_percent - 72.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stops_per_tier() {
        let basic = MockShopfloorProvider::for_day(Tier::Basic, day());
        let standard = MockShopfloorProvider::for_day(Tier::Standard, day());
        let advanced = MockShopfloorProvider::for_day(Tier::Advanced, day());

        assert_eq!(basic.stops(MILL_ID).await.unwrap().len(), 2);
        assert_eq!(advanced.stops(MILL_ID).await.unwrap().len(), 5);

        let standard_mill = standard.stops(MILL_ID).await.unwrap();
        assert_eq!(standard_mill.len(), 3);
        assert!(standard_mill.iter().all(|s| s.reason != StopReason::Microstop));

        let basic_lathe = basic.stops(LATHE_ID).await.unwrap();
        assert_eq!(basic_lathe.len(), 1);
        assert_eq!(basic_lathe[0].note, None);

        let advanced_cut = advanced.stops(CUT_ID).await.unwrap();
        assert_eq!(advanced_cut[0].reason, StopReason::Microstop);
        assert_eq!(advanced_cut[1].duration_min(), Some(100.0));

        assert!(basic.stops("PRESS-9").await.unwrap().is_empty());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(MockShopfloorProvider::from_name("mock_basic").unwrap().tier(), Tier::Basic);
        assert_eq!(
            MockShopfloorProvider::from_name("iot_advanced_stub").unwrap().tier(),
            Tier::Advanced
        );
        assert!(matches!(
            MockShopfloorProvider::from_name("opcua"),
            Err(ConfigError::Validation(_))
        ));
    }
}
