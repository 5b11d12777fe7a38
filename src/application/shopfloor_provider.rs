// Provider trait for shopfloor data access
use crate::domain::machine::{MachineOverview, StopEvent};
use crate::domain::oee::OeePoint;
use async_trait::async_trait;

#[async_trait]
pub trait ShopfloorProvider: Send + Sync {
    /// Current overview of every machine on the floor
    async fn overview(&self) -> anyhow::Result<Vec<MachineOverview>>;

    /// OEE trend over the current shift
    async fn oee_timeseries(&self, machine_id: &str) -> anyhow::Result<Vec<OeePoint>>;

    /// Stop events recorded for a machine during the current shift
    async fn stops(&self, machine_id: &str) -> anyhow::Result<Vec<StopEvent>>;

    async fn machine(&self, machine_id: &str) -> anyhow::Result<Option<MachineOverview>> {
        let machines = self.overview().await?;
        Ok(machines.into_iter().find(|m| m.machine_id == machine_id))
    }
}
