// Maintenance request and AI recommendation domain models
use super::economics::Economics;
use super::hint::{TelemetryHint, TelemetryStatus};
use super::telemetry::{AlarmStatus, ChannelReadings};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Stop,
    Continue,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Risk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub title: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRecommendation {
    pub decision: Decision,
    pub risk: Risk,
    pub diagnosis: String,
    pub rationale: String,
    #[serde(default)]
    pub actions: Vec<ActionItem>,
    #[serde(default)]
    pub cost_impact: Option<String>,
    #[serde(default)]
    pub next_check: Option<String>,
}

/// Document shape expected by the 1C exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpPayload {
    pub system: String,
    pub doc_type: String,
    pub machine_id: String,
    pub priority: Priority,
    pub work_type: String,
    pub comment: String,
    pub telemetry: Option<TelemetryHint>,
    pub economics: Option<Economics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryTarget {
    Erp,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub machine_id: String,
    pub machine_name: String,
    pub priority: Priority,
    pub recommended_action: Decision,
    pub reason: String,
    pub oee_percent: Option<f64>,
    pub stops_count: Option<u32>,
    pub telemetry_status: TelemetryStatus,
    pub telemetry_last: Option<ChannelReadings>,
    pub telemetry_max: Option<ChannelReadings>,
    pub alarms: Option<AlarmStatus>,
    pub estimated_loss: Option<f64>,
    pub currency: Option<String>,
    pub ai: AiRecommendation,
    pub payload_for_erp: ErpPayload,
    pub delivery_target: DeliveryTarget,
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
    pub delivery_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErpStatus {
    New,
    InProgress,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub zn_number: String,
    pub date: NaiveDate,
}

/// Result of handing a request over to the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub erp_url: String,
    pub erp_id: Option<String>,
    pub received_at: Option<String>,
    pub status: ErpStatus,
    pub note: Option<String>,
    pub exchange_path: String,
    pub registered: Registration,
}

impl DeliveryReceipt {
    pub fn external_ids(&self) -> BTreeMap<String, String> {
        let mut ids = BTreeMap::new();
        if let Some(erp_id) = &self.erp_id {
            ids.insert("erp_id".to_string(), erp_id.clone());
        }
        ids.insert("erp_url".to_string(), self.erp_url.clone());
        ids.insert("exchange_path".to_string(), self.exchange_path.clone());
        ids.insert("zn_number".to_string(), self.registered.zn_number.clone());
        ids
    }
}
