// Maintenance service - Build maintenance requests and hand them to the ERP
use crate::application::telemetry_service::infer_priority;
use crate::domain::hint::{TelemetryHint, TelemetryStatus};
use crate::domain::machine::MachineOverview;
use crate::domain::maintenance::{
    AiRecommendation, DeliveryReceipt, DeliveryTarget, ErpPayload, MaintenanceRequest, Priority,
};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait RequestDispatcher: Send + Sync {
    /// Deliver a request to the downstream system
    async fn dispatch(&self, request: &MaintenanceRequest) -> anyhow::Result<DeliveryReceipt>;
}

/// What the foreman fills in on the request form.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceDraft {
    #[serde(default = "default_work_type")]
    pub work_type: String,
    #[serde(default)]
    pub comment: String,
    /// Overrides the priority inferred from telemetry.
    #[serde(default)]
    pub priority: Option<Priority>,
}

fn default_work_type() -> String {
    "Diagnostics".to_string()
}

impl Default for MaintenanceDraft {
    fn default() -> Self {
        Self {
            work_type: default_work_type(),
            comment: String::new(),
            priority: None,
        }
    }
}

#[derive(Clone)]
pub struct MaintenanceService {
    dispatcher: Arc<dyn RequestDispatcher>,
}

impl MaintenanceService {
    pub fn new(dispatcher: Arc<dyn RequestDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn build_request(
        machine: &MachineOverview,
        draft: &MaintenanceDraft,
        recommendation: &AiRecommendation,
        hint: Option<&TelemetryHint>,
        now: DateTime<Utc>,
    ) -> MaintenanceRequest {
        let priority = draft.priority.unwrap_or_else(|| infer_priority(hint));
        let report = hint.and_then(TelemetryHint::report);
        let economics = hint.and_then(TelemetryHint::economics).cloned();
        let request_id = format!("MR-{}", Uuid::new_v4().simple().to_string()[..8].to_uppercase());

        MaintenanceRequest {
            request_id,
            created_at: now.trunc_subsecs(0),
            machine_id: machine.machine_id.clone(),
            machine_name: machine.name.clone(),
            priority,
            recommended_action: recommendation.decision,
            reason: format!("{}. {}", draft.work_type, draft.comment).trim().to_string(),
            oee_percent: machine.oee_percent,
            stops_count: Some(machine.stops_count),
            telemetry_status: hint.map_or(TelemetryStatus::Unknown, TelemetryHint::status),
            telemetry_last: report.map(|r| r.last),
            telemetry_max: report.map(|r| r.max),
            alarms: report.map(|r| r.alarms),
            estimated_loss: economics.as_ref().map(|e| e.estimated_loss),
            currency: economics.as_ref().map(|e| e.currency.clone()),
            ai: recommendation.clone(),
            payload_for_erp: ErpPayload {
                system: "1C".to_string(),
                doc_type: "maintenance_request".to_string(),
                machine_id: machine.machine_id.clone(),
                priority,
                work_type: draft.work_type.clone(),
                comment: draft.comment.clone(),
                telemetry: hint.cloned(),
                economics,
            },
            delivery_target: DeliveryTarget::None,
            external_ids: BTreeMap::new(),
            delivery_error: None,
        }
    }

    /// Dispatch the request and record the outcome on it. A failed delivery
    /// does not discard the request.
    pub async fn submit(&self, mut request: MaintenanceRequest) -> MaintenanceRequest {
        match self.dispatcher.dispatch(&request).await {
            Ok(receipt) => {
                tracing::info!(
                    "Delivered {} to ERP as {:?}",
                    request.request_id,
                    receipt.erp_id
                );
                request.delivery_target = DeliveryTarget::Erp;
                request.external_ids = receipt.external_ids();
                request.delivery_error = None;
            }
            Err(e) => {
                tracing::warn!("Delivery of {} failed: {:#}", request.request_id, e);
                request.delivery_target = DeliveryTarget::None;
                request.delivery_error = Some(format!("{:#}", e));
            }
        }
        request
    }
}
