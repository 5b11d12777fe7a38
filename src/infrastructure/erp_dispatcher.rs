// ERP (1C) dispatcher - Exchange outbox file plus the ERP maintenance API
use crate::application::maintenance_service::RequestDispatcher;
use crate::domain::economics::Economics;
use crate::domain::hint::TelemetryHint;
use crate::domain::maintenance::{
    AiRecommendation, DeliveryReceipt, ErpStatus, MaintenanceRequest, Priority, Registration,
};
use crate::infrastructure::config::ErpSettings;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const ERP_URL_ENV: &str = "ERP_URL";
const DEFAULT_ERP_URL: &str = "http://127.0.0.1:8008";
const ALREADY_EXISTS: &str = "ALREADY_EXISTS";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to write exchange file {path}: {source}")]
    Outbox {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("ERP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ERP returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request {0} not found in ERP")]
    NotFound(String),
}

/// Body of `POST /api/v1/maintenance_requests`.
#[derive(Debug, Serialize)]
struct ErpRequestBody<'a> {
    request_id: &'a str,
    created_at: DateTime<Utc>,
    machine_id: &'a str,
    priority: Priority,
    work_type: &'a str,
    comment: &'a str,
    telemetry: Option<&'a TelemetryHint>,
    economics: Option<&'a Economics>,
    ai: &'a AiRecommendation,
}

/// Acknowledgement or stored document; only the bookkeeping fields are read.
#[derive(Debug, Deserialize)]
struct ErpAck {
    #[serde(default)]
    erp_id: Option<String>,
    #[serde(default)]
    received_at: Option<String>,
    #[serde(default = "default_status")]
    status: ErpStatus,
}

fn default_status() -> ErpStatus {
    ErpStatus::New
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    status: ErpStatus,
    note: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ErpDispatcher {
    client: reqwest::Client,
    erp_url: String,
    outbox_dir: PathBuf,
}

impl ErpDispatcher {
    pub fn new(settings: &ErpSettings) -> Result<Self, DispatchError> {
        let erp_url = settings
            .url
            .clone()
            .or_else(|| std::env::var(ERP_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_ERP_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            erp_url: erp_url.trim_end_matches('/').to_string(),
            outbox_dir: PathBuf::from(&settings.exchange_outbox_dir),
        })
    }

    pub fn erp_url(&self) -> &str {
        &self.erp_url
    }

    fn document_url(&self, request_id: &str) -> String {
        format!(
            "{}/api/v1/maintenance_requests/{}",
            self.erp_url,
            urlencoding::encode(request_id)
        )
    }

    /// Write the full request to `<outbox>/<request_id>.json`.
    pub async fn write_exchange_file(&self, request: &MaintenanceRequest) -> Result<PathBuf, DispatchError> {
        let path = self.outbox_dir.join(format!("{}.json", request.request_id));
        let outbox_err = |source| DispatchError::Outbox {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.outbox_dir).await.map_err(outbox_err)?;
        let json = serde_json::to_vec_pretty(request)?;
        tokio::fs::write(&path, json).await.map_err(outbox_err)?;

        tracing::debug!("Wrote exchange file {}", path.display());
        Ok(path)
    }

    async fn send(&self, request: &MaintenanceRequest) -> Result<(ErpAck, Option<String>), DispatchError> {
        let payload = &request.payload_for_erp;
        let body = ErpRequestBody {
            request_id: &request.request_id,
            created_at: request.created_at,
            machine_id: &request.machine_id,
            priority: request.priority,
            work_type: &payload.work_type,
            comment: &payload.comment,
            telemetry: payload.telemetry.as_ref(),
            economics: payload.economics.as_ref(),
            ai: &request.ai,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/maintenance_requests", self.erp_url))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::info!("{} already registered in ERP, reading it back", request.request_id);
            let doc = self.status(&request.request_id).await?;
            let ack: ErpAck = serde_json::from_value(doc)?;
            return Ok((ack, Some(ALREADY_EXISTS.to_string())));
        }

        let response = check_status(response, &request.request_id).await?;
        Ok((response.json::<ErpAck>().await?, None))
    }

    async fn fetch(&self, url: &str, request_id: &str) -> Result<Value, DispatchError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, request_id).await?;
        Ok(response.json::<Value>().await?)
    }

    /// Current ERP document for a request.
    pub async fn status(&self, request_id: &str) -> Result<Value, DispatchError> {
        self.fetch(&self.document_url(request_id), request_id).await
    }

    pub async fn update_status(
        &self,
        request_id: &str,
        status: ErpStatus,
        note: Option<&str>,
    ) -> Result<Value, DispatchError> {
        let response = self
            .client
            .patch(format!("{}/status", self.document_url(request_id)))
            .json(&StatusUpdate { status, note })
            .send()
            .await?;
        let response = check_status(response, request_id).await?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn history(&self, request_id: &str) -> Result<Value, DispatchError> {
        self.fetch(&format!("{}/history", self.document_url(request_id)), request_id)
            .await
    }
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response, DispatchError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(DispatchError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DispatchError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Demo registration number derived from the ERP id.
pub fn registration_for(erp_id: Option<&str>, date: NaiveDate) -> Registration {
    Registration {
        zn_number: erp_id.unwrap_or("ERP-000000").replace("ERP-", "ZN-"),
        date,
    }
}

#[async_trait]
impl RequestDispatcher for ErpDispatcher {
    async fn dispatch(&self, request: &MaintenanceRequest) -> anyhow::Result<DeliveryReceipt> {
        let path = self.write_exchange_file(request).await?;
        let (ack, note) = self.send(request).await?;

        Ok(DeliveryReceipt {
            erp_url: self.erp_url.clone(),
            registered: registration_for(ack.erp_id.as_deref(), Utc::now().date_naive()),
            erp_id: ack.erp_id,
            received_at: ack.received_at,
            status: ack.status,
            note,
            exchange_path: path.display().to_string(),
        })
    }
}
