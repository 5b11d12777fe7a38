// HTTP request handlers
use crate::application::cutoff::apply_cutoff;
use crate::application::evaluator::{compute_alarms, summarize};
use crate::application::maintenance_service::{MaintenanceDraft, MaintenanceService};
use crate::application::recommendation::RecommendationRequest;
use crate::application::session::{RecommendationRecord, DEFAULT_SESSION};
use crate::application::signal_generator::SimulationError;
use crate::application::telemetry_service::TelemetryView;
use crate::domain::economics::Economics;
use crate::domain::hint::TelemetryHint;
use crate::domain::machine::{MachineOverview, StopEvent};
use crate::domain::maintenance::{AiRecommendation, ErpStatus, MaintenanceRequest};
use crate::domain::oee::OeePoint;
use crate::domain::telemetry::{AlarmStatus, TelemetrySummary, TelemetryThresholds};
use crate::infrastructure::erp_dispatcher::DispatchError;
use crate::infrastructure::series_input::SeriesInput;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SESSION_HEADER: &str = "x-session-id";
const DEFAULT_STOP_HOURS: f64 = 2.0;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<SimulationError> for ApiError {
    fn from(e: SimulationError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::NotFound(id) => ApiError::NotFound(format!("request {} not found in ERP", id)),
            other => {
                tracing::warn!("ERP call failed: {}", other);
                ApiError::BadGateway(other.to_string())
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct WhatIfQuery {
    pub stop_hours: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub machine_id: String,
    pub recommendation: AiRecommendation,
    pub telemetry_hint: TelemetryHint,
}

#[derive(Debug, Deserialize)]
pub struct ErpStatusUpdate {
    pub status: ErpStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub series: SeriesInput,
    #[serde(default)]
    pub thresholds: Option<TelemetryThresholds>,
    #[serde(default)]
    pub cutoff_ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub samples: usize,
    pub cutoff_ts: Option<DateTime<Utc>>,
    pub summary: TelemetrySummary,
    pub alarms: AlarmStatus,
    pub thresholds: TelemetryThresholds,
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn find_machine(state: &AppState, machine_id: &str) -> ApiResult<MachineOverview> {
    state
        .provider
        .machine(machine_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown machine {}", machine_id)))
}

fn what_if(state: &AppState, query: &WhatIfQuery) -> ApiResult<Economics> {
    let stop_hours = query.stop_hours.unwrap_or(DEFAULT_STOP_HOURS);
    if !stop_hours.is_finite() || stop_hours < 0.0 {
        return Err(ApiError::BadRequest(format!(
            "stop_hours must be a non-negative number, got {}",
            stop_hours
        )));
    }
    Ok(Economics::what_if(&state.economics, stop_hours))
}

fn hint_for(
    state: &AppState,
    session: &str,
    machine: &MachineOverview,
    stops: &[StopEvent],
    economics: Economics,
) -> ApiResult<TelemetryHint> {
    let now = Utc::now();
    let hint = state.sessions.with_session(session, |s| {
        state
            .telemetry
            .build_hint(&mut s.telemetry, machine, stops, Some(economics), now)
    })?;
    Ok(hint)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all machines on the floor
pub async fn list_machines(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MachineOverview>>> {
    let machines = state.provider.overview().await.map_err(ApiError::Internal)?;
    Ok(Json(machines))
}

pub async fn machine_oee(
    Path(machine_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<OeePoint>>> {
    find_machine(&state, &machine_id).await?;
    let points = state
        .provider
        .oee_timeseries(&machine_id)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(points))
}

pub async fn machine_stops(
    Path(machine_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StopEvent>>> {
    find_machine(&state, &machine_id).await?;
    let stops = state.provider.stops(&machine_id).await.map_err(ApiError::Internal)?;
    Ok(Json(stops))
}

/// Cutoff-applied telemetry chart for a machine
pub async fn machine_telemetry(
    Path(machine_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<TelemetryView>> {
    if !state.telemetry.is_enabled() {
        return Err(ApiError::NotFound("telemetry is disabled".to_string()));
    }

    let session = session_id(&headers);
    let machine = find_machine(&state, &machine_id).await?;
    let stops = state.provider.stops(&machine_id).await.map_err(ApiError::Internal)?;

    let now = Utc::now();
    let view = state.sessions.with_session(&session, |s| {
        state.telemetry.view(&mut s.telemetry, &machine, &stops, now)
    })?;
    Ok(Json(view))
}

pub async fn machine_hint(
    Path(machine_id): Path<String>,
    Query(query): Query<WhatIfQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<TelemetryHint>> {
    let session = session_id(&headers);
    let economics = what_if(&state, &query)?;
    let machine = find_machine(&state, &machine_id).await?;
    let stops = state.provider.stops(&machine_id).await.map_err(ApiError::Internal)?;

    let hint = hint_for(&state, &session, &machine, &stops, economics)?;
    Ok(Json(hint))
}

/// Ask the advisor for a decision and remember it for the session
pub async fn create_recommendation(
    Path(machine_id): Path<String>,
    Query(query): Query<WhatIfQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<RecommendationResponse>> {
    let session = session_id(&headers);
    let economics = what_if(&state, &query)?;
    let machine = find_machine(&state, &machine_id).await?;
    let oee = state
        .provider
        .oee_timeseries(&machine_id)
        .await
        .map_err(ApiError::Internal)?;
    let stops = state.provider.stops(&machine_id).await.map_err(ApiError::Internal)?;

    let telemetry_hint = hint_for(&state, &session, &machine, &stops, economics)?;
    let request = RecommendationRequest {
        level: state.level,
        machine,
        oee,
        stops,
        telemetry_hint,
    };

    let recommendation = state.recommender.recommend(&request).await.map_err(|e| {
        tracing::warn!("Recommendation for {} failed: {:#}", machine_id, e);
        ApiError::BadGateway(format!("recommendation failed: {:#}", e))
    })?;

    let telemetry_hint = request.telemetry_hint;
    state.sessions.with_session(&session, |s| {
        s.remember_recommendation(
            &machine_id,
            RecommendationRecord {
                recommendation: recommendation.clone(),
                hint: telemetry_hint.clone(),
            },
        )
    });

    Ok(Json(RecommendationResponse {
        machine_id,
        recommendation,
        telemetry_hint,
    }))
}

/// Turn the session's last recommendation into a maintenance request
pub async fn create_maintenance_request(
    Path(machine_id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(draft): Json<MaintenanceDraft>,
) -> ApiResult<(StatusCode, Json<MaintenanceRequest>)> {
    let session = session_id(&headers);
    let machine = find_machine(&state, &machine_id).await?;
    let record = state
        .sessions
        .read_session(&session, |s| s.recommendation(&machine_id).cloned())
        .flatten()
        .ok_or_else(|| {
            ApiError::Conflict(format!("no recommendation for {} yet, request one first", machine_id))
        })?;

    let request = MaintenanceService::build_request(
        &machine,
        &draft,
        &record.recommendation,
        Some(&record.hint),
        Utc::now(),
    );
    let request = state.maintenance.submit(request).await;

    state
        .sessions
        .with_session(&session, |s| s.record_request(request.clone()));

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_maintenance_requests(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<MaintenanceRequest>> {
    let session = session_id(&headers);
    let requests = state.sessions.read_session(&session, |s| s.requests().to_vec());
    Json(requests.unwrap_or_default())
}

pub async fn erp_status(
    Path(request_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.erp.status(&request_id).await?))
}

pub async fn update_erp_status(
    Path(request_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(update): Json<ErpStatusUpdate>,
) -> ApiResult<Json<Value>> {
    let doc = state
        .erp
        .update_status(&request_id, update.status, update.note.as_deref())
        .await?;
    Ok(Json(doc))
}

pub async fn erp_history(
    Path(request_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.erp.history(&request_id).await?))
}

/// Summary and alarms of a caller-supplied series
pub async fn evaluate_telemetry(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EvaluateRequest>,
) -> ApiResult<Json<EvaluateResponse>> {
    let thresholds = body.thresholds.unwrap_or_else(|| state.telemetry.thresholds());
    thresholds
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let series = body
        .series
        .into_series()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let series = apply_cutoff(&series, body.cutoff_ts);

    Ok(Json(EvaluateResponse {
        samples: series.len(),
        cutoff_ts: body.cutoff_ts,
        summary: summarize(&series),
        alarms: compute_alarms(&series, &thresholds),
        thresholds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::maintenance_service::RequestDispatcher;
    use crate::application::recommendation::RecommendationClient;
    use crate::application::session::SessionStore;
    use crate::application::telemetry_service::TelemetryService;
    use crate::domain::economics::EconomicsSettings;
    use crate::domain::hint::TelemetryStatus;
    use crate::domain::machine::Tier;
    use crate::domain::maintenance::{
        Decision, DeliveryReceipt, DeliveryTarget, Priority, Registration, Risk,
    };
    use crate::domain::telemetry::AlarmLevel;
    use crate::infrastructure::config::{ErpSettings, TelemetrySettings};
    use crate::infrastructure::erp_dispatcher::ErpDispatcher;
    use crate::infrastructure::mock_provider::{MockShopfloorProvider, CUT_ID, MILL_ID};
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    struct FakeRecommender {
        fail: bool,
    }

    #[async_trait]
    impl RecommendationClient for FakeRecommender {
        async fn recommend(&self, _request: &RecommendationRequest) -> anyhow::Result<AiRecommendation> {
            if self.fail {
                anyhow::bail!("model timed out");
            }
            Ok(AiRecommendation {
                decision: Decision::Monitor,
                risk: Risk::Medium,
                diagnosis: "Slight vibration growth".to_string(),
                rationale: "Vibration trending up".to_string(),
                actions: vec![],
                cost_impact: None,
                next_check: Some("in 2 hours".to_string()),
            })
        }
    }

    struct FakeDispatcher;

    #[async_trait]
    impl RequestDispatcher for FakeDispatcher {
        async fn dispatch(&self, request: &MaintenanceRequest) -> anyhow::Result<DeliveryReceipt> {
            Ok(DeliveryReceipt {
                erp_url: "http://erp.test".to_string(),
                erp_id: Some("ERP-000001".to_string()),
                received_at: None,
                status: ErpStatus::New,
                note: None,
                exchange_path: format!("{}.json", request.request_id),
                registered: Registration {
                    zn_number: "ZN-000001".to_string(),
                    date: request.created_at.date_naive(),
                },
            })
        }
    }

    fn state(telemetry: bool, recommender_fails: bool) -> Arc<AppState> {
        let outbox = std::env::temp_dir().join("shopfloor-handler-tests");
        let erp = ErpDispatcher::new(&ErpSettings {
            url: Some("http://127.0.0.1:1".to_string()),
            exchange_outbox_dir: outbox.to_string_lossy().into_owned(),
            timeout_secs: 1,
        })
        .unwrap();

        Arc::new(AppState {
            level: Tier::Advanced,
            provider: Arc::new(MockShopfloorProvider::new(Tier::Advanced)),
            telemetry: TelemetryService::new(telemetry, Tier::Advanced, &TelemetrySettings::default()).unwrap(),
            recommender: Arc::new(FakeRecommender {
                fail: recommender_fails,
            }),
            maintenance: MaintenanceService::new(Arc::new(FakeDispatcher)),
            erp: Arc::new(erp),
            economics: EconomicsSettings {
                planned_units_per_shift: 640.0,
                shift_hours: 8.0,
                margin_per_unit: 4.5,
                currency: "EUR".to_string(),
            },
            sessions: SessionStore::new(),
        })
    }

    fn session(name: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static(name));
        headers
    }

    fn no_stop_hours() -> Query<WhatIfQuery> {
        Query(WhatIfQuery { stop_hours: None })
    }

    #[test]
    fn test_session_header() {
        assert_eq!(session_id(&HeaderMap::new()), "default");
        assert_eq!(session_id(&session("line-2")), "line-2");
    }

    #[tokio::test]
    async fn test_list_and_unknown_machine() {
        let state = state(true, false);
        let Json(machines) = list_machines(State(state.clone())).await.unwrap();
        assert_eq!(machines.len(), 3);

        let err = machine_oee(Path("PRESS-9".to_string()), State(state)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_down_machine_hint_has_no_data() {
        let state = state(true, false);
        let Json(hint) = machine_hint(
            Path(CUT_ID.to_string()),
            Query(WhatIfQuery { stop_hours: Some(2.0) }),
            HeaderMap::new(),
            State(state),
        )
        .await
        .unwrap();

        assert_eq!(hint.status(), TelemetryStatus::NoData);
        assert_eq!(hint.economics().map(|e| e.estimated_loss), Some(720.0));
    }

    #[tokio::test]
    async fn test_negative_stop_hours_rejected() {
        let state = state(true, false);
        let err = machine_hint(
            Path(MILL_ID.to_string()),
            Query(WhatIfQuery { stop_hours: Some(-1.0) }),
            HeaderMap::new(),
            State(state),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_telemetry_view_disabled() {
        let state = state(false, false);
        let err = machine_telemetry(Path(MILL_ID.to_string()), HeaderMap::new(), State(state))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_telemetry_view_is_stable_within_session() {
        let state = state(true, false);
        let Json(first) = machine_telemetry(Path(MILL_ID.to_string()), session("a"), State(state.clone()))
            .await
            .unwrap();
        let Json(second) = machine_telemetry(Path(MILL_ID.to_string()), session("a"), State(state))
            .await
            .unwrap();

        assert_eq!(first.series, second.series);
        assert!(first.series.has_any_value());
    }

    #[tokio::test]
    async fn test_recommendation_then_request() {
        let state = state(true, false);

        let err = create_maintenance_request(
            Path(MILL_ID.to_string()),
            session("a"),
            State(state.clone()),
            Json(MaintenanceDraft::default()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let Json(rec) = create_recommendation(
            Path(MILL_ID.to_string()),
            no_stop_hours(),
            session("a"),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(rec.recommendation.decision, Decision::Monitor);
        assert_eq!(rec.telemetry_hint.status(), TelemetryStatus::Ok);

        let (status, Json(request)) = create_maintenance_request(
            Path(MILL_ID.to_string()),
            session("a"),
            State(state.clone()),
            Json(MaintenanceDraft::default()),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(request.recommended_action, Decision::Monitor);
        assert_ne!(request.priority, Priority::Low);
        assert_eq!(request.delivery_target, DeliveryTarget::Erp);
        assert_eq!(request.payload_for_erp.telemetry, Some(rec.telemetry_hint));

        let Json(mine) = list_maintenance_requests(session("a"), State(state.clone())).await;
        let Json(theirs) = list_maintenance_requests(session("b"), State(state.clone())).await;
        assert_eq!(mine.len(), 1);
        assert!(theirs.is_empty());
        assert_eq!(state.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_requests_does_not_open_sessions() {
        let state = state(true, false);
        for i in 0..50 {
            let mut headers = HeaderMap::new();
            headers.insert(SESSION_HEADER, HeaderValue::from_str(&format!("visitor-{i}")).unwrap());
            let Json(requests) = list_maintenance_requests(headers, State(state.clone())).await;
            assert!(requests.is_empty());
        }
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_recommendation_is_not_stored() {
        let state = state(true, true);
        let err = create_recommendation(
            Path(MILL_ID.to_string()),
            no_stop_hours(),
            HeaderMap::new(),
            State(state.clone()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadGateway(_)));
        let stored = state
            .sessions
            .read_session(DEFAULT_SESSION, |s| s.recommendation(MILL_ID).cloned())
            .flatten();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_rows() {
        let state = state(true, false);
        let body: EvaluateRequest = serde_json::from_value(json!({
            "series": {
                "format": "row_oriented",
                "rows": [
                    {"timestamp": "2026-03-02T10:00:00Z", "vibration_mm_s": 9.0, "bearing_temp_c": 70.0, "motor_current_pu": 0.7},
                    {"timestamp": "2026-03-02T10:00:30Z", "vibration_mm_s": 12.0, "bearing_temp_c": 93.0, "motor_current_pu": 0.9},
                    {"timestamp": "2026-03-02T10:01:00Z", "vibration_mm_s": 20.0}
                ]
            },
            "cutoff_ts": "2026-03-02T10:00:45Z"
        }))
        .unwrap();

        let Json(result) = evaluate_telemetry(State(state), Json(body)).await.unwrap();
        assert_eq!(result.samples, 3);
        assert_eq!(result.alarms.vibration, AlarmLevel::Alarm);
        assert_eq!(result.alarms.temperature, AlarmLevel::Alarm);
        assert_eq!(result.alarms.current, AlarmLevel::Warn);
        assert_eq!(result.summary.vibration_max, Some(12.0));
    }

    #[tokio::test]
    async fn test_evaluate_rejects_inverted_thresholds() {
        let state = state(true, false);
        let body: EvaluateRequest = serde_json::from_value(json!({
            "series": {"format": "native_series", "series": {"samples": []}},
            "thresholds": {"vibration_warn": 12.0, "vibration_alarm": 11.0}
        }))
        .unwrap();

        let err = evaluate_telemetry(State(state), Json(body)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
