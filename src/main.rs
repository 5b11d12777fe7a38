// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::maintenance_service::MaintenanceService;
use crate::application::session::SessionStore;
use crate::application::telemetry_service::TelemetryService;
use crate::infrastructure::config::load_shopfloor_config;
use crate::infrastructure::erp_dispatcher::ErpDispatcher;
use crate::infrastructure::mock_provider::MockShopfloorProvider;
use crate::infrastructure::openai_client::OpenAiClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    create_maintenance_request, create_recommendation, erp_history, erp_status, evaluate_telemetry,
    health_check, list_machines, list_maintenance_requests, machine_hint, machine_oee,
    machine_stops, machine_telemetry, update_erp_status,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_shopfloor_config()?;

    // Create adapters (infrastructure layer)
    let provider = MockShopfloorProvider::from_name(&config.provider)?;
    if provider.tier() != config.level {
        tracing::warn!(
            "Provider {} serves {} data but level is {}",
            config.provider,
            provider.tier(),
            config.level
        );
    }
    let erp = Arc::new(ErpDispatcher::new(&config.integrations.erp)?);
    let recommender = OpenAiClient::new(&config.recommendation)?;

    // Create services (application layer)
    let telemetry = TelemetryService::new(config.features.telemetry, config.level, &config.telemetry)?;
    let maintenance = MaintenanceService::new(erp.clone());

    // Create application state
    let state = Arc::new(AppState {
        level: config.level,
        provider: Arc::new(provider),
        telemetry,
        recommender: Arc::new(recommender),
        maintenance,
        erp: erp.clone(),
        economics: config.economics.clone(),
        sessions: SessionStore::with_capacity(config.server.max_sessions),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/machines", get(list_machines))
        .route("/machines/:id/oee", get(machine_oee))
        .route("/machines/:id/stops", get(machine_stops))
        .route("/machines/:id/telemetry", get(machine_telemetry))
        .route("/machines/:id/hint", get(machine_hint))
        .route("/machines/:id/recommendation", post(create_recommendation))
        .route("/machines/:id/maintenance-requests", post(create_maintenance_request))
        .route("/maintenance-requests", get(list_maintenance_requests))
        .route("/maintenance-requests/:id/erp", get(erp_status))
        .route("/maintenance-requests/:id/erp/status", patch(update_erp_status))
        .route("/maintenance-requests/:id/erp/history", get(erp_history))
        .route("/telemetry/evaluate", post(evaluate_telemetry))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind address: {}", config.server.bind))?;
    tracing::info!(
        "Starting shopfloor-telemetry on {} (level {}, telemetry {}, ERP {})",
        addr,
        config.level,
        if config.features.telemetry { "on" } else { "off" },
        erp.erp_url()
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
