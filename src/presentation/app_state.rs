// Application state for HTTP handlers
use crate::application::maintenance_service::MaintenanceService;
use crate::application::recommendation::RecommendationClient;
use crate::application::session::SessionStore;
use crate::application::shopfloor_provider::ShopfloorProvider;
use crate::application::telemetry_service::TelemetryService;
use crate::domain::economics::EconomicsSettings;
use crate::domain::machine::Tier;
use crate::infrastructure::erp_dispatcher::ErpDispatcher;
use std::sync::Arc;

pub struct AppState {
    pub level: Tier,
    pub provider: Arc<dyn ShopfloorProvider>,
    pub telemetry: TelemetryService,
    pub recommender: Arc<dyn RecommendationClient>,
    pub maintenance: MaintenanceService,
    pub erp: Arc<ErpDispatcher>,
    pub economics: EconomicsSettings,
    pub sessions: SessionStore,
}
