// Configuration loading - TOML file layered with environment overrides
use crate::application::session::DEFAULT_MAX_SESSIONS;
use crate::application::signal_generator::{
    window_sample_count, DEFAULT_STEP_SECONDS, DEFAULT_WINDOW_MINUTES, MAX_SAMPLES,
};
use crate::domain::economics::EconomicsSettings;
use crate::domain::machine::Tier;
use crate::domain::telemetry::{TelemetryThresholds, ThresholdError};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/shopfloor";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
    #[error("invalid config value: {0}")]
    Validation(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShopfloorConfig {
    pub level: Tier,
    pub provider: String,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub economics: EconomicsSettings,
    #[serde(default)]
    pub integrations: IntegrationSettings,
    #[serde(default)]
    pub recommendation: RecommendationSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeatureFlags {
    #[serde(default)]
    pub telemetry: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
    #[serde(default = "default_sample_step_sec")]
    pub sample_step_sec: u32,
    #[serde(default)]
    pub thresholds: TelemetryThresholds,
}

fn default_window_minutes() -> u32 {
    DEFAULT_WINDOW_MINUTES
}

fn default_sample_step_sec() -> u32 {
    DEFAULT_STEP_SECONDS
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            sample_step_sec: default_sample_step_sec(),
            thresholds: TelemetryThresholds::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    #[default]
    Erp,
    Google,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IntegrationSettings {
    #[serde(default)]
    pub mode: IntegrationMode,
    #[serde(default)]
    pub erp: ErpSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ErpSettings {
    pub url: Option<String>,
    #[serde(default = "default_outbox_dir")]
    pub exchange_outbox_dir: String,
    #[serde(default = "default_erp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_outbox_dir() -> String {
    "exchange/outbox".to_string()
}

fn default_erp_timeout_secs() -> u64 {
    8
}

impl Default for ErpSettings {
    fn default() -> Self {
        Self {
            url: None,
            exchange_outbox_dir: default_outbox_dir(),
            timeout_secs: default_erp_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendationSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-5.2".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    9
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl ShopfloorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.telemetry.thresholds.validate()?;

        if self.telemetry.window_minutes == 0 {
            return Err(ConfigError::Validation(
                "telemetry.window_minutes must be greater than 0".to_string(),
            ));
        }

        if self.telemetry.sample_step_sec == 0 {
            return Err(ConfigError::Validation(
                "telemetry.sample_step_sec must be greater than 0".to_string(),
            ));
        }

        let samples = window_sample_count(self.telemetry.window_minutes, self.telemetry.sample_step_sec);
        if samples > MAX_SAMPLES {
            return Err(ConfigError::Validation(format!(
                "telemetry window yields {} samples, at most {} allowed",
                samples, MAX_SAMPLES
            )));
        }

        if self.integrations.mode == IntegrationMode::Google {
            return Err(ConfigError::Validation(
                "integrations.mode 'google' is not supported by this service, use 'erp'".to_string(),
            ));
        }

        for (name, value) in [
            ("integrations.erp.timeout_secs", self.integrations.erp.timeout_secs),
            ("recommendation.timeout_secs", self.recommendation.timeout_secs),
            ("server.max_sessions", self.server.max_sessions as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{} must be greater than 0", name)));
            }
        }

        if self.economics.shift_hours < 0.0 {
            return Err(ConfigError::Validation(
                "economics.shift_hours cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load `config/shopfloor` (or `$SHOPFLOOR_CONFIG`) with `SHOPFLOOR__*`
/// environment overrides.
pub fn load_shopfloor_config() -> Result<ShopfloorConfig, ConfigError> {
    let path = std::env::var("SHOPFLOOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    tracing::info!("Loading configuration from {}", path);

    let builder = config::Config::builder().add_source(config::File::with_name(&path));
    from_builder(builder)
}

fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<ShopfloorConfig, ConfigError> {
    let settings = builder
        .add_source(config::Environment::with_prefix("SHOPFLOOR").separator("__"))
        .build()?;

    let cfg: ShopfloorConfig = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}
