use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// MoMo wallet gateway settings. The sandbox credentials published in MoMo's
/// developer documentation are used as defaults so a development instance can
/// talk to the test gateway out of the box.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MomoConfig {
    #[serde(default = "default_momo_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_momo_partner_code")]
    pub partner_code: String,

    #[serde(default = "default_momo_access_key")]
    pub access_key: String,

    #[validate(length(min = 16))]
    #[serde(default = "default_momo_secret_key")]
    pub secret_key: String,

    /// Where the customer's browser is sent back after paying.
    #[serde(default = "default_momo_redirect_url")]
    pub redirect_url: String,

    /// Where MoMo delivers the asynchronous IPN. Must be publicly reachable.
    #[serde(default = "default_momo_ipn_url")]
    pub ipn_url: String,

    #[serde(default = "default_momo_partner_name")]
    pub partner_name: String,

    #[serde(default = "default_momo_store_id")]
    pub store_id: String,

    /// Gateway call timeout in seconds; expiry surfaces as a retryable error.
    #[serde(default = "default_momo_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MomoConfig {
    fn default() -> Self {
        Self {
            endpoint: default_momo_endpoint(),
            partner_code: default_momo_partner_code(),
            access_key: default_momo_access_key(),
            secret_key: default_momo_secret_key(),
            redirect_url: default_momo_redirect_url(),
            ipn_url: default_momo_ipn_url(),
            partner_name: default_momo_partner_name(),
            store_id: default_momo_store_id(),
            timeout_secs: default_momo_timeout_secs(),
        }
    }
}

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to verify bearer tokens issued by the identity service
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// MoMo gateway settings
    #[serde(default)]
    #[validate]
    pub momo: MomoConfig,
}

impl AppConfig {
    /// Minimal constructor used by the test harness.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            host: default_host(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            momo: MomoConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_momo_endpoint() -> String {
    "https://test-payment.momo.vn/v2/gateway/api/create".to_string()
}
fn default_momo_partner_code() -> String {
    "MOMO".to_string()
}
fn default_momo_access_key() -> String {
    "F8BBA842ECF85".to_string()
}
fn default_momo_secret_key() -> String {
    "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_string()
}
fn default_momo_redirect_url() -> String {
    "http://localhost:8080/api/v1/payments/momo/return".to_string()
}
fn default_momo_ipn_url() -> String {
    "http://localhost:8080/api/v1/payments/momo/ipn".to_string()
}
fn default_momo_partner_name() -> String {
    "Tourbook".to_string()
}
fn default_momo_store_id() -> String {
    "TourbookStore".to_string()
}
fn default_momo_timeout_secs() -> u64 {
    10
}

/// Loads configuration from `config/{default,<env>}.toml` files (when
/// present) layered with `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.clone())?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("tourbook_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter_directive));
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}
