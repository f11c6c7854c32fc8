use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

const DEFAULT_STATUS_AUTHORIZED: &str = "processing_authorized";
const DEFAULT_STATUS_CAPTURED: &str = "processing_captured";

/// Gateway-specific settings: the order lifecycle statuses mapped to gateway
/// events and the auto-invoicing switch.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct GatewaySettings {
    /// Order status applied when an authorization is recorded
    #[serde(default = "default_status_authorized")]
    pub order_status_authorized: String,

    /// Order status applied when a capture is recorded
    #[serde(default = "default_status_captured")]
    pub order_status_captured: String,

    /// Create an invoice automatically when a capture is recorded
    #[serde(default = "default_auto_invoice")]
    pub auto_invoice: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            order_status_authorized: default_status_authorized(),
            order_status_captured: default_status_captured(),
            auto_invoice: default_auto_invoice(),
        }
    }
}

fn default_status_authorized() -> String {
    DEFAULT_STATUS_AUTHORIZED.to_string()
}

fn default_status_captured() -> String {
    DEFAULT_STATUS_CAPTURED.to_string()
}

fn default_auto_invoice() -> bool {
    true
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Host address to bind the server to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment name: development, test or production
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON (structured) instead of plain text
    #[serde(default)]
    pub log_json: bool,

    /// Create database tables on startup when missing
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,

    /// API key required on order placement and gateway event endpoints.
    /// When unset, those endpoints accept unauthenticated requests
    /// (development only).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Gateway integration settings
    #[serde(default)]
    pub gateway: GatewaySettings,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
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

fn default_auto_migrate() -> bool {
    true
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            api_key: None,
            gateway: GatewaySettings::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Load configuration from layered sources:
/// `config/default.toml`, then `config/<env>.toml`, then `APP__`-prefixed
/// environment variables (e.g. `APP__GATEWAY__AUTO_INVOICE=false`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://payment_gateway.db?mode=rwc")?
        .set_default("environment", run_env.clone())?;

    let default_file = Path::new(CONFIG_DIR).join("default.toml");
    if default_file.exists() {
        builder = builder.add_source(File::from(default_file));
    }

    let env_file = Path::new(CONFIG_DIR).join(format!("{run_env}.toml"));
    if env_file.exists() {
        builder = builder.add_source(File::from(env_file));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    Ok(cfg)
}

/// Initialise the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("payment_gateway_api={level},tower_http=info");
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_settings_defaults() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.order_status_authorized, "processing_authorized");
        assert_eq!(settings.order_status_captured, "processing_captured");
        assert!(settings.auto_invoice);
    }

    #[test]
    fn config_constructor_defaults() {
        let cfg = AppConfig::new("sqlite::memory:".to_string());
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.log_level(), "info");
        assert!(cfg.auto_migrate);
        assert!(cfg.api_key.is_none());
        assert!(!cfg.is_production());
    }
}
