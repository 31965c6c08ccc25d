use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYMENT_PROVIDER: &str = "mock";
const DEFAULT_CURRENCY: &str = "usd";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "database_url is required"))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1, message = "environment is required"))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Payment provider: "mock" or "stripe"
    #[serde(default = "default_payment_provider")]
    #[validate(custom = "validate_payment_provider")]
    pub payment_provider: String,

    /// Stripe secret API key
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Override for the Stripe API base URL
    #[serde(default)]
    pub stripe_api_base: Option<String>,

    /// Webhook secret for verifying payment gateway callbacks
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub payment_webhook_tolerance_secs: u64,

    /// Upper bound for a single payment gateway call (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub payment_gateway_timeout_secs: u64,

    /// Currency used when a checkout request does not name one
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "default_currency must be a 3-letter ISO code"))]
    pub default_currency: String,

    /// Default page size for order listings
    #[serde(default = "default_api_page_size")]
    #[validate(range(min = 1))]
    pub api_default_page_size: u64,

    /// Maximum page size allowed for order listings
    #[serde(default = "default_api_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the basics
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            payment_provider: default_payment_provider(),
            stripe_secret_key: None,
            stripe_api_base: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance_secs(),
            payment_gateway_timeout_secs: default_gateway_timeout_secs(),
            default_currency: default_currency(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn uses_stripe(&self) -> bool {
        self.payment_provider.eq_ignore_ascii_case("stripe")
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_gateway_timeout_secs)
    }

    /// Webhook secret, treating blank values as unset
    pub fn webhook_secret(&self) -> Option<&str> {
        self.payment_webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Explicit CORS origins, if any
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && self.cors_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.uses_stripe()
            && self
                .stripe_secret_key
                .as_deref()
                .map_or(true, |key| key.trim().is_empty())
        {
            let mut err = ValidationError::new("stripe_secret_key_required");
            err.message = Some("Set APP__STRIPE_SECRET_KEY when payment_provider is stripe".into());
            errors.add("stripe_secret_key", err);
        }

        if self.is_production() {
            if self.webhook_secret().is_none() {
                let mut err = ValidationError::new("payment_webhook_secret_required");
                err.message = Some(
                    "Set APP__PAYMENT_WEBHOOK_SECRET; unsigned payment webhooks are rejected in production"
                        .into(),
                );
                errors.add("payment_webhook_secret", err);
            }
            if !self.uses_stripe() {
                let mut err = ValidationError::new("mock_payment_provider");
                err.message = Some("The mock payment provider must not be used in production".into());
                errors.add("payment_provider", err);
            }
        }

        if self.api_default_page_size > self.api_max_page_size {
            let mut err = ValidationError::new("api_default_page_size");
            err.message = Some("api_default_page_size must not exceed api_max_page_size".into());
            errors.add("api_default_page_size", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
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

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}

fn default_db_min_connections() -> u32 {
    2
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_payment_provider() -> String {
    DEFAULT_PAYMENT_PROVIDER.to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    crate::webhooks::DEFAULT_TOLERANCE_SECS
}

fn default_gateway_timeout_secs() -> u64 {
    10
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_api_page_size() -> u64 {
    10
}

fn default_api_max_page_size() -> u64 {
    100
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_payment_provider(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "mock" | "stripe" => Ok(()),
        _ => {
            let mut err = ValidationError::new("payment_provider");
            err.message = Some("Must be one of: mock, stripe".into());
            Err(err)
        }
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_orders={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same as [`load_config`] with an explicit config directory and profile.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    fn production_ready() -> AppConfig {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        cfg.payment_provider = "stripe".into();
        cfg.stripe_secret_key = Some("sk_test_123".into());
        cfg.payment_webhook_secret = Some("whsec_123".into());
        cfg
    }

    #[test]
    fn production_ready_config_passes() {
        assert!(production_ready().validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_requires_webhook_secret() {
        let mut cfg = production_ready();
        cfg.payment_webhook_secret = Some("   ".into());
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("payment_webhook_secret"));
    }

    #[test]
    fn stripe_requires_secret_key() {
        let mut cfg = production_ready();
        cfg.stripe_secret_key = None;
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("stripe_secret_key"));
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let mut cfg = production_ready();
        cfg.cors_allow_any_origin = false;
        assert!(cfg.validate_additional_constraints().is_err());
        cfg.cors_allowed_origins = Some("https://shop.example.com, ".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.cors_origins(), vec!["https://shop.example.com"]);
    }

    #[test]
    fn development_allows_mock_without_secrets() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_provider_and_log_level() {
        let mut cfg = base_config();
        cfg.payment_provider = "paypal".into();
        cfg.log_level = "loud".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("payment_provider"));
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn loads_layered_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
                database_url = "sqlite::memory:"
                port = 9000
                log_level = "debug"
                api_default_page_size = 25
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            r#"
                port = 9100
                cors_allow_any_origin = true
            "#,
        )
        .unwrap();

        let config = load_config_from(dir.path(), "staging").unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.environment, "staging");
        assert_eq!(config.api_default_page_size, 25);
        assert_eq!(config.payment_provider, "mock");
        assert_eq!(config.gateway_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.toml"), "jwt_secret = \"x\"\n").unwrap();
        assert!(matches!(
            load_config_from(dir.path(), "development"),
            Err(AppConfigError::Load(_))
        ));
    }
}
