use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::services::numbering::NumberingScheme;
use crate::services::settings::PurchasingDefaults;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://purchasing.db?mode=rwc";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
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

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Approval threshold used to seed purchasing settings on first start
    #[serde(default = "default_approval_threshold")]
    #[validate(custom = "validate_approval_threshold")]
    pub approval_threshold: Decimal,

    /// Numbering scheme for purchase requests ("global" or "yearly")
    #[serde(default = "default_pr_numbering")]
    pub pr_numbering: NumberingScheme,

    /// Numbering scheme for purchase orders
    #[serde(default = "default_global_numbering")]
    pub po_numbering: NumberingScheme,

    /// Numbering scheme for receipts
    #[serde(default = "default_global_numbering")]
    pub receipt_numbering: NumberingScheme,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the database and environment
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: default_true_bool(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            approval_threshold: default_approval_threshold(),
            pr_numbering: default_pr_numbering(),
            po_numbering: default_global_numbering(),
            receipt_numbering: default_global_numbering(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Settings written to the store the first time the engine starts against it
    pub fn purchasing_defaults(&self) -> PurchasingDefaults {
        PurchasingDefaults {
            approval_threshold: self.approval_threshold,
            pr_numbering: self.pr_numbering,
            po_numbering: self.po_numbering,
            receipt_numbering: self.receipt_numbering,
        }
    }

    /// Cross-field checks that the derive cannot express
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.database_url.starts_with("sqlite::memory") {
            let mut err = ValidationError::new("database_url");
            err.message = Some("in-memory SQLite is not allowed in production".into());
            errors.add("database_url", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
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

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_approval_threshold() -> Decimal {
    Decimal::ONE_THOUSAND
}

fn default_pr_numbering() -> NumberingScheme {
    NumberingScheme::Yearly
}

fn default_global_numbering() -> NumberingScheme {
    NumberingScheme::Global
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

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_approval_threshold(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        let mut err = ValidationError::new("approval_threshold");
        err.message = Some("approval_threshold cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("purchasing_engine={},sea_orm=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
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
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
