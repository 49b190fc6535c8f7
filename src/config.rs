use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_BATCH_CONCURRENCY: usize = 8;
const DEFAULT_TOLERANCE_CENTS: u32 = 1;

/// One of the three counterparties the brokerage settles with. Party
/// identity lives here, not in code: the legacy portal hardcoded these ids
/// in scripts and paid for it every time a party record changed.
#[derive(Clone, Debug, Deserialize)]
pub struct PartyConfig {
    pub name: String,
    /// Short code used in generated PO and invoice numbers.
    pub code: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PartiesConfig {
    pub broker: PartyConfig,
    pub intermediary: PartyConfig,
    pub printer: PartyConfig,
}

impl Default for PartiesConfig {
    fn default() -> Self {
        Self {
            broker: PartyConfig {
                name: "Impact".to_string(),
                code: "IMP".to_string(),
            },
            intermediary: PartyConfig {
                name: "Bradford".to_string(),
                code: "BRD".to_string(),
            },
            printer: PartyConfig {
                name: "JD".to_string(),
                code: "JD".to_string(),
            },
        }
    }
}

/// Settings for batch reconciliation runs.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ReconciliationConfig {
    /// Per-field tolerance in cents before a stored value counts as drifted.
    #[serde(default = "default_tolerance_cents")]
    #[validate(range(min = 1, max = 100))]
    pub tolerance_cents: u32,

    /// How many records are reconciled concurrently. Each record still gets
    /// its own transaction.
    #[serde(default = "default_batch_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub batch_concurrency: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance_cents: DEFAULT_TOLERANCE_CENTS,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Server host address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging).
    #[serde(default)]
    pub log_json: bool,

    /// Create missing tables from entity definitions on startup (sqlite/dev).
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default)]
    pub parties: PartiesConfig,

    #[serde(default)]
    #[validate]
    pub reconciliation: ReconciliationConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
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
fn default_db_timeout_secs() -> u64 {
    10
}
fn default_db_idle_timeout_secs() -> u64 {
    300
}
fn default_tolerance_cents() -> u32 {
    DEFAULT_TOLERANCE_CENTS
}
fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

impl AppConfig {
    /// Minimal constructor for tests and the CLI.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            host: default_host(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_timeout_secs(),
            db_acquire_timeout_secs: default_db_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            parties: PartiesConfig::default(),
            reconciliation: ReconciliationConfig::default(),
        }
    }
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// overlay, and `APP__`-prefixed environment variables, in that order.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    info!(environment = %app_config.environment, "configuration loaded");
    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("printbroker_api={level},tower_http=info");
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.reconciliation.tolerance_cents, 1);
        assert_eq!(cfg.parties.broker.code, "IMP");
    }

    #[test]
    fn out_of_range_tolerance_fails_validation() {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.reconciliation.tolerance_cents = 0;
        assert!(cfg.validate().is_err());
    }
}
