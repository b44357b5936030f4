use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod substitution;
pub mod validator;

pub use substitution::substitute_env_vars;
pub use validator::{validate_config, ValidationIssue, ValidationReport};

/// Errors raised while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unresolved environment variable: {0}")]
    UnresolvedVariable(String),
}

/// Top-level Aurum configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AurumConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default = "default_countries")]
    pub countries: Vec<CountryConfig>,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

/// Upstream price feed connection and cache freshness
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Base URL of the upstream metals price API
    pub base_url: String,
    /// Name of the environment variable holding the API key (substituted at load)
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
    /// Spot price and price table freshness window
    #[serde(default = "default_price_freshness_secs")]
    pub price_freshness_secs: u64,
    /// Exchange rate freshness window
    #[serde(default = "default_rates_freshness_secs")]
    pub rates_freshness_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.metals.dev/v1".to_string(),
            api_key: None,
            timeout_secs: default_feed_timeout_secs(),
            price_freshness_secs: default_price_freshness_secs(),
            rates_freshness_secs: default_rates_freshness_secs(),
        }
    }
}

/// Per-country tax rate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CountryConfig {
    pub code: String,
    /// Tax (GST/VAT) rate applied to the subtotal, in percent
    pub tax_rate_percent: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Advisory validity window of a price calculation, in seconds.
    /// Shorter than the lock TTL; display metadata only.
    #[serde(default = "default_calculation_validity_secs")]
    pub calculation_validity_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            calculation_validity_secs: default_calculation_validity_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    /// Time-to-live of an active price lock, in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub ttl_secs: u64,
    /// How long terminal (used/cancelled/expired) locks stay readable for audit
    #[serde(default = "default_lock_retention_secs")]
    pub retention_secs: u64,
    /// Redis connection URL; in-memory store is used when absent
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl_secs(),
            retention_secs: default_lock_retention_secs(),
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// Period of the alert evaluation tick, in seconds
    #[serde(default = "default_alert_interval_secs")]
    pub scan_interval_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_alert_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Period of the price refresh tick, in seconds
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Prometheus exporter port; the exporter is disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            metrics_port: None,
        }
    }
}

fn default_feed_timeout_secs() -> u64 {
    5
}

fn default_price_freshness_secs() -> u64 {
    60
}

fn default_rates_freshness_secs() -> u64 {
    12 * 60 * 60
}

fn default_calculation_validity_secs() -> u64 {
    60
}

fn default_lock_ttl_secs() -> u64 {
    300
}

fn default_lock_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_alert_interval_secs() -> u64 {
    30
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_ws_port() -> u16 {
    7080
}

fn default_countries() -> Vec<CountryConfig> {
    vec![
        CountryConfig {
            code: "IN".to_string(),
            tax_rate_percent: 3.0,
        },
        CountryConfig {
            code: "AE".to_string(),
            tax_rate_percent: 5.0,
        },
        CountryConfig {
            code: "UK".to_string(),
            tax_rate_percent: 20.0,
        },
    ]
}

impl AurumConfig {
    /// Tax rate for a country code, if configured
    pub fn tax_rate_for(&self, code: &str) -> Option<f64> {
        self.countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .map(|c| c.tax_rate_percent)
    }
}

/// Load a configuration file, applying `${VAR}` environment substitution
/// before parsing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AurumConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let substituted = substitute_env_vars(&raw)?;
    let config: AurumConfig = serde_yaml::from_str(&substituted)?;
    Ok(config)
}

/// Save a configuration to a YAML file
pub fn save_config<P: AsRef<Path>>(config: &AurumConfig, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml).map_err(|e| ConfigError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

/// Generate a configuration populated entirely from defaults
pub fn generate_default_config() -> AurumConfig {
    AurumConfig {
        service: ServiceConfig {
            name: "aurum".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        feed: FeedConfig::default(),
        countries: default_countries(),
        pricing: PricingConfig::default(),
        locks: LockConfig::default(),
        alerts: AlertConfig::default(),
        scheduler: SchedulerConfig::default(),
        server: ServerSection::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_all_countries() {
        let config = generate_default_config();
        assert_eq!(config.countries.len(), 3);
        assert_eq!(config.tax_rate_for("IN"), Some(3.0));
        assert_eq!(config.tax_rate_for("ae"), Some(5.0));
        assert_eq!(config.tax_rate_for("US"), None);
    }

    #[test]
    fn test_default_windows() {
        let config = generate_default_config();
        assert_eq!(config.feed.price_freshness_secs, 60);
        assert_eq!(config.feed.rates_freshness_secs, 43_200);
        assert_eq!(config.locks.ttl_secs, 300);
        assert_eq!(config.pricing.calculation_validity_secs, 60);
        assert!(config.pricing.calculation_validity_secs < config.locks.ttl_secs);
    }

    #[test]
    fn test_roundtrip_yaml() {
        let config = generate_default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AurumConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.service.name, "aurum");
        assert_eq!(parsed.locks.ttl_secs, config.locks.ttl_secs);
    }

    #[test]
    fn test_minimal_yaml_applies_defaults() {
        let yaml = "service:\n  name: aurum\n  version: 0.1.0\n";
        let parsed: AurumConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.scheduler.refresh_interval_secs, 60);
        assert_eq!(parsed.alerts.scan_interval_secs, 30);
        assert_eq!(parsed.server.http_port, 8080);
        assert_eq!(parsed.countries.len(), 3);
    }
}
