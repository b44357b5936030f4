//! Configuration validation.
//!
//! Validation never mutates the config; it produces a [`ValidationReport`]
//! listing hard errors, warnings, and defaults that were applied, so the CLI
//! can surface all problems in one pass.

use crate::AurumConfig;
use common::Country;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("Feed base_url is required")]
    MissingFeedUrl,

    #[error("Feed timeout must be a positive number of seconds")]
    InvalidFeedTimeout,

    #[error("Unknown country code: {0}. Must be one of: IN, AE, UK")]
    UnknownCountry(String),

    #[error("Duplicate country code: {0}")]
    DuplicateCountry(String),

    #[error("Country {code}: tax rate must be between 0 and 100, got {rate}")]
    InvalidTaxRate { code: String, rate: f64 },

    #[error("Lock TTL must be a positive number of seconds")]
    InvalidLockTtl,

    #[error("Lock retention must be at least the lock TTL")]
    RetentionShorterThanTtl,

    #[error("{field} must be a positive number of seconds")]
    InvalidInterval { field: String },

    #[error("HTTP and WebSocket ports must differ, both set to {0}")]
    PortCollision(u16),

    #[error("Unresolved environment variable in {field}: {placeholder}")]
    UnresolvedEnvVar { field: String, placeholder: String },
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationIssue>,
    pub defaults_applied: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a loaded configuration
pub fn validate_config(config: &AurumConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.service.name.trim().is_empty() {
        report.errors.push(ValidationError::MissingServiceName);
    }

    if config.feed.base_url.trim().is_empty() {
        report.errors.push(ValidationError::MissingFeedUrl);
    }
    if config.feed.timeout_secs == 0 {
        report.errors.push(ValidationError::InvalidFeedTimeout);
    }
    if let Some(ref key) = config.feed.api_key {
        if crate::substitution::has_unresolved_env_vars(key) {
            report.errors.push(ValidationError::UnresolvedEnvVar {
                field: "feed.api_key".to_string(),
                placeholder: key.clone(),
            });
        }
    } else {
        report.warnings.push(ValidationIssue {
            field: "feed.api_key".to_string(),
            message: "no API key configured; upstream may rate-limit anonymous requests"
                .to_string(),
        });
    }

    let mut seen = Vec::new();
    for country in &config.countries {
        match Country::parse(&country.code) {
            None => {
                report
                    .errors
                    .push(ValidationError::UnknownCountry(country.code.clone()));
            }
            Some(parsed) => {
                if seen.contains(&parsed) {
                    report
                        .errors
                        .push(ValidationError::DuplicateCountry(country.code.clone()));
                }
                seen.push(parsed);
            }
        }
        if !(0.0..=100.0).contains(&country.tax_rate_percent) {
            report.errors.push(ValidationError::InvalidTaxRate {
                code: country.code.clone(),
                rate: country.tax_rate_percent,
            });
        }
    }
    for missing in Country::ALL.iter().filter(|c| !seen.contains(c)) {
        report.defaults_applied.push(ValidationIssue {
            field: format!("countries.{}", missing.code()),
            message: "not configured; served with default tax rate".to_string(),
        });
    }

    if config.locks.ttl_secs == 0 {
        report.errors.push(ValidationError::InvalidLockTtl);
    }
    if config.locks.retention_secs < config.locks.ttl_secs {
        report.errors.push(ValidationError::RetentionShorterThanTtl);
    }
    if config.locks.redis_url.is_none() {
        report.warnings.push(ValidationIssue {
            field: "locks.redis_url".to_string(),
            message: "no redis configured; locks are held in process memory only".to_string(),
        });
    }

    if config.scheduler.refresh_interval_secs == 0 {
        report.errors.push(ValidationError::InvalidInterval {
            field: "scheduler.refresh_interval_secs".to_string(),
        });
    }
    if config.alerts.scan_interval_secs == 0 {
        report.errors.push(ValidationError::InvalidInterval {
            field: "alerts.scan_interval_secs".to_string(),
        });
    }

    if config.pricing.calculation_validity_secs >= config.locks.ttl_secs
        && config.locks.ttl_secs > 0
    {
        report.warnings.push(ValidationIssue {
            field: "pricing.calculation_validity_secs".to_string(),
            message: "calculation validity window should be shorter than the lock TTL"
                .to_string(),
        });
    }

    if config.server.http_port == config.server.ws_port {
        report
            .errors
            .push(ValidationError::PortCollision(config.server.http_port));
    }

    report
}
