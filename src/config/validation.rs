//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, addresses parseable)
//! - Enforce the proof-of-work key rules before the service starts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{Config, RateLimitSection};
use crate::security::pow::{decode_secret_key, MAX_DIFFICULTY};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("listener.tls.{0} must not be empty")]
    TlsPath(&'static str),

    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    MetricsAddress(String),

    #[error("ip_rate_limiter.{route}: max_requests must be > 0 when enabled")]
    RateLimitThreshold { route: &'static str },

    #[error("ip_rate_limiter.{route}: window_ms must be > 0 when enabled")]
    RateLimitWindow { route: &'static str },

    #[error("proof_of_work: {0}")]
    PowKey(#[from] crate::security::pow::PowKeyError),

    #[error("proof_of_work.difficulty must be between 1 and {MAX_DIFFICULTY}, got {0}")]
    PowDifficulty(u8),

    #[error("proof_of_work.ttl_seconds must be > 0 when enabled")]
    PowTtl,
}

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::TlsPath("cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::TlsPath("key_path"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let rate_sections = [
        ("register", &config.ip_rate_limiter.register),
        ("login", &config.ip_rate_limiter.login),
        ("logout", &config.ip_rate_limiter.logout),
        ("profile", &config.ip_rate_limiter.profile),
    ];
    for (route, section) in rate_sections {
        check_rate_section(route, section, &mut errors);
    }

    if config.proof_of_work.enable {
        // A weak or absent key must stop startup, never degrade silently.
        if let Err(e) = decode_secret_key(&config.proof_of_work.secret_key) {
            errors.push(ValidationError::PowKey(e));
        }
        let difficulty = config.proof_of_work.difficulty;
        if difficulty == 0 || difficulty > MAX_DIFFICULTY {
            errors.push(ValidationError::PowDifficulty(difficulty));
        }
        if config.proof_of_work.ttl_seconds <= 0 {
            errors.push(ValidationError::PowTtl);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rate_section(
    route: &'static str,
    section: &RateLimitSection,
    errors: &mut Vec<ValidationError>,
) {
    if !section.enable {
        return;
    }
    if section.max_requests == 0 {
        errors.push(ValidationError::RateLimitThreshold { route });
    }
    if section.window_ms == 0 {
        errors.push(ValidationError::RateLimitWindow { route });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = Config::default();
        config.listener.bind_address = "not-an-address".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::BindAddress(_))));
    }

    #[test]
    fn enabled_pow_without_key_is_fatal() {
        let mut config = Config::default();
        config.proof_of_work.enable = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::PowKey(_))));
    }

    #[test]
    fn enabled_pow_with_short_key_is_fatal() {
        let mut config = Config::default();
        config.proof_of_work.enable = true;
        config.proof_of_work.secret_key = STANDARD.encode(b"short");

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::PowKey(_))));
    }

    #[test]
    fn disabled_pow_ignores_key() {
        let config = Config::default();
        assert!(!config.proof_of_work.enable);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = Config::default();
        config.listener.bind_address = "bogus".into();
        config.ip_rate_limiter.login.enable = true;
        config.ip_rate_limiter.login.max_requests = 0;
        config.ip_rate_limiter.login.window_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn valid_pow_section_passes() {
        let mut config = Config::default();
        config.proof_of_work.enable = true;
        config.proof_of_work.secret_key = STANDARD.encode(b"0123456789abcdef");
        config.proof_of_work.difficulty = 12;

        assert!(validate_config(&config).is_ok());
    }
}
