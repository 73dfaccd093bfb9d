//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check session keys decode to usable key pairs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, StoreConfig};
use crate::session::cookie::is_cookie_name_valid;

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.max_body_bytes == 0 {
        errors.push(ValidationError::new("timeouts.max_body_bytes", "must be greater than 0"));
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_store(&mut errors, "sessions.cookie", &config.sessions.cookie);
    check_store(&mut errors, "sessions.filesystem", &config.sessions.filesystem);

    let memory = &config.sessions.memory;
    if memory.enabled {
        if memory.max_lifetime_secs == 0 {
            errors.push(ValidationError::new(
                "sessions.memory.max_lifetime_secs",
                "must be greater than 0",
            ));
        }
        if !is_cookie_name_valid(&memory.cookie_name) {
            errors.push(ValidationError::new(
                "sessions.memory.cookie_name",
                format!("{:?} is not a valid cookie name", memory.cookie_name),
            ));
        }
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("{:?} is not a valid socket address", value),
        ));
    }
}

fn check_store(errors: &mut Vec<ValidationError>, field: &str, store: &StoreConfig) {
    if !store.enabled {
        return;
    }
    if store.path.is_empty() {
        errors.push(ValidationError::new(format!("{}.path", field), "must not be empty"));
    }
    for (i, key) in store.keys.iter().enumerate() {
        if let Err(message) = key.to_key_pair() {
            errors.push(ValidationError::new(format!("{}.keys[{}]", field, i), message));
        }
    }
}
