//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges and address syntax
//! - Detect duplicate route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("route '{route}' has invalid upstream '{upstream}'")]
    Upstream { route: String, upstream: String },

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("relay protocol must not be empty")]
    EmptyProtocol,

    #[error("relay buffer size must be greater than zero")]
    ZeroBufferSize,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        let valid_upstream = Authority::try_from(route.upstream.as_str())
            .map(|authority| authority.port_u16().is_some())
            .unwrap_or(false);
        if !valid_upstream {
            errors.push(ValidationError::Upstream {
                route: route.name.clone(),
                upstream: route.upstream.clone(),
            });
        }
    }

    if config.relay.protocol.trim().is_empty() {
        errors.push(ValidationError::EmptyProtocol);
    }
    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
