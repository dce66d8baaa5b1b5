//! Configuration validation.

use super::types::ServerConfig;
use crate::logging::LogFormat;
use axum::http::HeaderName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid connection pool size: min {min}, max {max}")]
    InvalidPoolSize { min: u32, max: u32 },

    #[error("Invalid principal header: {0}")]
    InvalidPrincipalHeader(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

/// Validate server configuration, collecting every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    } else if config.server.socket_addr().is_err() {
        errors.push(ConfigError::InvalidBindAddress(config.server.host.clone()));
    }

    if let Some(url) = &config.database.url {
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            errors.push(ConfigError::InvalidDatabaseUrl);
        }
        if config.database.max_connections == 0
            || config.database.min_connections > config.database.max_connections
        {
            errors.push(ConfigError::InvalidPoolSize {
                min: config.database.min_connections,
                max: config.database.max_connections,
            });
        }
    }

    if HeaderName::try_from(config.authz.principal_header.as_str()).is_err() {
        errors.push(ConfigError::InvalidPrincipalHeader(
            config.authz.principal_header.clone(),
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if LogFormat::parse(&config.logging.format).is_none() {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
