//! Configuration loading utilities.

use super::types::ServerConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Environment prefix; `WARDEN__AUTHZ__MISSING_DOMAIN=skip` sets `authz.missing_domain`.
pub const ENV_PREFIX: &str = "WARDEN";

/// Load configuration from various sources.
pub struct ConfigLoader {
    config_path: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration: embedded defaults, then the file, then the environment.
    pub fn load(&self) -> Result<ServerConfig> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::File::from_str(
            include_str!("defaults.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if Path::new(path).exists() {
                info!(path = %path, "Loading config file");
                builder = builder.add_source(config::File::with_name(path));
            } else {
                warn!(path = %path, "Config file not found, skipping");
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("bootstrap.system_admins")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from environment.
pub fn load_config() -> Result<ServerConfig> {
    let mut loader = ConfigLoader::new();
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        loader = loader.with_config_path(path);
    }

    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_authz::{MissingDomain, UserId};

    #[test]
    fn test_embedded_defaults() {
        let config = ConfigLoader::new()
            .with_env_prefix("WARDEN_TEST_DEFAULTS")
            .load()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.authz.resource_segment_index, 2);
        assert_eq!(config.authz.missing_domain, MissingDomain::Deny);
        assert_eq!(config.authz.principal_header, "x-user-id");
        assert!(config.bootstrap.base_policies);
        assert!(config.bootstrap.system_admins.is_empty());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("warden-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[authz]
missing_domain = "skip"

[bootstrap]
system_admins = ["user:1", "2"]

[[bootstrap.policies]]
subject = "AUDITOR"
domain = "system"
resource = "policies"
action = "read"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_config_path(path.to_string_lossy())
            .with_env_prefix("WARDEN_TEST_FILE")
            .load();
        std::fs::remove_file(&path).ok();
        let config = config.unwrap();

        assert_eq!(config.authz.missing_domain, MissingDomain::Skip);
        assert_eq!(
            config.bootstrap.system_admins,
            vec![UserId::new("1").unwrap(), UserId::new("2").unwrap()]
        );
        assert_eq!(config.bootstrap.policies.len(), 1);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        std::env::set_var("WARDEN_TEST_ENV__SERVER__PORT", "9191");
        std::env::set_var("WARDEN_TEST_ENV__DATABASE__URL", "postgres://localhost/warden");
        std::env::set_var("WARDEN_TEST_ENV__BOOTSTRAP__SYSTEM_ADMINS", "user:7,user:8");

        let config = ConfigLoader::new()
            .with_env_prefix("WARDEN_TEST_ENV")
            .load()
            .unwrap();

        assert_eq!(config.server.port, 9191);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/warden"));
        assert_eq!(config.bootstrap.system_admins.len(), 2);
    }

    #[test]
    fn test_missing_file_is_not_fatal() {
        let config = ConfigLoader::new()
            .with_config_path("/nonexistent/warden.toml")
            .with_env_prefix("WARDEN_TEST_MISSING")
            .load();
        assert!(config.is_ok());
    }
}
