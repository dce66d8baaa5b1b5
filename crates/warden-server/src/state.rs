//! Shared application state.

use crate::config::ServerConfig;
use crate::db;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use warden_authz::{AuthzGuard, Enforcer, ResourceMapper};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub enforcer: Arc<Enforcer>,
    pub guard: AuthzGuard,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Open the configured store and apply the bootstrap.
    pub async fn new(config: &ServerConfig) -> Result<Self> {
        let enforcer = match &config.database.url {
            Some(_) => {
                let pool = db::create_pool(&config.database).await?;
                Enforcer::postgres(pool).await?
            }
            None => {
                warn!("No database.url configured, policies live in memory only");
                Enforcer::in_memory()
            }
        };

        let created = enforcer.seed(&config.bootstrap).await?;
        info!(created, "Authorization store ready");

        Ok(Self::with_enforcer(Arc::new(enforcer), config))
    }

    /// Build state around an existing enforcer.
    pub fn with_enforcer(enforcer: Arc<Enforcer>, config: &ServerConfig) -> Self {
        let guard = AuthzGuard::new(enforcer.clone())
            .with_mapper(ResourceMapper::new(config.authz.resource_segment_index))
            .with_missing_domain(config.authz.missing_domain);

        Self {
            enforcer,
            guard,
            config: Arc::new(config.clone()),
        }
    }
}
