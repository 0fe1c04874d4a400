//! Shared handler state and CMS configuration.

use crate::folio::{
    credentials::{CredentialHasher, DEFAULT_HASH_COST},
    session::{SessionStore, DEFAULT_SESSION_TTL_SECONDS},
};
use std::{path::PathBuf, sync::Arc, time::Duration};

const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;
const DEFAULT_ASSETS_DIR: &str = "public";

#[derive(Clone, Debug)]
pub struct CmsConfig {
    reset_token_ttl_minutes: i64,
    session_ttl_seconds: u64,
    hash_cost: u32,
    assets_dir: PathBuf,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CmsConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reset_token_ttl_minutes: DEFAULT_RESET_TOKEN_TTL_MINUTES,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            hash_cost: DEFAULT_HASH_COST,
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
        }
    }

    #[must_use]
    pub fn with_reset_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.reset_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    #[must_use]
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    #[must_use]
    pub fn reset_token_ttl_minutes(&self) -> i64 {
        self.reset_token_ttl_minutes
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    #[must_use]
    pub fn assets_dir(&self) -> &PathBuf {
        &self.assets_dir
    }
}

/// State handed to every handler. `R` persists entities, `G` lists GitHub
/// repositories; both are swapped for in-memory versions in tests.
#[derive(Clone, Debug)]
pub struct AppState<R, G> {
    pub repository: R,
    pub github: G,
    pub hasher: CredentialHasher,
    pub sessions: SessionStore,
    pub config: Arc<CmsConfig>,
}

impl<R, G> AppState<R, G> {
    pub fn new(
        repository: R,
        github: G,
        hasher: CredentialHasher,
        sessions: SessionStore,
        config: CmsConfig,
    ) -> Self {
        Self {
            repository,
            github,
            hasher,
            sessions,
            config: Arc::new(config),
        }
    }
}
