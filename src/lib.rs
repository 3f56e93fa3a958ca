pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod stats;

pub use db::DbPool;

use anyhow::Result;
use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::TokenManager;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenManager,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Fails when no token signing secret is configured.
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let tokens = TokenManager::new(config.jwt_secret()?, config.auth.token_ttl_secs);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Ok(Self {
            config,
            db,
            tokens,
            rate_limiter,
        })
    }
}
