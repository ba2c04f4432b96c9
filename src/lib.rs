use std::sync::Arc;

use cache::Cache;
use config::Config;
use error::{AppError, CacheError};
use shutdown::FatalSignal;

pub mod cache;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod result;
pub mod routes;
pub mod shutdown;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
    pub config: Arc<Config>,
    pub fatal: FatalSignal,
}

impl AppState {
    pub fn new(cache: Cache, config: Config) -> Self {
        Self {
            cache,
            config: Arc::new(config),
            fatal: FatalSignal::new(),
        }
    }

    /// Maps a cache failure to its response. Losing the backend also trips
    /// the process-wide fatal signal.
    pub fn escalate(&self, e: CacheError) -> AppError {
        if e.is_fatal() {
            self.fatal.trip(&e.to_string());
        } else {
            tracing::error!("Cache operation failed: {}", e);
        }
        AppError::from(e)
    }
}
