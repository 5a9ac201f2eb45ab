use std::sync::Arc;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::clock::Clock;

pub mod challenge;

pub use challenge::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}
