mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

use crate::gateway::GatewayClient;
use crate::notify::Notifier;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Shared secret for inbound webhook signature verification.
    pub webhook_secret: String,
    /// Outbound gateway API client (transfer initiation).
    pub gateway: Arc<GatewayClient>,
    /// Best-effort post-commit notification sink.
    pub notifier: Arc<Notifier>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
