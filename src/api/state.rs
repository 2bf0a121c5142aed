use diesel::PgConnection;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::client::Assistant;
use crate::config::Rules;
use crate::db::store::{self, DbConn, DbPool};
use crate::services::capture::MetricCapture;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub rules: Arc<Rules>,
    pub capture: MetricCapture,
    pub assistant: Arc<dyn Assistant>,
}

impl AppState {
    pub fn conn(&self) -> Result<DbConn, ApiError> {
        Ok(self.pool.get()?)
    }
}

/// Runs blocking work (diesel, code execution, the assistant call) on the
/// runtime's blocking pool.
pub async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
}

/// Unit of work: commit when `work` succeeds, roll back otherwise. Persistence
/// failures are prefixed with `context` so callers see what was being saved.
pub fn transactional<T, F>(conn: &mut PgConnection, context: &str, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, ApiError>,
{
    store::in_transaction(conn, context, work).map_err(|e| match e {
        ApiError::Persistence(msg) => ApiError::Persistence(format!("{}: {}", context, msg)),
        other => other,
    })
}
