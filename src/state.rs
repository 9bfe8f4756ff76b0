use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub session_key: Vec<u8>,
    /// Retry backoff unit of the task processor, used to report when a
    /// failed task becomes eligible again.
    pub task_backoff_unit: Duration,
}

pub type SharedState = Arc<AppState>;
