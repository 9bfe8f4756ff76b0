use super::session::{UserSession, ADMIN_ONLY};
use crate::error::ServiceResult;
use crate::tasks::{store, ApiTask, TaskStatus};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_TASK_LIMIT: i64 = 100;
const MAX_TASK_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: ApiTask,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub claimable_now: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks))
        .with_state(state)
}

async fn list_tasks(
    session: UserSession,
    State(state): State<SharedState>,
    Query(query): Query<TaskQuery>,
) -> ServiceResult<Json<Vec<TaskView>>> {
    session.require_role(ADMIN_ONLY)?;

    let limit = query.limit.unwrap_or(DEFAULT_TASK_LIMIT).clamp(1, MAX_TASK_LIMIT);
    let tasks = store::list_tasks(&state.pool, query.status, limit).await?;

    let now = Utc::now();
    let out = tasks
        .into_iter()
        .map(|task| TaskView {
            next_attempt_at: task.next_attempt_at(state.task_backoff_unit),
            claimable_now: task.is_claimable(now, state.task_backoff_unit),
            task,
        })
        .collect();
    Ok(Json(out))
}
