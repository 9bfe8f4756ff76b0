use super::{ApiTask, NewTask, TaskStatus, MAX_BACKOFF_EXPONENT};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Atomically move up to `limit` eligible tasks to `PROCESSING`.
    ///
    /// Implementations must never hand the same task to two concurrent
    /// callers.
    async fn claim_batch(&self, now: DateTime<Utc>, limit: i64, backoff_unit: Duration) -> Result<Vec<ApiTask>>;

    async fn mark_processed(&self, id: Uuid) -> Result<()>;

    /// Record a failed attempt: bump the retry counter, stamp the retry time
    /// and keep the error text for operators.
    async fn mark_failed(&self, id: Uuid, failed_at: DateTime<Utc>, details: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn claim_batch(&self, now: DateTime<Utc>, limit: i64, backoff_unit: Duration) -> Result<Vec<ApiTask>> {
        let tasks = sqlx::query_as::<_, ApiTask>(
            r#"
            UPDATE api_tasks t
            SET status = 'PROCESSING',
                process_start_time = $1,
                updated_at = $1
            FROM (
                SELECT id
                FROM api_tasks
                WHERE (status = 'UNPROCESSED' AND execute_on_time <= $1)
                   OR (status = 'FAILED'
                       AND retry_count < retry_limit
                       AND last_retry_time < $1 - ($3::float8 * power(2::float8, (LEAST(retry_count, $4 + 1) - 1)::float8)) * INTERVAL '1 second')
                ORDER BY updated_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) sub
            WHERE t.id = sub.id
            RETURNING
                t.id,
                t.type,
                t.status,
                t.data,
                t.process_start_time,
                t.retry_count,
                t.retry_limit,
                t.last_execution_failure_details,
                t.last_retry_time,
                t.execute_on_time,
                t.created_at,
                t.updated_at
            "#,
        )
        .bind(now)
        .bind(limit)
        .bind(backoff_unit.as_secs_f64())
        .bind(MAX_BACKOFF_EXPONENT)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE api_tasks
            SET status = 'PROCESSED', updated_at = now()
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, failed_at: DateTime<Utc>, details: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE api_tasks
            SET status = 'FAILED',
                retry_count = retry_count + 1,
                last_retry_time = $2,
                last_execution_failure_details = $3,
                updated_at = $2
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(failed_at)
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Insert a task on an open connection so it commits with the caller's
/// transaction.
pub async fn enqueue(conn: &mut PgConnection, task: &NewTask) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO api_tasks (id, type, data)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(id)
    .bind(task.task_type().as_str())
    .bind(task.data()?)
    .execute(conn)
    .await?;
    tracing::debug!("Enqueued {} task {}", task.task_type().as_str(), id);
    Ok(id)
}

pub async fn list_tasks(pool: &PgPool, status: Option<TaskStatus>, limit: i64) -> Result<Vec<ApiTask>> {
    let tasks = sqlx::query_as::<_, ApiTask>(
        r#"
        SELECT
            id,
            type,
            status,
            data,
            process_start_time,
            retry_count,
            retry_limit,
            last_execution_failure_details,
            last_retry_time,
            execute_on_time,
            created_at,
            updated_at
        FROM api_tasks
        WHERE $1::api_task_status IS NULL OR status = $1
        ORDER BY updated_at DESC
        LIMIT $2
        "#,
    )
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use tokio::sync::Mutex;

    /// Store that applies the claim predicate under a single lock.
    #[derive(Default)]
    pub struct InMemoryTaskStore {
        tasks: Mutex<Vec<ApiTask>>,
    }

    impl InMemoryTaskStore {
        pub fn with_tasks(tasks: Vec<ApiTask>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
            }
        }

        pub async fn get(&self, id: Uuid) -> Option<ApiTask> {
            self.tasks.lock().await.iter().find(|t| t.id == id).cloned()
        }

        pub async fn push(&self, task: ApiTask) {
            self.tasks.lock().await.push(task);
        }
    }

    #[async_trait]
    impl TaskStore for InMemoryTaskStore {
        async fn claim_batch(&self, now: DateTime<Utc>, limit: i64, backoff_unit: Duration) -> Result<Vec<ApiTask>> {
            let mut tasks = self.tasks.lock().await;
            let mut eligible: Vec<usize> = tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.is_claimable(now, backoff_unit))
                .map(|(i, _)| i)
                .collect();
            eligible.sort_by_key(|&i| tasks[i].updated_at);
            eligible.truncate(limit.max(0) as usize);

            let mut claimed = Vec::with_capacity(eligible.len());
            for i in eligible {
                let task = &mut tasks[i];
                task.status = TaskStatus::Processing;
                task.process_start_time = Some(now);
                task.updated_at = now;
                claimed.push(task.clone());
            }
            Ok(claimed)
        }

        async fn mark_processed(&self, id: Uuid) -> Result<()> {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks
                .iter_mut()
                .find(|t| t.id == id && t.status == TaskStatus::Processing)
            {
                task.status = TaskStatus::Processed;
                task.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn mark_failed(&self, id: Uuid, failed_at: DateTime<Utc>, details: &str) -> Result<()> {
            let mut tasks = self.tasks.lock().await;
            if let Some(task) = tasks
                .iter_mut()
                .find(|t| t.id == id && t.status == TaskStatus::Processing)
            {
                task.status = TaskStatus::Failed;
                task.retry_count += 1;
                task.last_retry_time = Some(failed_at);
                task.last_execution_failure_details = Some(details.to_string());
                task.updated_at = failed_at;
            }
            Ok(())
        }
    }
}
