//! Persisted work queue backed by the `api_tasks` table.

pub mod handlers;
pub mod processor;
pub mod store;

use crate::domain::models::CohortType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "api_task_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Unprocessed,
    Processing,
    Processed,
    Failed,
    /// Reserved for operators; the processor never sets it.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskType {
    AssignCohortRole,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::AssignCohortRole => "ASSIGN_COHORT_ROLE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignCohortRoleData {
    pub user_id: Uuid,
    pub cohort_type: CohortType,
}

/// A typed task ready to be enqueued.
#[derive(Debug, Clone)]
pub enum NewTask {
    AssignCohortRole(AssignCohortRoleData),
}

impl NewTask {
    pub fn task_type(&self) -> TaskType {
        match self {
            NewTask::AssignCohortRole(_) => TaskType::AssignCohortRole,
        }
    }

    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            NewTask::AssignCohortRole(data) => serde_json::to_value(data),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiTask {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    pub data: serde_json::Value,
    pub process_start_time: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub retry_limit: i32,
    pub last_execution_failure_details: Option<String>,
    pub last_retry_time: Option<DateTime<Utc>>,
    pub execute_on_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Largest exponent applied to the backoff unit. Past this the wait is
/// already decades long for any sane unit.
pub const MAX_BACKOFF_EXPONENT: i32 = 30;

/// Wait after a failure before the task may be claimed again:
/// `2^(retry_count - 1) * unit`, where `retry_count` is the stored,
/// already incremented counter.
pub fn retry_backoff(retry_count: i32, unit: Duration) -> chrono::Duration {
    let factor = 2f64.powi(retry_count.min(MAX_BACKOFF_EXPONENT + 1) - 1);
    let millis = unit.as_millis() as f64 * factor;
    // `as` saturates at i64::MAX, which is still a valid duration.
    chrono::Duration::milliseconds(millis.round() as i64)
}

impl ApiTask {
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.retry_limit
    }

    /// Earliest instant the claim query will pick this task up, if ever.
    pub fn next_attempt_at(&self, backoff_unit: Duration) -> Option<DateTime<Utc>> {
        match self.status {
            TaskStatus::Unprocessed => Some(self.execute_on_time),
            TaskStatus::Failed if !self.retries_exhausted() => self
                .last_retry_time
                .and_then(|at| at.checked_add_signed(retry_backoff(self.retry_count, backoff_unit))),
            _ => None,
        }
    }

    /// In-process mirror of the claim predicate in [`store::PgTaskStore`].
    pub fn is_claimable(&self, now: DateTime<Utc>, backoff_unit: Duration) -> bool {
        match self.status {
            TaskStatus::Unprocessed => self.execute_on_time <= now,
            TaskStatus::Failed => self.next_attempt_at(backoff_unit).is_some_and(|at| at < now),
            _ => false,
        }
    }
}

#[cfg(test)]
impl ApiTask {
    pub fn pending(task_type: &str, data: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            status: TaskStatus::Unprocessed,
            data,
            process_start_time: None,
            retry_count: 0,
            retry_limit: 3,
            last_execution_failure_details: None,
            last_retry_time: None,
            execute_on_time: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: Duration = Duration::from_secs(8);

    fn failed(retry_count: i32, last_retry: DateTime<Utc>) -> ApiTask {
        let mut task = ApiTask::pending("ASSIGN_COHORT_ROLE", serde_json::json!({}), last_retry);
        task.status = TaskStatus::Failed;
        task.retry_count = retry_count;
        task.last_retry_time = Some(last_retry);
        task
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(retry_backoff(1, UNIT), chrono::Duration::seconds(8));
        assert_eq!(retry_backoff(2, UNIT), chrono::Duration::seconds(16));
        assert_eq!(retry_backoff(3, UNIT), chrono::Duration::seconds(32));
        assert_eq!(retry_backoff(0, UNIT), chrono::Duration::seconds(4));
    }

    #[test]
    fn test_failed_task_waits_out_backoff() {
        let failed_at = Utc::now();
        let task = failed(2, failed_at);
        assert!(!task.is_claimable(failed_at + chrono::Duration::seconds(15), UNIT));
        assert!(!task.is_claimable(failed_at + chrono::Duration::seconds(16), UNIT));
        assert!(task.is_claimable(failed_at + chrono::Duration::milliseconds(16_001), UNIT));
    }

    #[test]
    fn test_backoff_exponent_is_capped() {
        assert_eq!(retry_backoff(60, UNIT), retry_backoff(MAX_BACKOFF_EXPONENT + 1, UNIT));
        assert_eq!(retry_backoff(i32::MAX, UNIT), retry_backoff(MAX_BACKOFF_EXPONENT + 1, UNIT));
        assert!(retry_backoff(60, Duration::from_secs(u64::MAX)) > chrono::Duration::zero());
    }

    #[test]
    fn test_high_retry_count_does_not_overflow() {
        let failed_at = Utc::now();
        let mut task = failed(60, failed_at);
        task.retry_limit = 100;
        let next = task.next_attempt_at(UNIT).unwrap();
        assert!(next > failed_at + chrono::Duration::days(365));
        assert!(!task.is_claimable(failed_at + chrono::Duration::days(30), UNIT));

        assert_eq!(task.next_attempt_at(Duration::from_secs(u64::MAX)), None);
        assert!(!task.is_claimable(failed_at, Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn test_exhausted_task_never_reclaimed() {
        let failed_at = Utc::now();
        let task = failed(3, failed_at);
        assert!(task.retries_exhausted());
        assert_eq!(task.next_attempt_at(UNIT), None);
        assert!(!task.is_claimable(failed_at + chrono::Duration::days(30), UNIT));
    }

    #[test]
    fn test_scheduling_floor() {
        let now = Utc::now();
        let mut task = ApiTask::pending("ASSIGN_COHORT_ROLE", serde_json::json!({}), now);
        task.execute_on_time = now + chrono::Duration::minutes(5);
        assert!(!task.is_claimable(now, UNIT));
        assert!(task.is_claimable(now + chrono::Duration::minutes(5), UNIT));
    }

    #[test]
    fn test_in_flight_and_terminal_states_not_claimable() {
        let now = Utc::now();
        for status in [TaskStatus::Processing, TaskStatus::Processed, TaskStatus::Cancelled] {
            let mut task = ApiTask::pending("ASSIGN_COHORT_ROLE", serde_json::json!({}), now);
            task.status = status;
            assert!(!task.is_claimable(now + chrono::Duration::hours(1), UNIT));
        }
    }

    #[test]
    fn test_new_task_payload_shape() {
        let user_id = Uuid::new_v4();
        let task = NewTask::AssignCohortRole(AssignCohortRoleData {
            user_id,
            cohort_type: CohortType::ProgrammingBitcoin,
        });
        assert_eq!(task.task_type().as_str(), "ASSIGN_COHORT_ROLE");
        let data = task.data().unwrap();
        assert_eq!(data["cohort_type"], "PROGRAMMING_BITCOIN");
        assert_eq!(data["user_id"], user_id.to_string());
    }
}
