use super::handlers::HandlerRegistry;
use super::store::TaskStore;
use super::ApiTask;
use crate::config::TaskProcessorConfig;
use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Processed,
    Failed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub processed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
    handlers: HandlerRegistry,
    batch_size: i64,
    backoff_unit: Duration,
}

impl TaskProcessor {
    pub fn new(store: Arc<dyn TaskStore>, handlers: HandlerRegistry, config: &TaskProcessorConfig) -> Self {
        Self {
            store,
            handlers,
            batch_size: config.batch_size,
            backoff_unit: config.backoff_unit,
        }
    }

    /// One poll: claim a batch and run every claimed task concurrently.
    ///
    /// Only a failing claim is returned as an error; task failures are
    /// recorded on their rows.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let tasks = self
            .store
            .claim_batch(Utc::now(), self.batch_size, self.backoff_unit)
            .await?;
        if tasks.is_empty() {
            return Ok(CycleReport::default());
        }
        tracing::debug!("Claimed {} tasks", tasks.len());

        let claimed = tasks.len();
        let outcomes = join_all(tasks.into_iter().map(|task| self.process_task(task))).await;

        let processed = outcomes.iter().filter(|o| **o == TaskOutcome::Processed).count();
        let report = CycleReport {
            claimed,
            processed,
            failed: claimed - processed,
        };
        tracing::info!(
            "Task cycle finished: {} claimed, {} processed, {} failed",
            report.claimed,
            report.processed,
            report.failed
        );
        Ok(report)
    }

    async fn dispatch(&self, task: &ApiTask) -> Result<()> {
        let handler = self
            .handlers
            .get(&task.task_type)
            .ok_or_else(|| anyhow!("Unknown task type {} for task {}", task.task_type, task.id))?;
        handler.handle(task.id, &task.data).await
    }

    async fn process_task(&self, task: ApiTask) -> TaskOutcome {
        tracing::info!("Processing task {} ({})", task.id, task.task_type);

        match self.dispatch(&task).await {
            Ok(()) => {
                if let Err(e) = self.store.mark_processed(task.id).await {
                    tracing::error!("Task {} succeeded but could not be marked processed: {:#}", task.id, e);
                }
                tracing::info!("Task {} processed successfully", task.id);
                TaskOutcome::Processed
            }
            Err(e) => {
                let details = format!("{:#}", e);
                tracing::error!(
                    "Failed task {} (attempt {} of {}): {}",
                    task.id,
                    task.retry_count + 1,
                    task.retry_limit,
                    details
                );
                if let Err(e) = self.store.mark_failed(task.id, Utc::now(), &details).await {
                    tracing::error!("Could not record failure for task {}: {:#}", task.id, e);
                }
                TaskOutcome::Failed
            }
        }
    }
}
