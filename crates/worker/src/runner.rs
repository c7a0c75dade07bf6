//! Queue claim loop.
//!
//! Each runner polls the task queue, claims one task at a time with a
//! lease, and hands it to the pipeline. Transient pipeline failures leave
//! the lease running so expiry redelivers; every other outcome completes
//! the task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scenedex_db::models::queue_task::{QueueTask, TASK_LEASE_SECS, TASK_MAX_ATTEMPTS};
use scenedex_db::repositories::{QueueRepo, VideoRepo};
use scenedex_db::DbPool;

use crate::pipeline::{Disposition, Pipeline};

/// A single task-processing loop. Run several concurrently for parallel
/// video processing; per-video exclusion is the pipeline's job.
pub struct TaskRunner {
    pool: DbPool,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
}

impl TaskRunner {
    pub fn new(pool: DbPool, pipeline: Arc<Pipeline>, poll_interval: Duration) -> Self {
        Self {
            pool,
            pipeline,
            poll_interval,
        }
    }

    /// Run the claim loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Task runner started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: bury exhausted tasks, then drain claimable ones.
    async fn poll_cycle(&self) -> Result<(), sqlx::Error> {
        for video_id in QueueRepo::reap_exhausted(&self.pool, TASK_MAX_ATTEMPTS).await? {
            let failed =
                VideoRepo::mark_failed_if_unfinished(&self.pool, video_id, "RETRY_LIMIT_EXCEEDED")
                    .await?;
            if failed {
                tracing::error!(%video_id, "Task exhausted its deliveries, video failed");
            }
        }

        while let Some(task) =
            QueueRepo::claim_next(&self.pool, TASK_LEASE_SECS, TASK_MAX_ATTEMPTS).await?
        {
            self.handle(task).await;
        }
        Ok(())
    }

    /// Process one claimed task; never propagates errors into the loop.
    async fn handle(&self, task: QueueTask) {
        tracing::info!(
            task_id = task.task_id,
            video_id = %task.video_id,
            attempt = task.attempts,
            "Task claimed"
        );

        match self.pipeline.process(task.video_id).await {
            Ok(disposition) => {
                if disposition == Disposition::Noop {
                    tracing::debug!(task_id = task.task_id, "Duplicate delivery, no work done");
                }
                if let Err(e) = QueueRepo::complete(&self.pool, task.task_id).await {
                    // The lease will expire and the entry guard will
                    // no-op the redelivery.
                    tracing::warn!(task_id = task.task_id, error = %e, "Failed to complete task");
                }
            }
            Err(transient) => {
                tracing::warn!(
                    task_id = task.task_id,
                    video_id = %task.video_id,
                    error = %transient,
                    "Task abandoned for redelivery"
                );
            }
        }
    }
}
