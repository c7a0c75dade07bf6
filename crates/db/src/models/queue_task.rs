//! Queue task model for the ingestion task queue.

use sqlx::FromRow;
use uuid::Uuid;

use scenedex_core::types::Timestamp;

/// Lease length for a claimed task; the queue redelivers after expiry.
pub const TASK_LEASE_SECS: f64 = 600.0;

/// Maximum deliveries per task (initial + 2 retries).
pub const TASK_MAX_ATTEMPTS: i32 = 3;

/// A row from the `queue_tasks` table.
///
/// States: `pending` (never claimed or released), `leased` (claimed, lease
/// running), `done` (completed), `dead` (attempts exhausted).
#[derive(Debug, Clone, FromRow)]
pub struct QueueTask {
    pub task_id: i64,
    pub video_id: Uuid,
    pub state: String,
    pub attempts: i32,
    pub leased_until: Option<Timestamp>,
    pub enqueued_at: Timestamp,
}
