use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::scheduler::broadcast::BroadcastJob;
use crate::scheduler::Scheduler;

/// Register the broadcast poll on `poll_cron`; returns the scheduler job ID.
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    poll_cron: &str,
    broadcast: Arc<BroadcastJob>,
) -> anyhow::Result<Uuid> {
    scheduler
        .every(poll_cron, "broadcast", move || {
            let job = broadcast.clone();
            async move {
                job.tick(Utc::now()).await;
            }
        })
        .await
}
