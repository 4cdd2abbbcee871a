pub mod broadcast;
pub mod tasks;

use std::future::Future;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};
use uuid::Uuid;

/// Cron-driven runner for the bot's periodic jobs.
pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Run `task` on every match of the six-field `cron_expr` (evaluated in
    /// UTC). Each run gets a fresh future from `task`.
    pub async fn every<F, Fut>(&self, cron_expr: &str, name: &str, task: F) -> Result<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let label = name.to_string();
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let label = label.clone();
            let run = task();
            Box::pin(async move {
                debug!("Polling job '{}'", label);
                run.await;
            })
        })
        .with_context(|| format!("Invalid cron expression for '{}': {}", name, cron_expr))?;

        let id = self
            .inner
            .add(job)
            .await
            .with_context(|| format!("Failed to register job '{}'", name))?;

        info!("Job '{}' polls on cron '{}'", name, cron_expr);
        Ok(id)
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }
}
