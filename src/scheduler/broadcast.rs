//! Twice-daily promotional push to every known recipient.
//!
//! A [`BroadcastSchedule`] is polled once a minute. Each configured time of
//! day fires at most once per local calendar day; the last-fired date is
//! tracked per trigger so late, repeated or skipped polls never double-fire.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::platform::Messenger;
use crate::registry::RecipientRegistry;
use crate::replies;

/// Pushes in flight at once during a broadcast.
const BROADCAST_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
struct DailyTrigger {
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
}

impl DailyTrigger {
    fn is_due(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.at && self.last_fired != Some(now.date())
    }
}

/// Fixed daily trigger times in one time zone.
#[derive(Debug, Clone)]
pub struct BroadcastSchedule {
    tz: Tz,
    triggers: Vec<DailyTrigger>,
}

impl BroadcastSchedule {
    /// Triggers whose time has already passed at `started_at` count as fired
    /// for that day, so a restart does not cause a catch-up push.
    pub fn new(tz: Tz, times: &[NaiveTime], started_at: DateTime<Utc>) -> Self {
        let local = started_at.with_timezone(&tz).naive_local();
        let triggers = times
            .iter()
            .map(|&at| {
                let mut trigger = DailyTrigger {
                    at,
                    last_fired: None,
                };
                if trigger.is_due(local) {
                    trigger.last_fired = Some(local.date());
                }
                trigger
            })
            .collect();
        Self { tz, triggers }
    }

    /// Return the trigger times that fire at `now`, marking them fired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<NaiveTime> {
        let local = now.with_timezone(&self.tz).naive_local();
        let mut fired = Vec::new();
        for trigger in &mut self.triggers {
            if trigger.is_due(local) {
                trigger.last_fired = Some(local.date());
                fired.push(trigger.at);
            }
        }
        fired
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastReport {
    /// The registry was empty; nothing was sent.
    NoRecipients,
    Delivered {
        message: &'static str,
        sent: usize,
        failed: usize,
    },
}

pub struct Broadcaster {
    registry: RecipientRegistry,
    messenger: Arc<dyn Messenger>,
}

impl Broadcaster {
    pub fn new(registry: RecipientRegistry, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            registry,
            messenger,
        }
    }

    /// Push one randomly chosen funny message to every recipient.
    pub async fn broadcast(&self) -> BroadcastReport {
        let message = {
            let mut rng = rand::thread_rng();
            replies::pick_funny_message(&mut rng)
        };
        self.send_to_all(message).await
    }

    /// Push `message` to a snapshot of the registry. A failed push is logged
    /// and does not stop the others.
    pub async fn send_to_all(&self, message: &'static str) -> BroadcastReport {
        let recipients = self.registry.snapshot().await;
        if recipients.is_empty() {
            warn!("No recipients available for push message");
            return BroadcastReport::NoRecipients;
        }

        let total = recipients.len();
        let sent = stream::iter(recipients)
            .map(|to| {
                let messenger = self.messenger.clone();
                async move {
                    info!("Pushing message to {}: {}", to, message);
                    match messenger.push_text(&to, message).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("Failed to push message to {}: {:#}", to, e);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(BROADCAST_CONCURRENCY)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        info!("Broadcast finished: {} sent, {} failed", sent, total - sent);
        BroadcastReport::Delivered {
            message,
            sent,
            failed: total - sent,
        }
    }
}

/// Schedule plus broadcaster, driven by the minute tick.
pub struct BroadcastJob {
    schedule: Mutex<BroadcastSchedule>,
    broadcaster: Broadcaster,
}

impl BroadcastJob {
    pub fn new(schedule: BroadcastSchedule, broadcaster: Broadcaster) -> Self {
        Self {
            schedule: Mutex::new(schedule),
            broadcaster,
        }
    }

    /// Fire every trigger due at `now`; one broadcast per fired trigger.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<BroadcastReport> {
        let (due, tz) = {
            let mut schedule = self.schedule.lock().await;
            (schedule.tick(now), schedule.timezone())
        };

        let mut reports = Vec::with_capacity(due.len());
        for at in due {
            info!("Broadcast trigger {} ({}) fired", at.format("%H:%M"), tz);
            reports.push(self.broadcaster.broadcast().await);
        }
        reports
    }
}
