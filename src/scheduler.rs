//! Due-check scheduler
//!
//! Once per tick all due reminders are taken out of the store and published. The scheduler is
//! started by the first subscriber and then runs for the life of the process

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio::time::interval;

use crate::broadcaster::Broadcaster;
use crate::reminder::StoredRecord;
use crate::repository::Reminders;

/// Recurring due check
#[derive(Clone, Debug)]
pub struct Scheduler {
    /// Where the reminders live
    reminders: Reminders,

    /// Who hears about due reminders
    broadcaster: Broadcaster,

    /// Time between two ticks
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(reminders: Reminders, broadcaster: Broadcaster, tick_interval: Duration) -> Self {
        Self {
            reminders,
            broadcaster,
            tick_interval,
        }
    }

    /// One due check
    ///
    /// Failures are logged, the next tick simply tries again
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<StoredRecord> {
        let result = self
            .reminders
            .deliver_due(now, |due| {
                self.broadcaster.publish(due);
            })
            .await;

        match result {
            Ok(due) => due,
            Err(err) => {
                tracing::error!("Due check failed, retrying next tick: {err}");
                Vec::new()
            }
        }
    }

    /// Tick forever
    pub async fn run(self) {
        tracing::info!("Scheduler running, checking every {:?}", self.tick_interval);

        let mut ticks = interval(self.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // the first tick completes immediately
        ticks.tick().await;

        loop {
            ticks.tick().await;

            self.tick(Utc::now()).await;
        }
    }
}

/// Starts the scheduler once per process
///
/// Idle until the first subscriber connects, running from then on. Never goes back
#[derive(Clone, Debug)]
pub struct Lifecycle {
    /// Has the scheduler been started?
    started: Arc<AtomicBool>,

    /// The scheduler to start
    scheduler: Scheduler,
}

impl Lifecycle {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            started: Arc::new(AtomicBool::new(false)),
            scheduler,
        }
    }

    /// Is the scheduler running?
    #[cfg_attr(not(test), expect(dead_code))]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Start the scheduler, unless that already happened
    ///
    /// Safe to call from concurrent connections, only one of them wins. Returns `true` for the
    /// winner
    pub fn ensure_started(&self) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        tracing::info!("First subscriber connected, starting scheduler");

        tokio::spawn(self.scheduler.clone().run());

        true
    }
}
