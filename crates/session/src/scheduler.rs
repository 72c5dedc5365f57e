//! Background token renewal.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::manager::{RefreshOutcome, SessionManager};

/// Poll cadence and renewal threshold.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// How often remaining token lifetime is checked.
    pub poll_interval: Duration,
    /// Remaining lifetime below which a renewal is triggered.
    pub renew_threshold_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            renew_threshold_ms: 90_000,
        }
    }
}

/// Recurring task that renews the token before it expires.
///
/// The scheduler only decides *when* to attempt a renewal; the at-most-one
/// in-flight guarantee lives in [`SessionManager::refresh`], so a tick that
/// fires while a previous refresh is still resolving cannot start a second
/// network call. Arming again replaces any previous task.
pub struct RefreshScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<tokio::sync::Notify>,
}

impl RefreshScheduler {
    pub(crate) fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            handle: Mutex::new(None),
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Start (or restart) the renewal loop for the given session.
    ///
    /// The task holds only a weak reference to the manager; dropping the
    /// manager ends the loop on its next tick.
    pub(crate) fn start(&self, manager: Weak<SessionManager>) {
        self.stop();

        let config = self.config;
        let clock = self.clock.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!("refresh scheduler started");

            let mut interval = tokio::time::interval(config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the first
            // lifetime check happens one interval after arming.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.notified() => break,
                    _ = interval.tick() => {
                        let Some(manager) = manager.upgrade() else { break };

                        let (Some(_), Some(expires_at)) = (manager.token(), manager.expires_at())
                        else {
                            continue;
                        };

                        let time_left = expires_at - clock.now_ms();
                        tracing::debug!(time_left, "token lifetime check");

                        if time_left < config.renew_threshold_ms
                            && manager.refresh().await == RefreshOutcome::Terminated
                        {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("refresh scheduler stopped");
        });

        *self.lock() = Some(handle);
    }

    /// Cancel the renewal loop if one is running. Safe to call repeatedly.
    pub(crate) fn stop(&self) {
        if let Some(handle) = self.lock().take() {
            self.shutdown.notify_waiters();
            handle.abort();
        }
    }

    /// Whether a renewal loop is currently armed.
    pub fn is_armed(&self) -> bool {
        self.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
