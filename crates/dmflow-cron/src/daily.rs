// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily counter reset aligned to calendar midnight (UTC).

use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dmflow_engine::{Command, CommandRouter};

/// Start of the UTC day following `now`.
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

/// Wall-clock time left until [`next_midnight`].
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    (next_midnight(now) - now).to_std().unwrap_or(Duration::ZERO)
}

/// Dispatches `RESET_DAILY_COUNT` at every UTC midnight.
///
/// The reset sent is the idempotent one, so a trigger firing twice on the
/// same day (or racing the run loop's own rollover check) resets once.
pub struct DailyTrigger {
    router: CommandRouter,
    catch_up: bool,
}

impl DailyTrigger {
    pub fn new(router: CommandRouter) -> Self {
        Self {
            router,
            catch_up: true,
        }
    }

    /// Whether to fire once at startup, for a process that slept through midnight.
    pub fn with_catch_up(mut self, catch_up: bool) -> Self {
        self.catch_up = catch_up;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        if self.catch_up {
            self.fire().await;
        }

        loop {
            let wait = until_next_midnight(Utc::now());
            debug!(wait_secs = wait.as_secs(), "daily reset scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.fire().await;
                }
                _ = cancel.cancelled() => {
                    info!("daily reset trigger shutting down");
                    break;
                }
            }
        }
    }

    async fn fire(&self) {
        let response = self
            .router
            .dispatch(Command::ResetDailyCount { force: false })
            .await;
        if response.success {
            debug!("daily reset dispatched");
        } else {
            warn!(
                error = response.error.as_deref().unwrap_or("unknown"),
                "daily reset failed (non-fatal)"
            );
        }
    }
}
