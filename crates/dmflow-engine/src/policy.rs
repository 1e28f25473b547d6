// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry and rate-limit policy.
//!
//! Pure functions over [`Settings`]; the orchestrator re-reads settings before
//! every decision so changes made mid-run take effect on the next task.

use std::time::Duration;

use rand::Rng;

use dmflow_core::types::{DmTask, Settings};

/// Delay window used when settings cannot be read.
pub const FALLBACK_DELAY_SECS: (u64, u64) = (60, 300);

/// Typing speed window used when settings cannot be read.
pub const FALLBACK_TYPING_MS: (u32, u32) = (50, 250);

/// What a failed attempt turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Re-attempt the same task later; its retry counter goes up by one.
    Retry,
    /// Give up: the task becomes terminal `failed`.
    Exhausted,
}

/// Decide the fate of a failed attempt. Evaluated once, at failure time.
///
/// A task may be retried while `retry_count < max_retries`, so a task with
/// `max_retries = 2` is attempted three times in total and ends with
/// `retry_count = 2`. Missing settings disable retries.
pub fn failure_outcome(task: &DmTask, settings: Option<&Settings>) -> FailureOutcome {
    let auto_retry = settings.is_some_and(|s| s.auto_retry);
    if auto_retry && task.retry_count < task.max_retries {
        FailureOutcome::Retry
    } else {
        FailureOutcome::Exhausted
    }
}

/// Whether today's sends have used up the daily allowance.
pub fn limit_reached(settings: &Settings) -> bool {
    settings.today_sent_count >= settings.daily_limit
}

/// Inter-task delay bounds in seconds, ordered low to high.
pub fn delay_window(settings: Option<&Settings>) -> (u64, u64) {
    match settings {
        Some(s) => (s.min_delay.min(s.max_delay), s.min_delay.max(s.max_delay)),
        None => FALLBACK_DELAY_SECS,
    }
}

/// Per-character typing delay bounds in milliseconds, ordered low to high.
pub fn typing_window(settings: Option<&Settings>) -> (u32, u32) {
    match settings {
        Some(s) => (
            s.typing_speed_min.min(s.typing_speed_max),
            s.typing_speed_min.max(s.typing_speed_max),
        ),
        None => FALLBACK_TYPING_MS,
    }
}

/// A uniformly random whole number of seconds in `[min, max]`.
pub fn next_delay<R: Rng + ?Sized>(window: (u64, u64), rng: &mut R) -> Duration {
    let (min, max) = window;
    Duration::from_secs(rng.gen_range(min..=max))
}
