// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancelable single-slot delay timer.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Holds at most one pending continuation.
///
/// Scheduling replaces whatever was pending. A cancelled continuation is
/// dropped with its sleep, so it can never fire afterwards.
pub struct DelayTimer<A> {
    pending: Option<(Pin<Box<Sleep>>, A)>,
}

impl<A> Default for DelayTimer<A> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<A> DelayTimer<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to yield `action` after `delay`, replacing any pending one.
    pub fn schedule(&mut self, delay: Duration, action: A) {
        let sleep = tokio::time::sleep_until(Instant::now() + delay);
        self.pending = Some((Box::pin(sleep), action));
    }

    /// Drop the pending continuation. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending continuation is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(sleep, _)| sleep.deadline())
    }

    /// Resolves with the pending action once its delay elapses.
    ///
    /// Never resolves while nothing is scheduled. Safe to use as a
    /// `tokio::select!` branch: dropping the future keeps the schedule.
    pub async fn fired(&mut self) -> A {
        match self.pending.as_mut() {
            Some((sleep, _)) => sleep.as_mut().await,
            None => std::future::pending::<()>().await,
        }
        match self.pending.take() {
            Some((_, action)) => action,
            None => std::future::pending().await,
        }
    }
}
