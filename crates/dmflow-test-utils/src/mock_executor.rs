// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock message executor for deterministic testing.
//!
//! `MockExecutor` implements `MessageExecutor` with a script of per-send
//! outcomes and captures every request for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dmflow_core::{
    AdapterType, DmRequest, DmflowError, HealthStatus, MessageExecutor, PluginAdapter, SurfaceId,
};

/// Outcome of one scripted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendScript {
    Succeed,
    Fail(String),
    /// Never completes; the engine's send timeout has to end it.
    Hang,
}

/// A scripted executor. Sends succeed once the script runs out.
#[derive(Default)]
pub struct MockExecutor {
    script: Mutex<VecDeque<SendScript>>,
    sent: Mutex<Vec<DmRequest>>,
    send_delay: Mutex<Duration>,
    open_failures: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next sends, in order.
    pub async fn push_script(&self, outcomes: impl IntoIterator<Item = SendScript>) {
        self.script.lock().await.extend(outcomes);
    }

    /// Make the next `count` sends fail with `error`.
    pub async fn fail_next(&self, count: usize, error: &str) {
        self.push_script(std::iter::repeat_n(SendScript::Fail(error.to_string()), count))
            .await;
    }

    /// How long each send takes before its outcome is reported.
    pub async fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().await = delay;
    }

    /// Make the next `count` surface opens fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.open_failures.store(count, Ordering::SeqCst);
    }

    /// Every request received so far, including ones still in progress.
    pub async fn sent(&self) -> Vec<DmRequest> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub fn surfaces_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn surfaces_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockExecutor {
    fn name(&self) -> &str {
        "mock-executor"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Executor
    }

    async fn health_check(&self) -> Result<HealthStatus, DmflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DmflowError> {
        Ok(())
    }
}

#[async_trait]
impl MessageExecutor for MockExecutor {
    async fn open_surface(&self) -> Result<SurfaceId, DmflowError> {
        let remaining = self.open_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.open_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DmflowError::executor("surface agent unreachable"));
        }
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SurfaceId(format!("surface-{n}")))
    }

    async fn send_dm(&self, _surface: &SurfaceId, request: &DmRequest) -> Result<(), DmflowError> {
        self.sent.lock().await.push(request.clone());
        let delay = *self.send_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().await.pop_front();
        match next.unwrap_or(SendScript::Succeed) {
            SendScript::Succeed => Ok(()),
            SendScript::Fail(error) => Err(DmflowError::executor(error)),
            SendScript::Hang => std::future::pending().await,
        }
    }

    async fn close_surface(&self, _surface: &SurfaceId) -> Result<(), DmflowError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
