// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles through which transports reach the engine.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use dmflow_core::DmflowError;

use crate::command::{Command, CommandResponse};

/// A command together with the slot its reply goes to.
pub(crate) struct Envelope {
    pub(crate) command: Command,
    pub(crate) reply: oneshot::Sender<CommandResponse>,
}

/// Cloneable sender side of the engine mailbox.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Envelope>,
}

impl EngineHandle {
    pub(crate) fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }

    /// Send `command` and wait for the engine's reply.
    ///
    /// Fails with [`DmflowError::NotInitialized`] when the engine has shut down.
    pub async fn request(&self, command: Command) -> Result<CommandResponse, DmflowError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| DmflowError::NotInitialized)?;
        rx.await.map_err(|_| DmflowError::NotInitialized)
    }

    /// Whether the engine is still receiving commands.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Entry point for transports (HTTP gateway, CLI, scheduled triggers).
///
/// A router can be handed out before the engine exists; until
/// [`CommandRouter::attach`] is called every request fails with
/// `NotInitialized` instead of waiting.
#[derive(Clone)]
pub struct CommandRouter {
    engine: Arc<OnceLock<EngineHandle>>,
    reply_timeout: Duration,
}

impl CommandRouter {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            engine: Arc::new(OnceLock::new()),
            reply_timeout,
        }
    }

    /// Connect the router to a running engine. Only the first call takes effect.
    pub fn attach(&self, handle: EngineHandle) -> bool {
        let attached = self.engine.set(handle).is_ok();
        if !attached {
            warn!("command router already attached; ignoring second engine");
        }
        attached
    }

    pub fn is_ready(&self) -> bool {
        self.engine.get().is_some_and(EngineHandle::is_alive)
    }

    /// Deliver `command`, bounding the wait for a reply.
    ///
    /// `Err` is reserved for transport-level failures (`NotInitialized`,
    /// `Timeout`); command failures come back as an unsuccessful response.
    pub async fn request(&self, command: Command) -> Result<CommandResponse, DmflowError> {
        let handle = self.engine.get().ok_or(DmflowError::NotInitialized)?;
        let kind = command.kind();
        debug!(command = kind, "dispatching command");

        match tokio::time::timeout(self.reply_timeout, handle.request(command)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command = kind, timeout = ?self.reply_timeout, "engine reply timed out");
                Err(DmflowError::Timeout {
                    duration: self.reply_timeout,
                })
            }
        }
    }

    /// Like [`CommandRouter::request`], folding transport failures into the response.
    pub async fn dispatch(&self, command: Command) -> CommandResponse {
        self.request(command).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unattached_router_reports_not_initialized() {
        let router = CommandRouter::new(Duration::from_secs(1));
        assert!(!router.is_ready());
        let err = router.request(Command::GetQueueStatus).await.unwrap_err();
        assert!(matches!(err, DmflowError::NotInitialized));

        let resp = router.dispatch(Command::PauseQueue).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("engine not initialized"));
    }

    #[tokio::test]
    async fn dead_engine_reports_not_initialized() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let router = CommandRouter::new(Duration::from_secs(1));
        router.attach(EngineHandle::new(tx));
        let err = router.request(Command::StopQueue).await.unwrap_err();
        assert!(matches!(err, DmflowError::NotInitialized));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_engine_times_out() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        // Hold envelopes without replying.
        let keeper = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(env) = rx.recv().await {
                held.push(env);
            }
        });

        let router = CommandRouter::new(Duration::from_secs(3));
        router.attach(EngineHandle::new(tx));
        let err = router.request(Command::GetQueueStatus).await.unwrap_err();
        assert!(matches!(err, DmflowError::Timeout { .. }));
        keeper.abort();
    }

    #[tokio::test]
    async fn replies_flow_back() {
        let (tx, mut rx) = mpsc::channel::<Envelope>(1);
        tokio::spawn(async move {
            while let Some(env) = rx.recv().await {
                let _ = env.reply.send(CommandResponse::ok());
            }
        });
        let router = CommandRouter::new(Duration::from_secs(1));
        assert!(router.attach(EngineHandle::new(tx.clone())));
        assert!(!router.attach(EngineHandle::new(tx)));
        assert!(router.dispatch(Command::ResumeQueue).await.success);
    }
}
