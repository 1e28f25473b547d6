// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The task queue orchestrator.
//!
//! A single tokio task owns the active queue, the execution surface and the
//! delay timer. Commands, send outcomes and timer expiries are all handled
//! on that task, one at a time, so every read-mutate-persist step is atomic
//! with respect to the others. Persistence is written through before the
//! next step reads it.
//!
//! Queue tasks and `SEND_SINGLE_DM` jobs share one send slot: a single DM
//! that arrives mid-send waits for it, and the run loop waits for a single
//! DM, so the daily limit is always checked against a settled counter.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dmflow_config::model::EngineConfig;
use dmflow_core::types::{
    ContactStatus, DmTask, LogCategory, LogEntry, LogLevel, QueueStatus, Settings, TaskQueue,
    TaskStatus, new_id,
};
use dmflow_core::{DmRequest, DmflowError, MessageExecutor, SurfaceId, TemplateResolver};
use dmflow_storage::StateRecords;

use crate::command::{Command, CommandResponse};
use crate::policy::{self, FailureOutcome};
use crate::router::{EngineHandle, Envelope};
use crate::timer::DelayTimer;

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on one executor send.
    pub send_timeout: Duration,
    /// Grace period between opening a surface and the first send on it.
    pub surface_settle: Duration,
    pub mailbox_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            surface_settle: Duration::from_millis(config.surface_settle_ms),
            mailbox_capacity: config.mailbox_capacity.max(1),
        }
    }
}

/// What the delay timer resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    RunNext,
}

/// The send currently awaiting the executor.
struct InFlight {
    index: usize,
    handle: JoinHandle<Result<(), DmflowError>>,
}

/// A `SEND_SINGLE_DM` waiting for the send slot.
struct QueuedDm {
    username: String,
    message: String,
    reply: oneshot::Sender<CommandResponse>,
}

/// Result of a `SEND_SINGLE_DM` job, applied back on the actor.
struct SingleDmOutcome {
    username: String,
    reply: oneshot::Sender<CommandResponse>,
    result: Result<(), DmflowError>,
}

/// Owns and drives the single active queue.
pub struct Orchestrator {
    records: StateRecords,
    executor: Arc<dyn MessageExecutor>,
    resolver: Arc<dyn TemplateResolver>,
    options: EngineOptions,
    queue: Option<TaskQueue>,
    surface: Option<SurfaceId>,
    timer: DelayTimer<Continuation>,
    in_flight: Option<InFlight>,
    pending_stops: Vec<oneshot::Sender<CommandResponse>>,
    /// Holds at most one job: single DMs share the send slot with the queue.
    single_dms: JoinSet<SingleDmOutcome>,
    waiting_dms: VecDeque<QueuedDm>,
    /// A run-loop step was skipped because a single DM held the send slot.
    run_deferred: bool,
}

impl Orchestrator {
    pub fn new(
        records: StateRecords,
        executor: Arc<dyn MessageExecutor>,
        resolver: Arc<dyn TemplateResolver>,
        options: EngineOptions,
    ) -> Self {
        Self {
            records,
            executor,
            resolver,
            options,
            queue: None,
            surface: None,
            timer: DelayTimer::new(),
            in_flight: None,
            pending_stops: Vec::new(),
            single_dms: JoinSet::new(),
            waiting_dms: VecDeque::new(),
            run_deferred: false,
        }
    }

    /// Start the actor on the current runtime.
    ///
    /// The returned handle is the only way to reach the engine. The actor runs
    /// crash recovery first, then serves commands until `shutdown` is
    /// cancelled or every handle is dropped.
    pub fn spawn(self, shutdown: CancellationToken) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.options.mailbox_capacity);
        let join = tokio::spawn(self.run(rx, shutdown));
        (EngineHandle::new(tx), join)
    }

    async fn run(mut self, mut mailbox: mpsc::Receiver<Envelope>, shutdown: CancellationToken) {
        if let Err(e) = self.recover().await {
            error!(error = %e, "crash recovery failed");
            self.halt_on_error(&e).await;
        }
        info!("orchestrator running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown signal received, stopping orchestrator");
                    break;
                }
                (index, result) = wait_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    if let Err(e) = self.finish_task(index, result).await {
                        error!(error = %e, "failed to record task outcome");
                        self.halt_on_error(&e).await;
                    }
                    self.settle_pending_stops().await;
                    self.launch_waiting_dm().await;
                }
                Some(joined) = self.single_dms.join_next(), if !self.single_dms.is_empty() => {
                    match joined {
                        Ok(outcome) => self.finish_single_dm(outcome).await,
                        Err(e) => error!(error = %e, "single DM job aborted"),
                    }
                    self.release_send_slot().await;
                }
                envelope = mailbox.recv() => {
                    match envelope {
                        Some(Envelope { command, reply }) => self.handle(command, reply).await,
                        None => {
                            debug!("all engine handles dropped, stopping orchestrator");
                            break;
                        }
                    }
                }
                action = self.timer.fired() => {
                    match action {
                        Continuation::RunNext => {
                            if let Err(e) = self.run_next().await {
                                error!(error = %e, "run loop step failed");
                                self.halt_on_error(&e).await;
                            }
                        }
                    }
                }
            }
        }

        self.wind_down().await;
        info!("orchestrator stopped");
    }

    // --- Command dispatch ---

    async fn handle(&mut self, command: Command, reply: oneshot::Sender<CommandResponse>) {
        let kind = command.kind();
        debug!(command = kind, "command received");

        let response = match command {
            Command::StartQueue {
                list_id,
                template_id,
                name,
            } => self.start(&list_id, &template_id, &name).await,
            Command::PauseQueue => self.pause().await,
            Command::ResumeQueue => self.resume().await,
            Command::StopQueue => {
                if self.in_flight.is_some() && self.queue.is_some() {
                    debug!("stop deferred until the in-flight send finishes");
                    self.timer.cancel();
                    self.pending_stops.push(reply);
                    return;
                }
                self.stop().await
            }
            Command::GetQueueStatus => Ok(CommandResponse::with_queue(self.queue.clone())),
            Command::SendSingleDm { username, message } => {
                if !self.send_slot_free() {
                    debug!("single DM waiting for the current send to finish");
                }
                self.waiting_dms.push_back(QueuedDm {
                    username,
                    message,
                    reply,
                });
                self.launch_waiting_dm().await;
                return;
            }
            Command::ResetDailyCount { force } => self.reset_daily_count(force).await,
        };

        if let Err(e) = &response {
            warn!(command = kind, error = %e, "command failed");
        }
        // The caller may have given up waiting.
        let _ = reply.send(response.into());
    }

    /// Create a queue over the eligible contacts of `list_id` and begin running it.
    ///
    /// Every lookup, message resolution and the surface open happen before
    /// anything is persisted, so a failed start leaves durable state as it was.
    async fn start(
        &mut self,
        list_id: &str,
        template_id: &str,
        name: &str,
    ) -> Result<CommandResponse, DmflowError> {
        if let Some(active) = self.queue.as_ref().filter(|q| q.status.is_active()) {
            return Err(DmflowError::AlreadyRunning {
                queue_id: active.id.clone(),
                status: active.status.to_string(),
            });
        }

        let list = self
            .records
            .contact_list(list_id)
            .await?
            .ok_or_else(|| DmflowError::NotFound {
                kind: "contact list",
                id: list_id.to_string(),
            })?;
        let template = self
            .records
            .template(template_id)
            .await?
            .ok_or_else(|| DmflowError::NotFound {
                kind: "template",
                id: template_id.to_string(),
            })?;
        let settings = self
            .records
            .settings()
            .await?
            .ok_or_else(|| DmflowError::NotFound {
                kind: "settings",
                id: "settings".to_string(),
            })?;

        let tasks = list
            .contacts
            .iter()
            .filter(|c| c.status.is_eligible())
            .map(|contact| {
                let message = self
                    .resolver
                    .resolve(&template.content, &contact.template_variables())?;
                Ok(DmTask {
                    id: new_id(),
                    contact_id: contact.id.clone(),
                    list_id: list.id.clone(),
                    template_id: template.id.clone(),
                    username: contact.username.clone(),
                    message,
                    status: TaskStatus::Pending,
                    error: None,
                    started_at: None,
                    completed_at: None,
                    retry_count: 0,
                    max_retries: settings.max_retries,
                })
            })
            .collect::<Result<Vec<_>, DmflowError>>()?;

        if tasks.is_empty() {
            return Err(DmflowError::EmptyQueue);
        }

        let surface = self.executor.open_surface().await?;

        let mut queue = TaskQueue::new(name, &list.id, &template.id, tasks);
        queue.execution_surface = Some(surface.clone());

        if let Err(e) = self.persist_new_queue(&queue).await {
            self.close_surface(&surface).await;
            return Err(e);
        }

        self.log(
            LogEntry::task(
                LogLevel::Info,
                format!("Started queue \"{}\" with {} tasks", queue.name, queue.total_tasks),
            )
            .with_queue(&queue.id)
            .with_list(&queue.list_id),
        )
        .await;
        info!(
            queue_id = %queue.id,
            tasks = queue.total_tasks,
            surface = %surface,
            "queue started"
        );

        self.surface = Some(surface);
        self.queue = Some(queue.clone());
        self.timer
            .schedule(self.options.surface_settle, Continuation::RunNext);

        Ok(CommandResponse::with_queue(Some(queue)))
    }

    /// Pause a running queue. The in-flight send, if any, is left to finish.
    async fn pause(&mut self) -> Result<CommandResponse, DmflowError> {
        self.pause_queue().await?;
        Ok(CommandResponse::with_queue(self.queue.clone()))
    }

    /// Resume a paused queue at its current index.
    async fn resume(&mut self) -> Result<CommandResponse, DmflowError> {
        let Some(queue) = self.queue.as_mut() else {
            return Ok(CommandResponse::with_queue(None));
        };
        if queue.status != QueueStatus::Paused {
            return Ok(CommandResponse::with_queue(Some(queue.clone())));
        }

        queue.status = QueueStatus::Running;
        queue.paused_at = None;
        let queue_id = queue.id.clone();
        self.persist_queue().await?;
        self.log(LogEntry::task(LogLevel::Info, "Queue resumed").with_queue(&queue_id))
            .await;

        // The in-flight send's outcome reschedules the loop when it lands.
        if self.in_flight.is_none() {
            self.run_next().await?;
        }
        Ok(CommandResponse::with_queue(self.queue.clone()))
    }

    /// Move the active queue to history, whatever its state.
    async fn stop(&mut self) -> Result<CommandResponse, DmflowError> {
        self.timer.cancel();
        let Some(mut queue) = self.queue.take() else {
            return Ok(CommandResponse::with_queue(None));
        };

        if let Some(surface) = self.surface.take() {
            self.close_surface(&surface).await;
        }
        queue.status = QueueStatus::Idle;
        queue.execution_surface = None;

        if let Err(e) = self.archive(&queue).await {
            // Keep the in-memory copy so a later stop can retry the archive.
            self.queue = Some(queue);
            return Err(e);
        }

        self.log(LogEntry::task(LogLevel::Info, "Queue stopped").with_queue(&queue.id))
            .await;
        info!(queue_id = %queue.id, "queue stopped");
        Ok(CommandResponse::with_queue(None))
    }

    async fn settle_pending_stops(&mut self) {
        if self.pending_stops.is_empty() {
            return;
        }
        let response: CommandResponse = self.stop().await.into();
        for reply in self.pending_stops.drain(..) {
            let _ = reply.send(response.clone());
        }
    }

    async fn reset_daily_count(&mut self, force: bool) -> Result<CommandResponse, DmflowError> {
        let now = Utc::now();
        let reset = if force {
            self.records.reset_daily_count(now).await?;
            true
        } else {
            self.records.reset_daily_count_if_stale(now).await?
        };
        if reset {
            self.log(LogEntry::new(
                LogLevel::Info,
                LogCategory::System,
                "Daily send counter reset",
            ))
            .await;
        }
        Ok(CommandResponse::ok())
    }

    // --- Run loop ---

    /// One pass of the run loop for the task at `current_index`.
    async fn run_next(&mut self) -> Result<(), DmflowError> {
        if self.in_flight.is_some() {
            return Ok(());
        }
        if !self.single_dms.is_empty() {
            self.run_deferred = true;
            return Ok(());
        }
        let Some(queue) = self.queue.as_ref() else {
            return Ok(());
        };
        if queue.status != QueueStatus::Running {
            return Ok(());
        }
        if queue.is_exhausted() {
            return self.complete_queue().await;
        }

        self.records.reset_daily_count_if_stale(Utc::now()).await?;
        let settings = self.records.settings().await?;
        if let Some(limit) = settings
            .as_ref()
            .filter(|s| policy::limit_reached(s))
            .map(|s| s.daily_limit)
        {
            self.pause_queue().await?;
            let queue_id = self.queue_id();
            self.log(
                LogEntry::task(LogLevel::Warning, format!("Daily limit reached ({limit})"))
                    .with_queue(&queue_id),
            )
            .await;
            return Ok(());
        }

        let surface = match self.surface.clone() {
            Some(surface) => surface,
            None => return self.open_run_surface().await,
        };

        let Some(queue) = self.queue.as_mut() else {
            return Ok(());
        };
        let index = queue.current_index;
        let task = &mut queue.tasks[index];
        task.status = TaskStatus::Navigating;
        task.started_at = Some(Utc::now());
        let request = DmRequest {
            username: task.username.clone(),
            message: task.message.clone(),
            typing_delay_ms: policy::typing_window(settings.as_ref()),
        };
        debug!(task_id = %task.id, username = %task.username, attempt = task.retry_count + 1, "sending");
        self.persist_queue().await?;

        let executor = Arc::clone(&self.executor);
        let timeout = self.options.send_timeout;
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, executor.send_dm(&surface, &request)).await {
                Ok(result) => result,
                Err(_) => Err(DmflowError::Timeout { duration: timeout }),
            }
        });
        self.in_flight = Some(InFlight { index, handle });
        Ok(())
    }

    /// Open a surface for a running queue that has none, then wait for it to settle.
    ///
    /// A failed open counts as a failed attempt of the current task.
    async fn open_run_surface(&mut self) -> Result<(), DmflowError> {
        match self.executor.open_surface().await {
            Ok(surface) => {
                if let Some(queue) = self.queue.as_mut() {
                    queue.execution_surface = Some(surface.clone());
                }
                self.persist_queue().await?;
                debug!(surface = %surface, "execution surface opened");
                self.surface = Some(surface);
                self.timer
                    .schedule(self.options.surface_settle, Continuation::RunNext);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to open execution surface");
                let index = self.queue.as_ref().map_or(0, |q| q.current_index);
                self.finish_task(index, Err(e)).await
            }
        }
    }

    /// Apply a send outcome to task `index`, then advance and schedule.
    async fn finish_task(
        &mut self,
        index: usize,
        result: Result<(), DmflowError>,
    ) -> Result<(), DmflowError> {
        let settings = self.records.settings().await?;
        let Some(queue) = self.queue.as_mut() else {
            return Ok(());
        };
        let Some(task) = queue.tasks.get_mut(index) else {
            return Err(DmflowError::Internal(format!(
                "task index {index} out of range for queue {}",
                queue.id
            )));
        };

        let now = Utc::now();
        let queue_id = queue.id.clone();
        let task_id = task.id.clone();
        let contact_id = task.contact_id.clone();
        let username = task.username.clone();
        let mut pause_after = false;

        let followup = match result {
            Ok(()) => {
                task.status = TaskStatus::Sent;
                task.completed_at = Some(now);
                task.error = None;
                queue.completed_tasks += 1;
                TaskFollowup::Sent
            }
            Err(e) => {
                let reason = failure_text(&e);
                task.error = Some(reason.clone());
                match policy::failure_outcome(task, settings.as_ref()) {
                    FailureOutcome::Retry => {
                        task.retry_count += 1;
                        task.status = TaskStatus::Pending;
                        TaskFollowup::Retrying {
                            reason,
                            attempt: task.retry_count,
                            max: task.max_retries,
                        }
                    }
                    FailureOutcome::Exhausted => {
                        task.status = TaskStatus::Failed;
                        task.completed_at = Some(now);
                        queue.failed_tasks += 1;
                        pause_after = settings.as_ref().is_some_and(|s| s.pause_on_error);
                        TaskFollowup::Failed { reason }
                    }
                }
            }
        };

        // A terminal task is never attempted again, even if a pause landed mid-send.
        if queue.tasks[index].is_terminal() && queue.current_index == index {
            queue.current_index += 1;
        }
        self.persist_queue().await?;

        match followup {
            TaskFollowup::Sent => {
                self.records
                    .update_contact_status(&contact_id, ContactStatus::Sent, None)
                    .await?;
                let sent_today = self.records.increment_daily_count().await?;
                debug!(sent_today, "daily counter incremented");
                self.log(
                    LogEntry::task(LogLevel::Success, format!("DM sent to @{username}"))
                        .with_task(&task_id)
                        .with_queue(&queue_id),
                )
                .await;
            }
            TaskFollowup::Retrying {
                reason,
                attempt,
                max,
            } => {
                self.log(
                    LogEntry::task(
                        LogLevel::Warning,
                        format!(
                            "Failed to send to @{username}, retrying ({attempt}/{max}): {reason}"
                        ),
                    )
                    .with_task(&task_id)
                    .with_queue(&queue_id),
                )
                .await;
            }
            TaskFollowup::Failed { reason } => {
                self.records
                    .update_contact_status(&contact_id, ContactStatus::Failed, Some(reason.clone()))
                    .await?;
                self.log(
                    LogEntry::task(
                        LogLevel::Error,
                        format!("Failed to send to @{username}: {reason}"),
                    )
                    .with_task(&task_id)
                    .with_queue(&queue_id),
                )
                .await;
            }
        }

        if pause_after {
            self.pause_queue().await?;
        }

        if !self.pending_stops.is_empty() {
            return Ok(());
        }
        if self
            .queue
            .as_ref()
            .is_some_and(|q| q.status == QueueStatus::Running)
        {
            let delay = policy::next_delay(
                policy::delay_window(settings.as_ref()),
                &mut rand::thread_rng(),
            );
            debug!(delay_secs = delay.as_secs(), "next task scheduled");
            self.timer.schedule(delay, Continuation::RunNext);
        }
        Ok(())
    }

    async fn complete_queue(&mut self) -> Result<(), DmflowError> {
        self.timer.cancel();
        let Some(mut queue) = self.queue.take() else {
            return Ok(());
        };
        queue.status = QueueStatus::Completed;
        queue.completed_at = Some(Utc::now());
        queue.execution_surface = None;

        if let Err(e) = self.archive(&queue).await {
            self.queue = Some(queue);
            return Err(e);
        }

        self.log(
            LogEntry::task(LogLevel::Success, format!("Queue \"{}\" completed", queue.name))
                .with_queue(&queue.id),
        )
        .await;
        info!(
            queue_id = %queue.id,
            sent = queue.completed_tasks,
            failed = queue.failed_tasks,
            "queue completed"
        );

        if let Some(surface) = self.surface.take() {
            self.close_surface(&surface).await;
        }
        Ok(())
    }

    /// Set a running queue to paused and cancel the pending continuation.
    async fn pause_queue(&mut self) -> Result<(), DmflowError> {
        let Some(queue) = self.queue.as_mut() else {
            return Ok(());
        };
        if queue.status != QueueStatus::Running {
            return Ok(());
        }
        queue.status = QueueStatus::Paused;
        queue.paused_at = Some(Utc::now());
        let queue_id = queue.id.clone();
        self.timer.cancel();
        self.persist_queue().await?;
        self.log(LogEntry::task(LogLevel::Warning, "Queue paused").with_queue(&queue_id))
            .await;
        Ok(())
    }

    /// Stop driving the queue after a storage failure.
    ///
    /// The queue is paused in memory; persisting that is attempted once.
    async fn halt_on_error(&mut self, err: &DmflowError) {
        self.timer.cancel();
        let Some(queue) = self.queue.as_mut() else {
            return;
        };
        if queue.status == QueueStatus::Running {
            queue.status = QueueStatus::Paused;
            queue.paused_at = Some(Utc::now());
        }
        warn!(queue_id = %queue.id, error = %err, "queue halted");
        if let Err(e) = self.records.set_active_queue(queue).await {
            error!(error = %e, "could not persist halted queue");
        }
    }

    // --- Crash recovery ---

    /// Reload the persisted active queue after a restart.
    async fn recover(&mut self) -> Result<(), DmflowError> {
        let Some(mut queue) = self.records.active_queue().await? else {
            debug!("no active queue to recover");
            return Ok(());
        };

        // Surfaces do not survive a restart.
        queue.execution_surface = None;

        match queue.status {
            QueueStatus::Running => {
                while queue
                    .tasks
                    .get(queue.current_index)
                    .is_some_and(DmTask::is_terminal)
                {
                    queue.current_index += 1;
                }
                if let Some(task) = queue.tasks.get_mut(queue.current_index) {
                    task.status = TaskStatus::Pending;
                    task.started_at = None;
                }
                info!(
                    queue_id = %queue.id,
                    index = queue.current_index,
                    "recovering interrupted queue"
                );
                let queue_id = queue.id.clone();
                self.queue = Some(queue);
                self.persist_queue().await?;
                self.log(
                    LogEntry::new(
                        LogLevel::Info,
                        LogCategory::System,
                        "Recovered interrupted queue, resuming",
                    )
                    .with_queue(&queue_id),
                )
                .await;
                self.run_next().await
            }
            QueueStatus::Paused => {
                info!(queue_id = %queue.id, "loaded paused queue");
                self.queue = Some(queue);
                self.persist_queue().await
            }
            QueueStatus::Idle | QueueStatus::Completed | QueueStatus::Failed => {
                info!(queue_id = %queue.id, status = %queue.status, "archiving inactive queue");
                self.archive(&queue).await
            }
        }
    }

    // --- Single DM ---

    /// Only one send, queue task or single DM, may be outstanding at a time.
    fn send_slot_free(&self) -> bool {
        self.in_flight.is_none() && self.single_dms.is_empty()
    }

    /// Start the oldest waiting single DM if the send slot is free.
    ///
    /// The daily limit is checked here, after every earlier send has been
    /// counted, so concurrent requests cannot overshoot it.
    async fn launch_waiting_dm(&mut self) {
        while self.send_slot_free() {
            let Some(QueuedDm {
                username,
                message,
                reply,
            }) = self.waiting_dms.pop_front()
            else {
                return;
            };
            if let Err((e, reply)) = self.begin_single_dm(username, message, reply).await {
                warn!(command = "SEND_SINGLE_DM", error = %e, "command failed");
                let _ = reply.send(CommandResponse::failure(&e));
            }
        }
    }

    /// A single DM finished: hand the slot to the next waiting DM, or back
    /// to the run loop if it skipped a step meanwhile.
    async fn release_send_slot(&mut self) {
        self.launch_waiting_dm().await;
        if self.send_slot_free() && std::mem::take(&mut self.run_deferred) {
            if let Err(e) = self.run_next().await {
                error!(error = %e, "run loop step failed");
                self.halt_on_error(&e).await;
            }
        }
    }

    /// Check the daily limit and launch a one-off send on its own surface.
    ///
    /// On error the reply sender is handed back so the caller can answer.
    async fn begin_single_dm(
        &mut self,
        username: String,
        message: String,
        reply: oneshot::Sender<CommandResponse>,
    ) -> Result<(), (DmflowError, oneshot::Sender<CommandResponse>)> {
        let settings = match self.single_dm_settings().await {
            Ok(settings) => settings,
            Err(e) => return Err((e, reply)),
        };
        if policy::limit_reached(&settings) {
            self.log(LogEntry::new(
                LogLevel::Warning,
                LogCategory::UserAction,
                format!("Daily limit reached ({})", settings.daily_limit),
            ))
            .await;
            return Err((
                DmflowError::LimitReached {
                    limit: settings.daily_limit,
                },
                reply,
            ));
        }

        let request = DmRequest {
            username: username.clone(),
            message,
            typing_delay_ms: policy::typing_window(Some(&settings)),
        };
        let executor = Arc::clone(&self.executor);
        let timeout = self.options.send_timeout;
        let settle = self.options.surface_settle;

        self.single_dms.spawn(async move {
            let result = send_one_off(executor, request, settle, timeout).await;
            SingleDmOutcome {
                username,
                reply,
                result,
            }
        });
        Ok(())
    }

    async fn single_dm_settings(&self) -> Result<Settings, DmflowError> {
        self.records.reset_daily_count_if_stale(Utc::now()).await?;
        self.records
            .settings()
            .await?
            .ok_or_else(|| DmflowError::NotFound {
                kind: "settings",
                id: "settings".to_string(),
            })
    }

    async fn finish_single_dm(&mut self, outcome: SingleDmOutcome) {
        let SingleDmOutcome {
            username,
            reply,
            result,
        } = outcome;

        let response = match result {
            Ok(()) => match self.records.increment_daily_count().await {
                Ok(_) => {
                    self.log(LogEntry::new(
                        LogLevel::Success,
                        LogCategory::UserAction,
                        format!("DM sent to @{username}"),
                    ))
                    .await;
                    CommandResponse::ok()
                }
                Err(e) => {
                    error!(error = %e, "failed to count single DM");
                    CommandResponse::failure(&e)
                }
            },
            Err(e) => {
                self.log(LogEntry::new(
                    LogLevel::Error,
                    LogCategory::UserAction,
                    format!("Failed to send to @{username}: {}", failure_text(&e)),
                ))
                .await;
                CommandResponse::failure(&e)
            }
        };
        let _ = reply.send(response);
    }

    // --- Helpers ---

    async fn persist_new_queue(&self, queue: &TaskQueue) -> Result<(), DmflowError> {
        self.records.reset_daily_count_if_stale(Utc::now()).await?;
        self.records.set_active_queue(queue).await
    }

    /// Append `queue` to history and empty the active slot.
    async fn archive(&self, queue: &TaskQueue) -> Result<(), DmflowError> {
        self.records.append_queue_history(queue).await?;
        self.records.clear_active_queue().await
    }

    async fn persist_queue(&self) -> Result<(), DmflowError> {
        match &self.queue {
            Some(queue) => self.records.set_active_queue(queue).await,
            None => Ok(()),
        }
    }

    fn queue_id(&self) -> String {
        self.queue.as_ref().map(|q| q.id.clone()).unwrap_or_default()
    }

    /// Append an activity log entry. Failures are reported but never abort a step.
    async fn log(&self, entry: LogEntry) {
        if let Err(e) = self.records.add_log(entry).await {
            error!(error = %e, "failed to append activity log");
        }
    }

    async fn close_surface(&self, surface: &SurfaceId) {
        if let Err(e) = self.executor.close_surface(surface).await {
            warn!(surface = %surface, error = %e, "failed to close execution surface");
        }
    }

    /// Release what the actor holds on shutdown. The active queue stays
    /// persisted as-is for recovery on the next start.
    async fn wind_down(&mut self) {
        self.timer.cancel();
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
            debug!(index = in_flight.index, "aborted in-flight send");
        }
        self.single_dms.abort_all();
        for waiting in self.waiting_dms.drain(..) {
            let _ = waiting
                .reply
                .send(CommandResponse::failure(&DmflowError::NotInitialized));
        }
        for reply in self.pending_stops.drain(..) {
            let _ = reply.send(CommandResponse::failure(&DmflowError::NotInitialized));
        }
        if let Some(surface) = self.surface.take() {
            self.close_surface(&surface).await;
        }
    }
}

/// What to record after a task's state has been persisted.
enum TaskFollowup {
    Sent,
    Retrying { reason: String, attempt: u32, max: u32 },
    Failed { reason: String },
}

/// Open a dedicated surface, send once with a bounded wait, close the surface.
async fn send_one_off(
    executor: Arc<dyn MessageExecutor>,
    request: DmRequest,
    settle: Duration,
    timeout: Duration,
) -> Result<(), DmflowError> {
    let surface = executor.open_surface().await?;
    tokio::time::sleep(settle).await;
    let sent = match tokio::time::timeout(timeout, executor.send_dm(&surface, &request)).await {
        Ok(result) => result,
        Err(_) => Err(DmflowError::Timeout { duration: timeout }),
    };
    if let Err(e) = executor.close_surface(&surface).await {
        warn!(surface = %surface, error = %e, "failed to close single DM surface");
    }
    sent
}

/// The user-facing reason for a failed send.
fn failure_text(err: &DmflowError) -> String {
    match err {
        DmflowError::Executor { message } => message.clone(),
        other => other.to_string(),
    }
}

/// Resolves with the in-flight send's outcome; pending forever when idle.
async fn wait_in_flight(slot: &mut Option<InFlight>) -> (usize, Result<(), DmflowError>) {
    match slot {
        Some(in_flight) => {
            let result = match (&mut in_flight.handle).await {
                Ok(result) => result,
                Err(e) => Err(DmflowError::executor(format!("send task aborted: {e}"))),
            };
            (in_flight.index, result)
        }
        None => std::future::pending().await,
    }
}
