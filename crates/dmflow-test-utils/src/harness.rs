// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end orchestrator testing.
//!
//! `TestHarness` seeds an in-memory store with settings, one contact list and
//! one template, then runs a real [`Orchestrator`] against a [`MockExecutor`].
//! Delays default to zero so a queue runs to completion as fast as the
//! runtime allows; use `#[tokio::test(start_paused = true)]` for tests that
//! depend on send timing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dmflow_core::types::{
    ActivityLog, Contact, ContactList, MessageTemplate, Settings, TaskQueue,
};
use dmflow_core::DmflowError;
use dmflow_engine::{Command, CommandResponse, CommandRouter, EngineOptions, Orchestrator};
use dmflow_storage::StateRecords;
use dmflow_template::SpintaxResolver;

use crate::memory_store::MemoryStore;
use crate::mock_executor::MockExecutor;

/// Polls between checks in [`TestHarness::wait_for`].
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Upper bound on polls before a wait is declared stuck.
const MAX_POLLS: usize = 20_000;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    contacts: usize,
    template: String,
    settings: Settings,
    store: Option<Arc<MemoryStore>>,
    executor: Option<Arc<MockExecutor>>,
    send_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            contacts: 3,
            template: "{Hi|Hi} {Name}!".to_string(),
            settings: Settings {
                min_delay: 0,
                max_delay: 0,
                ..Settings::default()
            },
            store: None,
            executor: None,
            send_timeout: Duration::from_secs(30),
        }
    }

    /// Number of pending contacts in the seeded list.
    pub fn with_contacts(mut self, count: usize) -> Self {
        self.contacts = count;
        self
    }

    /// Template body for the seeded template.
    pub fn with_template(mut self, content: &str) -> Self {
        self.template = content.to_string();
        self
    }

    /// Adjust the seeded settings.
    pub fn with_settings(mut self, adjust: impl FnOnce(&mut Settings)) -> Self {
        adjust(&mut self.settings);
        self
    }

    /// Reuse an existing store instead of seeding a fresh one.
    ///
    /// Nothing is seeded; the harness picks up the first list and template
    /// already in the store. Use this to simulate a restart.
    pub fn with_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_executor(mut self, executor: Arc<MockExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Seed state (unless reusing a store) and start the orchestrator.
    pub async fn build(self) -> Result<TestHarness, DmflowError> {
        let reuse = self.store.is_some();
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let records = StateRecords::new(store.clone());

        if !reuse {
            records.initialize_defaults().await?;
            records.set_settings(&self.settings).await?;

            let contacts = (1..=self.contacts)
                .map(|i| {
                    let mut contact =
                        Contact::new(format!("user{i}"), format!("https://example.com/user{i}"));
                    contact.name = Some(format!("User{i}"));
                    contact.category = Some("Fashion".to_string());
                    contact
                })
                .collect();
            records
                .save_contact_list(ContactList::new("Test list", contacts))
                .await?;
            records
                .set_templates(&[MessageTemplate::new("Test template", self.template)])
                .await?;
        }

        let list_id = records
            .contact_lists()
            .await?
            .first()
            .map(|l| l.id.clone())
            .unwrap_or_default();
        let template_id = records
            .templates()
            .await?
            .first()
            .map(|t| t.id.clone())
            .unwrap_or_default();

        let executor = self.executor.unwrap_or_else(|| Arc::new(MockExecutor::new()));
        let options = EngineOptions {
            send_timeout: self.send_timeout,
            surface_settle: Duration::ZERO,
            mailbox_capacity: 16,
        };
        let orchestrator = Orchestrator::new(
            records.clone(),
            executor.clone(),
            Arc::new(SpintaxResolver::new()),
            options,
        );

        let shutdown = CancellationToken::new();
        let (handle, join) = orchestrator.spawn(shutdown.clone());
        let router = CommandRouter::new(Duration::from_secs(3600));
        router.attach(handle);

        Ok(TestHarness {
            store,
            records,
            executor,
            router,
            list_id,
            template_id,
            shutdown,
            join,
        })
    }
}

/// A running orchestrator with mock collaborators.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub records: StateRecords,
    pub executor: Arc<MockExecutor>,
    pub router: CommandRouter,
    /// Id of the seeded (or first stored) contact list.
    pub list_id: String,
    /// Id of the seeded (or first stored) template.
    pub template_id: String,
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl TestHarness {
    /// Create a builder for configuring the test environment.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn dispatch(&self, command: Command) -> CommandResponse {
        self.router.dispatch(command).await
    }

    /// Start a queue over the seeded list and template.
    pub async fn start(&self) -> CommandResponse {
        self.dispatch(Command::StartQueue {
            list_id: self.list_id.clone(),
            template_id: self.template_id.clone(),
            name: "Test run".to_string(),
        })
        .await
    }

    /// The engine's view of the active queue.
    pub async fn status(&self) -> Option<TaskQueue> {
        self.dispatch(Command::GetQueueStatus).await.queue
    }

    /// Poll the active queue until `predicate` holds, returning that snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the predicate never holds.
    pub async fn wait_for(&self, predicate: impl Fn(Option<&TaskQueue>) -> bool) -> Option<TaskQueue> {
        for _ in 0..MAX_POLLS {
            let queue = self.status().await;
            if predicate(queue.as_ref()) {
                return queue;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        panic!("condition on the active queue never held");
    }

    /// Wait until the active slot is empty.
    pub async fn wait_until_idle(&self) {
        self.wait_for(|q| q.is_none()).await;
    }

    /// Wait until the executor has received at least `count` sends.
    pub async fn wait_for_sends(&self, count: usize) {
        for _ in 0..MAX_POLLS {
            if self.executor.sent_count().await >= count {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        panic!("executor never received {count} sends");
    }

    pub async fn settings(&self) -> Settings {
        self.records
            .settings()
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    pub async fn logs(&self) -> Vec<ActivityLog> {
        self.records.logs().await.unwrap_or_default()
    }

    pub async fn history(&self) -> Vec<TaskQueue> {
        self.records.queue_history().await.unwrap_or_default()
    }

    pub async fn contact_list(&self) -> ContactList {
        match self.records.contact_list(&self.list_id).await {
            Ok(Some(list)) => list,
            other => panic!("seeded contact list missing: {other:?}"),
        }
    }

    /// Signal shutdown and wait for the orchestrator to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.join.await;
    }
}
