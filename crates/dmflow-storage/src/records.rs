// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed access to the records of a [`StateStore`].
//!
//! Collections read as empty when the store has never been initialized.
//! Every write replaces the whole record; read-modify-write helpers here are
//! only atomic when a single writer (the engine actor) calls them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use dmflow_core::types::{
    day_key, ActivityLog, ContactList, ContactStatus, LogEntry, MessageTemplate, Settings,
    TaskQueue, MAX_LOG_ENTRIES,
};
use dmflow_core::{DmflowError, StateKey, StateStore};

pub const DEFAULT_TEMPLATE_NAME: &str = "Default Template";
pub const DEFAULT_TEMPLATE_CONTENT: &str =
    "Hi {Name}! I came across your profile and love your content in {Category}. Would love to connect!";

/// Typed facade over a shared [`StateStore`].
#[derive(Clone)]
pub struct StateRecords {
    store: Arc<dyn StateStore>,
}

impl StateRecords {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    async fn read<T: DeserializeOwned>(&self, key: StateKey) -> Result<Option<T>, DmflowError> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: StateKey, value: &T) -> Result<(), DmflowError> {
        self.store.set(key, serde_json::to_value(value)?).await
    }

    /// Seed any record that has never been written: default settings, one
    /// default template, and empty collections. Existing records are kept.
    pub async fn initialize_defaults(&self) -> Result<(), DmflowError> {
        if self.store.get(StateKey::Settings).await?.is_none() {
            self.write(StateKey::Settings, &Settings::default()).await?;
        }
        if self.store.get(StateKey::ContactLists).await?.is_none() {
            self.write(StateKey::ContactLists, &Vec::<ContactList>::new())
                .await?;
        }
        if self.store.get(StateKey::Templates).await?.is_none() {
            let seed = vec![MessageTemplate::new(
                DEFAULT_TEMPLATE_NAME,
                DEFAULT_TEMPLATE_CONTENT,
            )];
            self.write(StateKey::Templates, &seed).await?;
        }
        if self.store.get(StateKey::Logs).await?.is_none() {
            self.write(StateKey::Logs, &Vec::<ActivityLog>::new()).await?;
        }
        if self.store.get(StateKey::QueueHistory).await?.is_none() {
            self.write(StateKey::QueueHistory, &Vec::<TaskQueue>::new())
                .await?;
        }
        debug!("state defaults ensured");
        Ok(())
    }

    // --- Contact lists ---

    pub async fn contact_lists(&self) -> Result<Vec<ContactList>, DmflowError> {
        Ok(self.read(StateKey::ContactLists).await?.unwrap_or_default())
    }

    pub async fn set_contact_lists(&self, lists: &[ContactList]) -> Result<(), DmflowError> {
        self.write(StateKey::ContactLists, lists).await
    }

    pub async fn contact_list(&self, list_id: &str) -> Result<Option<ContactList>, DmflowError> {
        Ok(self
            .contact_lists()
            .await?
            .into_iter()
            .find(|l| l.id == list_id))
    }

    /// Insert `list`, or replace the list with the same id.
    pub async fn save_contact_list(&self, list: ContactList) -> Result<(), DmflowError> {
        let mut lists = self.contact_lists().await?;
        match lists.iter_mut().find(|l| l.id == list.id) {
            Some(existing) => *existing = list,
            None => lists.push(list),
        }
        self.set_contact_lists(&lists).await
    }

    /// Set one contact's delivery status, wherever it lives.
    ///
    /// `sent` stamps `sent_at`. Returns `false` when no list holds the contact.
    pub async fn update_contact_status(
        &self,
        contact_id: &str,
        status: ContactStatus,
        error: Option<String>,
    ) -> Result<bool, DmflowError> {
        let mut lists = self.contact_lists().await?;
        let now = Utc::now();
        let mut found = false;

        for list in lists.iter_mut() {
            if let Some(contact) = list.contacts.iter_mut().find(|c| c.id == contact_id) {
                contact.status = status;
                contact.error_message = error.clone();
                if status == ContactStatus::Sent {
                    contact.sent_at = Some(now);
                }
                list.updated_at = now;
                found = true;
                break;
            }
        }

        if found {
            self.set_contact_lists(&lists).await?;
        }
        Ok(found)
    }

    // --- Templates ---

    pub async fn templates(&self) -> Result<Vec<MessageTemplate>, DmflowError> {
        Ok(self.read(StateKey::Templates).await?.unwrap_or_default())
    }

    pub async fn set_templates(&self, templates: &[MessageTemplate]) -> Result<(), DmflowError> {
        self.write(StateKey::Templates, templates).await
    }

    pub async fn template(&self, template_id: &str) -> Result<Option<MessageTemplate>, DmflowError> {
        Ok(self
            .templates()
            .await?
            .into_iter()
            .find(|t| t.id == template_id))
    }

    // --- Queues ---

    pub async fn active_queue(&self) -> Result<Option<TaskQueue>, DmflowError> {
        self.read(StateKey::ActiveQueue).await
    }

    pub async fn set_active_queue(&self, queue: &TaskQueue) -> Result<(), DmflowError> {
        self.write(StateKey::ActiveQueue, queue).await
    }

    pub async fn clear_active_queue(&self) -> Result<(), DmflowError> {
        self.store.remove(StateKey::ActiveQueue).await
    }

    pub async fn queue_history(&self) -> Result<Vec<TaskQueue>, DmflowError> {
        Ok(self.read(StateKey::QueueHistory).await?.unwrap_or_default())
    }

    pub async fn append_queue_history(&self, queue: &TaskQueue) -> Result<(), DmflowError> {
        let mut history = self.queue_history().await?;
        history.push(queue.clone());
        self.write(StateKey::QueueHistory, &history).await
    }

    // --- Activity log ---

    pub async fn logs(&self) -> Result<Vec<ActivityLog>, DmflowError> {
        Ok(self.read(StateKey::Logs).await?.unwrap_or_default())
    }

    /// Append an entry, keeping only the newest [`MAX_LOG_ENTRIES`].
    ///
    /// The entry is mirrored to `tracing` at the matching level.
    pub async fn add_log(&self, entry: LogEntry) -> Result<ActivityLog, DmflowError> {
        let record = entry.into_record();
        mirror_to_tracing(&record);

        let mut logs = self.logs().await?;
        logs.push(record.clone());
        if logs.len() > MAX_LOG_ENTRIES {
            let excess = logs.len() - MAX_LOG_ENTRIES;
            logs.drain(..excess);
        }
        self.write(StateKey::Logs, &logs).await?;
        Ok(record)
    }

    pub async fn clear_logs(&self) -> Result<(), DmflowError> {
        self.write(StateKey::Logs, &Vec::<ActivityLog>::new()).await
    }

    // --- Settings and daily counter ---

    pub async fn settings(&self) -> Result<Option<Settings>, DmflowError> {
        self.read(StateKey::Settings).await
    }

    pub async fn set_settings(&self, settings: &Settings) -> Result<(), DmflowError> {
        self.write(StateKey::Settings, settings).await
    }

    /// Zero the daily counter if it was last reset on a day other than `now`'s.
    ///
    /// Returns whether a reset happened. Calling it twice on one day resets once.
    pub async fn reset_daily_count_if_stale(&self, now: DateTime<Utc>) -> Result<bool, DmflowError> {
        let Some(mut settings) = self.settings().await? else {
            return Ok(false);
        };
        let today = day_key(now);
        if settings.last_reset_date == today {
            return Ok(false);
        }
        info!(
            previous = %settings.last_reset_date,
            sent = settings.today_sent_count,
            "daily counter rolled over"
        );
        settings.today_sent_count = 0;
        settings.last_reset_date = today;
        self.set_settings(&settings).await?;
        Ok(true)
    }

    /// Unconditionally zero the daily counter and stamp today's date.
    pub async fn reset_daily_count(&self, now: DateTime<Utc>) -> Result<(), DmflowError> {
        if let Some(mut settings) = self.settings().await? {
            settings.today_sent_count = 0;
            settings.last_reset_date = day_key(now);
            self.set_settings(&settings).await?;
        }
        Ok(())
    }

    /// Count one successful send. Returns the new count, or 0 without settings.
    pub async fn increment_daily_count(&self) -> Result<u32, DmflowError> {
        let Some(mut settings) = self.settings().await? else {
            return Ok(0);
        };
        settings.today_sent_count = settings.today_sent_count.saturating_add(1);
        self.set_settings(&settings).await?;
        Ok(settings.today_sent_count)
    }
}

fn mirror_to_tracing(record: &ActivityLog) {
    use dmflow_core::types::LogLevel;

    let category = record.category.to_string();
    match record.level {
        LogLevel::Error => tracing::error!(
            category,
            queue_id = record.queue_id.as_deref(),
            task_id = record.task_id.as_deref(),
            "{}",
            record.message
        ),
        LogLevel::Warning => tracing::warn!(
            category,
            queue_id = record.queue_id.as_deref(),
            task_id = record.task_id.as_deref(),
            "{}",
            record.message
        ),
        LogLevel::Info | LogLevel::Success => tracing::info!(
            category,
            queue_id = record.queue_id.as_deref(),
            task_id = record.task_id.as_deref(),
            "{}",
            record.message
        ),
    }
}
