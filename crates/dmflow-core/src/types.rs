// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared by the store, the engine, and the transports.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Maximum number of activity log entries kept; older entries are dropped first.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Returns the calendar-day key (`YYYY-MM-DD`, UTC) used by the daily counter.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

/// Parses a day key back into a date. Returns `None` for malformed keys.
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// Generates a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque handle of an execution surface (a browser tab on the remote side).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub String);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays for the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Store,
    Executor,
    Resolver,
    Transport,
}

// --- Contacts ---

/// Delivery status of a single contact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Pending,
    InProgress,
    Sent,
    Failed,
    Skipped,
}

impl ContactStatus {
    /// Contacts in these states are picked up by a new queue run.
    pub fn is_eligible(self) -> bool {
        matches!(self, ContactStatus::Pending | ContactStatus::Failed)
    }
}

/// One imported profile to message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub username: String,
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl Contact {
    /// Creates a pending contact for `username`.
    pub fn new(username: impl Into<String>, profile_url: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            username: username.into(),
            profile_url: profile_url.into(),
            name: None,
            category: None,
            custom_fields: BTreeMap::new(),
            status: ContactStatus::Pending,
            error_message: None,
            sent_at: None,
            retry_count: None,
        }
    }

    /// Template variables for this contact: `Name`, `Category`, then custom fields.
    ///
    /// Custom fields are applied last, so a custom `Name` column overrides the
    /// standard one.
    pub fn template_variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("Name".to_string(), self.name.clone().unwrap_or_default());
        vars.insert(
            "Category".to_string(),
            self.category.clone().unwrap_or_default(),
        );
        for (k, v) in &self.custom_fields {
            vars.insert(k.clone(), v.clone());
        }
        vars
    }
}

/// Named, ordered collection of contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactList {
    pub fn new(name: impl Into<String>, contacts: Vec<Contact>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            contacts,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A message template with variable placeholders and randomized-choice groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// --- Tasks and queues ---

/// Lifecycle of a single send attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Navigating,
    Typing,
    Sending,
    Sent,
    Failed,
    Skipped,
    Paused,
}

impl TaskStatus {
    /// Terminal tasks are never re-executed by the same queue run.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Sent | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// One queued attempt to deliver a resolved message to one handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmTask {
    pub id: String,
    pub contact_id: String,
    pub list_id: String,
    pub template_id: String,
    pub username: String,
    /// Resolved message text; never re-resolved after task creation.
    pub message: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl DmTask {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Status of an automation run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl QueueStatus {
    /// Running and paused queues occupy the single active slot.
    pub fn is_active(self) -> bool {
        matches!(self, QueueStatus::Running | QueueStatus::Paused)
    }
}

/// One automation run: an ordered batch of tasks executed sequentially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskQueue {
    pub id: String,
    pub name: String,
    pub list_id: String,
    pub template_id: String,
    pub tasks: Vec<DmTask>,
    pub status: QueueStatus,
    /// Index of the next task to attempt.
    pub current_index: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_surface: Option<SurfaceId>,
}

impl TaskQueue {
    /// Builds a running queue over `tasks` with the pointer at the first task.
    pub fn new(
        name: impl Into<String>,
        list_id: impl Into<String>,
        template_id: impl Into<String>,
        tasks: Vec<DmTask>,
    ) -> Self {
        let total_tasks = tasks.len();
        Self {
            id: new_id(),
            name: name.into(),
            list_id: list_id.into(),
            template_id: template_id.into(),
            tasks,
            status: QueueStatus::Running,
            current_index: 0,
            total_tasks,
            completed_tasks: 0,
            failed_tasks: 0,
            skipped_tasks: 0,
            started_at: Some(Utc::now()),
            paused_at: None,
            completed_at: None,
            execution_surface: None,
        }
    }

    /// Whether every task has been attempted to a terminal state.
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.tasks.len()
    }

    /// `completed + failed + skipped <= current_index <= total_tasks`.
    pub fn counters_consistent(&self) -> bool {
        self.completed_tasks + self.failed_tasks + self.skipped_tasks <= self.current_index
            && self.current_index <= self.total_tasks
    }
}

// --- Settings ---

/// User-tunable limits and policy. Re-read by the engine before every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub daily_limit: u32,
    pub today_sent_count: u32,
    /// `YYYY-MM-DD` (UTC) of the last daily counter reset.
    pub last_reset_date: String,
    /// Inter-task delay bounds, seconds.
    pub min_delay: u64,
    pub max_delay: u64,
    /// Simulated typing speed bounds, milliseconds per character.
    pub typing_speed_min: u32,
    pub typing_speed_max: u32,
    pub enable_notifications: bool,
    pub pause_on_error: bool,
    pub auto_retry: bool,
    pub max_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            daily_limit: 30,
            today_sent_count: 0,
            last_reset_date: day_key(Utc::now()),
            min_delay: 60,
            max_delay: 300,
            typing_speed_min: 50,
            typing_speed_max: 250,
            enable_notifications: true,
            pause_on_error: true,
            auto_retry: true,
            max_retries: 3,
        }
    }
}

// --- Activity log ---

/// Severity of an activity log entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// What produced an activity log entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogCategory {
    Task,
    System,
    UserAction,
}

/// A persisted, user-visible activity log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// An activity log entry before it is stamped with an id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub task_id: Option<String>,
    pub queue_id: Option<String>,
    pub list_id: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl LogEntry {
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            level,
            category,
            message: message.into(),
            task_id: None,
            queue_id: None,
            list_id: None,
            metadata: None,
        }
    }

    pub fn task(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(level, LogCategory::Task, message)
    }

    pub fn with_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }

    pub fn with_queue(mut self, queue_id: &str) -> Self {
        self.queue_id = Some(queue_id.to_string());
        self
    }

    pub fn with_list(mut self, list_id: &str) -> Self {
        self.list_id = Some(list_id.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_string(), value);
        self
    }

    /// Stamps the entry with a fresh id and the current time.
    pub fn into_record(self) -> ActivityLog {
        ActivityLog {
            id: new_id(),
            timestamp: Utc::now(),
            level: self.level,
            category: self.category,
            message: self.message,
            task_id: self.task_id,
            queue_id: self.queue_id,
            list_id: self.list_id,
            metadata: self.metadata,
        }
    }
}

// --- Store keys ---

/// Independently readable/writable records of the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StateKey {
    ContactLists,
    Templates,
    ActiveQueue,
    QueueHistory,
    Logs,
    Settings,
}

impl StateKey {
    pub const ALL: [StateKey; 6] = [
        StateKey::ContactLists,
        StateKey::Templates,
        StateKey::ActiveQueue,
        StateKey::QueueHistory,
        StateKey::Logs,
        StateKey::Settings,
    ];
}
