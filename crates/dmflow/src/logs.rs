// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dmflow logs` command implementation.
//!
//! Reads the persisted activity log straight from the state database, so it
//! works whether or not the engine is running.

use std::io::IsTerminal;
use std::sync::Arc;

use dmflow_config::model::DmflowConfig;
use dmflow_core::types::{ActivityLog, LogLevel};
use dmflow_core::{DmflowError, PluginAdapter};
use dmflow_storage::{SqliteStore, StateRecords};

/// Run the `dmflow logs` command.
pub async fn run_logs(
    config: &DmflowConfig,
    limit: usize,
    clear: bool,
    plain: bool,
) -> Result<(), DmflowError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let store = Arc::new(store);
    let records = StateRecords::new(store.clone());

    if clear {
        records.clear_logs().await?;
        println!("activity log cleared");
    } else {
        let logs = records.logs().await?;
        let use_color = !plain && std::io::stdout().is_terminal();
        let recent = tail(&logs, limit);
        if recent.is_empty() {
            println!("no activity recorded");
        }
        for entry in recent {
            println!("{}", format_entry(entry, use_color));
        }
    }

    store.shutdown().await
}

/// The newest `limit` entries, oldest first.
fn tail(logs: &[ActivityLog], limit: usize) -> &[ActivityLog] {
    &logs[logs.len().saturating_sub(limit)..]
}

fn format_entry(entry: &ActivityLog, use_color: bool) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let level = format!("{:<7}", entry.level.to_string().to_uppercase());
    let level = if use_color {
        use colored::Colorize;
        match entry.level {
            LogLevel::Info => level.normal().to_string(),
            LogLevel::Success => level.green().to_string(),
            LogLevel::Warning => level.yellow().to_string(),
            LogLevel::Error => level.red().to_string(),
        }
    } else {
        level
    };
    format!("{timestamp}  {level}  [{}] {}", entry.category, entry.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmflow_core::types::LogCategory;

    fn entry(message: &str, level: LogLevel) -> ActivityLog {
        serde_json::from_value(serde_json::json!({
            "id": message,
            "timestamp": "2026-03-01T09:30:00Z",
            "type": level,
            "category": LogCategory::Task,
            "message": message,
        }))
        .unwrap()
    }

    #[test]
    fn tail_keeps_newest_entries_in_order() {
        let logs: Vec<_> = (0..5)
            .map(|i| entry(&format!("m{i}"), LogLevel::Info))
            .collect();
        let recent: Vec<_> = tail(&logs, 2).iter().map(|l| l.message.as_str()).collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(tail(&logs, 50).len(), 5);
        assert!(tail(&logs, 0).is_empty());
    }

    #[test]
    fn plain_format_has_level_and_category() {
        let line = format_entry(&entry("DM sent to @alice", LogLevel::Success), false);
        assert_eq!(line, "2026-03-01 09:30:00  SUCCESS  [task] DM sent to @alice");
    }
}
