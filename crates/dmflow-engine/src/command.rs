// SPDX-FileCopyrightText: 2026 Dmflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command interface: a closed set of requests and their uniform reply.

use serde::{Deserialize, Serialize};

use dmflow_core::types::TaskQueue;
use dmflow_core::DmflowError;

/// A request to the engine. Serialized with a `type` tag, e.g.
/// `{"type": "START_QUEUE", "list_id": "...", "template_id": "...", "name": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartQueue {
        list_id: String,
        template_id: String,
        name: String,
    },
    PauseQueue,
    ResumeQueue,
    StopQueue,
    GetQueueStatus,
    SendSingleDm {
        username: String,
        message: String,
    },
    /// Zero the daily counter. Without `force` this only acts once per day.
    ResetDailyCount {
        #[serde(default)]
        force: bool,
    },
}

impl Command {
    /// Wire name of the command, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::StartQueue { .. } => "START_QUEUE",
            Command::PauseQueue => "PAUSE_QUEUE",
            Command::ResumeQueue => "RESUME_QUEUE",
            Command::StopQueue => "STOP_QUEUE",
            Command::GetQueueStatus => "GET_QUEUE_STATUS",
            Command::SendSingleDm { .. } => "SEND_SINGLE_DM",
            Command::ResetDailyCount { .. } => "RESET_DAILY_COUNT",
        }
    }
}

/// Reply to every [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The active queue after the command, when the command reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<TaskQueue>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            queue: None,
        }
    }

    pub fn with_queue(queue: Option<TaskQueue>) -> Self {
        Self {
            success: true,
            error: None,
            queue,
        }
    }

    pub fn failure(err: &DmflowError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            queue: None,
        }
    }
}

impl From<Result<CommandResponse, DmflowError>> for CommandResponse {
    fn from(result: Result<CommandResponse, DmflowError>) -> Self {
        match result {
            Ok(response) => response,
            Err(err) => CommandResponse::failure(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn commands_use_type_tag() {
        let cmd: Command = serde_json::from_value(json!({
            "type": "START_QUEUE",
            "list_id": "l1",
            "template_id": "t1",
            "name": "Morning run"
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::StartQueue {
                list_id: "l1".into(),
                template_id: "t1".into(),
                name: "Morning run".into(),
            }
        );

        let pause: Command = serde_json::from_value(json!({"type": "PAUSE_QUEUE"})).unwrap();
        assert_eq!(pause, Command::PauseQueue);
        assert_eq!(pause.kind(), "PAUSE_QUEUE");
    }

    #[test]
    fn reset_force_defaults_to_false() {
        let cmd: Command =
            serde_json::from_value(json!({"type": "RESET_DAILY_COUNT"})).unwrap();
        assert_eq!(cmd, Command::ResetDailyCount { force: false });
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = serde_json::from_value::<Command>(json!({"type": "DELETE_EVERYTHING"}));
        assert!(err.is_err());
    }

    #[test]
    fn failure_response_omits_queue() {
        let resp = CommandResponse::failure(&DmflowError::EmptyQueue);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], json!(false));
        assert!(value.get("queue").is_none());
        assert!(value["error"].as_str().unwrap().contains("no contacts"));
    }
}
