//! Wire protocol types for the daemon.
//!
//! Each connection carries exactly one [`CommandRequest`] line and receives
//! exactly one [`PipelineResponse`] line, both single-line JSON, then the
//! connection closes. Requests are sent by the shell hook adapter at command
//! boundaries; responses tell the adapter whether to proceed, replace,
//! confirm, or abort.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::verdict::DangerVerdict;

/// A request sent by the shell hook adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandRequest {
    /// A command is about to run.
    Preexec {
        #[serde(default)]
        session: SessionId,
        /// The raw command line, or natural language behind the directive prefix.
        cmd: String,
        /// Current working directory of the shell.
        #[serde(default)]
        cwd: Option<String>,
    },
    /// A command just finished.
    Postexec {
        #[serde(default)]
        session: SessionId,
        /// The command that ran.
        cmd: String,
        exit_code: i32,
        /// Best-effort tail of the command's stderr.
        #[serde(default)]
        stderr_tail: String,
        /// Optional user intent, when the adapter knows it.
        #[serde(default)]
        intent: Option<String>,
    },
    /// The user rejected a candidate that required confirmation and supplied
    /// free-text feedback for a replan round.
    Feedback {
        #[serde(default)]
        session: SessionId,
        feedback: String,
    },
}

impl CommandRequest {
    /// The session this request belongs to.
    pub fn session(&self) -> &SessionId {
        match self {
            CommandRequest::Preexec { session, .. } => session,
            CommandRequest::Postexec { session, .. } => session,
            CommandRequest::Feedback { session, .. } => session,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            CommandRequest::Preexec { .. } => EventKind::Preexec,
            CommandRequest::Postexec { .. } => EventKind::Postexec,
            CommandRequest::Feedback { .. } => EventKind::Feedback,
        }
    }
}

/// The kind of shell event a request describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Preexec,
    Postexec,
    Feedback,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Preexec => write!(f, "preexec"),
            EventKind::Postexec => write!(f, "postexec"),
            EventKind::Feedback => write!(f, "feedback"),
        }
    }
}

/// The daemon's answer to a request.
///
/// `danger_reasons` is non-empty exactly when `require_confirmation` was set
/// because the classifier flagged the command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PipelineResponse {
    /// Run the original command as typed.
    Proceed {
        command: String,
        require_confirmation: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        danger_reasons: Vec<String>,
    },
    /// Run this command instead of the typed line.
    Replace {
        command: String,
        explanation: String,
        require_confirmation: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        danger_reasons: Vec<String>,
    },
    /// Offer a corrected command after a failure.
    SuggestFix {
        suggested_command: String,
        explanation: String,
        require_confirmation: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        danger_reasons: Vec<String>,
    },
    /// Nothing to run; show the message. The adapter must not execute the
    /// original line when it asked for a translation.
    Message { message: String },
    /// No action required.
    None {},
}

impl PipelineResponse {
    /// Proceed with the typed command, carrying the classifier verdict.
    pub fn proceed(command: impl Into<String>, verdict: &DangerVerdict) -> Self {
        Self::Proceed {
            command: command.into(),
            require_confirmation: verdict.dangerous,
            danger_reasons: verdict.reasons.clone(),
        }
    }

    /// Replace the typed line with a translated command.
    pub fn replace(
        command: impl Into<String>,
        explanation: impl Into<String>,
        verdict: &DangerVerdict,
    ) -> Self {
        Self::Replace {
            command: command.into(),
            explanation: explanation.into(),
            require_confirmation: verdict.dangerous,
            danger_reasons: verdict.reasons.clone(),
        }
    }

    /// Suggest a corrected command after a failure.
    pub fn suggest_fix(
        suggested_command: impl Into<String>,
        explanation: impl Into<String>,
        verdict: &DangerVerdict,
    ) -> Self {
        Self::SuggestFix {
            suggested_command: suggested_command.into(),
            explanation: explanation.into(),
            require_confirmation: verdict.dangerous,
            danger_reasons: verdict.reasons.clone(),
        }
    }

    /// A diagnostic or informational message with no command attached.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn none() -> Self {
        Self::None {}
    }

    /// The action tag, for logging and history records.
    pub fn action_name(&self) -> &'static str {
        match self {
            PipelineResponse::Proceed { .. } => "proceed",
            PipelineResponse::Replace { .. } => "replace",
            PipelineResponse::SuggestFix { .. } => "suggest_fix",
            PipelineResponse::Message { .. } => "message",
            PipelineResponse::None {} => "none",
        }
    }

    /// Whether the adapter must ask the user before running anything.
    pub fn requires_confirmation(&self) -> bool {
        match self {
            PipelineResponse::Proceed {
                require_confirmation,
                ..
            }
            | PipelineResponse::Replace {
                require_confirmation,
                ..
            }
            | PipelineResponse::SuggestFix {
                require_confirmation,
                ..
            } => *require_confirmation,
            _ => false,
        }
    }
}
