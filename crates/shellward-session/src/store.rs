//! The bounded per-session context store.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use shellward_types::{EventKind, SessionId};

/// One evaluated request, as remembered by the session.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    /// The command (or directive text) the request carried.
    pub command: String,
    /// The action tag of the response we gave.
    pub action: String,
}

/// Which collaborator produced a pending candidate, with enough context to
/// re-invoke it during a replan round.
#[derive(Debug, Clone)]
pub enum ApprovalOrigin {
    /// The translator, from a natural-language intent (or a literal command
    /// rephrased as an intent when the user rejected it).
    Translate { intent: String },
    /// The fixer, from a failed command.
    Fix {
        command: String,
        stderr_tail: String,
        intent: Option<String>,
    },
}

/// A candidate command awaiting the user's confirmation.
///
/// Server-authoritative: it lives in the session and survives adapter
/// reconnects. `attempts` counts replan rounds and never exceeds the
/// configured bound.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub origin: ApprovalOrigin,
    pub candidate: String,
    pub explanation: String,
    pub attempts: u32,
    pub last_feedback: Option<String>,
}

/// Read-only context handed to collaborators: recent interactions and the
/// shell's working directory, captured under the session lock so the
/// collaborator never touches live state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub cwd: Option<String>,
    pub recent: Vec<String>,
}

/// Mutable state of one session. Only ever touched while the owning
/// pipeline invocation holds the session's lock.
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    history: VecDeque<InteractionRecord>,
    capacity: usize,
    cwd: Option<String>,
    pending: Option<PendingApproval>,
    created_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(id: SessionId, capacity: usize) -> Self {
        Self {
            id,
            history: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            cwd: None,
            pending: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    pub fn set_cwd(&mut self, cwd: impl Into<String>) {
        self.cwd = Some(cwd.into());
    }

    /// Append an interaction record, evicting the oldest once full.
    pub fn record(&mut self, kind: EventKind, command: impl Into<String>, action: &str) {
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(InteractionRecord {
            id: Uuid::new_v4(),
            at: Utc::now(),
            kind,
            command: command.into(),
            action: action.to_string(),
        });
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.history.iter()
    }

    /// Capture the most recent `lines` interactions plus the cwd for a
    /// collaborator call.
    pub fn snapshot(&self, lines: usize) -> SessionSnapshot {
        let start = self.history.len().saturating_sub(lines);
        SessionSnapshot {
            cwd: self.cwd.clone(),
            recent: self
                .history
                .iter()
                .skip(start)
                .map(|r| format!("[{}] {} -> {}", r.kind, r.command, r.action))
                .collect(),
        }
    }

    pub fn pending(&self) -> Option<&PendingApproval> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, pending: PendingApproval) {
        self.pending = Some(pending);
    }

    pub fn take_pending(&mut self) -> Option<PendingApproval> {
        self.pending.take()
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}
