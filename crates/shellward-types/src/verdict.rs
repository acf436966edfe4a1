//! Danger verdicts produced by the classifier.

use serde::{Deserialize, Serialize};

/// The result of classifying a command against the danger rule table.
///
/// Invariant: `reasons` is non-empty if and only if `dangerous` is true.
/// The constructors are the only way pipeline code builds verdicts, so the
/// invariant holds by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DangerVerdict {
    /// Whether the command matched at least one danger rule.
    pub dangerous: bool,
    /// Why, one entry per matched rule, in rule-definition order.
    pub reasons: Vec<String>,
}

impl DangerVerdict {
    /// A verdict for a command that matched no rule.
    pub fn safe() -> Self {
        Self {
            dangerous: false,
            reasons: Vec::new(),
        }
    }

    /// A verdict carrying the matched reasons. An empty `reasons` list is
    /// treated as safe, preserving the invariant.
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            dangerous: !reasons.is_empty(),
            reasons,
        }
    }
}
