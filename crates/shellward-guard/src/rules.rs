//! The built-in danger rule table.
//!
//! Rules are ordered; [`crate::RuleSet::classify`] reports the reasons of
//! every matching rule in the order they appear here. Reason strings are
//! part of the wire protocol surface (adapters display them verbatim), so
//! changing one is a compatibility decision.

/// Specification of a single danger rule, compiled at startup.
#[derive(Debug, Clone, Copy)]
pub enum RuleSpec {
    /// A plain regex over the trimmed command text.
    Pattern {
        pattern: &'static str,
        reason: &'static str,
    },
    /// Privilege-escalation wrappers (`sudo`/`doas`/`pkexec`). Matches when
    /// the wrapped command is not on the read-only allowlist; a regex alone
    /// cannot express the allowlist, so this rule carries code.
    PrivilegeEscalation { reason: &'static str },
}

/// The ordered built-in rule table.
pub const BUILTIN_RULES: &[RuleSpec] = &[
    RuleSpec::Pattern {
        pattern: r"\brm\b[^|;&]*\s(-[a-zA-Z]*r[a-zA-Z]*|--recursive|--no-preserve-root)\b[^|;&]*\s/\s*$",
        reason: "recursive delete from root",
    },
    RuleSpec::Pattern {
        pattern: r"\brm\b[^|;&]*\s(\*/\*|\*)\s*$",
        reason: "wildcard recursive delete",
    },
    RuleSpec::Pattern {
        pattern: r"(\bdd\b[^|;&]*\bof=|>+\s*)/dev/(sd[a-z]|hd[a-z]|nvme\d+n\d+|mmcblk\d+|disk\d+)\b",
        reason: "raw write to block device",
    },
    RuleSpec::Pattern {
        pattern: r"\bmkfs(\.[a-z0-9]+)?\b",
        reason: "filesystem creation",
    },
    RuleSpec::Pattern {
        pattern: r":\s*\(\s*\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        reason: "fork bomb",
    },
    RuleSpec::Pattern {
        pattern: r"\b(chown|chmod)\b[^|;&]*\s-[a-zA-Z]*R[a-zA-Z]*\b[^|;&]*\s/\s*$",
        reason: "recursive permission change at root",
    },
    RuleSpec::Pattern {
        pattern: r"\bshred\b[^|;&]*(\s/dev/\S+|\s/\s*$)",
        reason: "shred on device or root",
    },
    RuleSpec::Pattern {
        pattern: r"\b(curl|wget|fetch)\b[^|;&]*\|\s*(sudo\s+)?(sh|bash|zsh|dash|python3?|perl|ruby|node)\b",
        reason: "remote content piped to interpreter",
    },
    RuleSpec::Pattern {
        pattern: r"(>{1,2}\s*|\btee\b\s+(-a\s+)?)/(etc|boot|bin|sbin|usr|lib|lib64|sys|proc)/",
        reason: "redirection into protected system path",
    },
    RuleSpec::Pattern {
        pattern: r"\b(rm|unlink)\b[^|;&]*\s/(etc|boot|bin|sbin|usr|lib)/",
        reason: "deletion under protected system path",
    },
    RuleSpec::PrivilegeEscalation {
        reason: "privilege escalation on non-allowlisted command",
    },
    RuleSpec::Pattern {
        pattern: r"\bkill\b\s+(-9|-KILL|-s\s+(SIG)?KILL)\s+1\b",
        reason: "sigkill of pid 1",
    },
    RuleSpec::Pattern {
        pattern: r"\b(shutdown|reboot|halt|poweroff)\b",
        reason: "system power action",
    },
];

/// Read-only utilities that may be wrapped in `sudo` without triggering the
/// privilege-escalation rule.
pub const ALLOWED_UNDER_SUDO: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "egrep", "fgrep", "find", "pwd", "whoami", "id", "date",
    "uptime", "df", "du", "free", "uname", "stat", "wc", "cut", "sort", "uniq", "ps", "top",
    "htop", "ss", "dmesg", "journalctl",
];
