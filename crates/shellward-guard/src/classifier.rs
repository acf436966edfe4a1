//! Rule compilation and classification.

use regex::Regex;

use shellward_types::{DangerVerdict, ShellwardError};

use crate::rules::{RuleSpec, ALLOWED_UNDER_SUDO, BUILTIN_RULES};

/// Pattern that locates a privilege-escalation wrapper and captures the
/// wrapped command text.
const ESCALATION_PATTERN: &str = r"(?:^|[\s;|&])(sudo|doas|pkexec)\b\s*(.*)$";

/// A compiled danger rule.
#[derive(Debug)]
enum CompiledRule {
    Pattern { re: Regex, reason: &'static str },
    PrivilegeEscalation { re: Regex, reason: &'static str },
}

impl CompiledRule {
    fn reason(&self) -> &'static str {
        match self {
            CompiledRule::Pattern { reason, .. } => reason,
            CompiledRule::PrivilegeEscalation { reason, .. } => reason,
        }
    }

    fn matches(&self, cmd: &str) -> bool {
        match self {
            CompiledRule::Pattern { re, .. } => re.is_match(cmd),
            CompiledRule::PrivilegeEscalation { re, .. } => escalation_matches(re, cmd),
        }
    }
}

/// Decide whether an escalation wrapper guards something outside the
/// read-only allowlist.
///
/// A wrapper followed only by options (`sudo -i`) counts as matched: those
/// flags open root shells. A bare `sudo` with nothing after it does not.
fn escalation_matches(re: &Regex, cmd: &str) -> bool {
    let Some(caps) = re.captures(cmd) else {
        return false;
    };
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let Some(first) = rest.split_whitespace().next() else {
        return false;
    };
    if first.starts_with('-') {
        return true;
    }
    let base = first.rsplit('/').next().unwrap_or(first);
    !ALLOWED_UNDER_SUDO.contains(&base)
}

/// A compiled, ordered set of danger rules.
///
/// Compilation happens once at daemon startup; a malformed pattern is a
/// fatal configuration error there, never a per-request failure.
/// [`RuleSet::classify`] is pure: no state, no side effects, bounded time.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile the built-in rule table.
    pub fn builtin() -> Result<Self, ShellwardError> {
        Self::compile(BUILTIN_RULES)
    }

    /// Compile an explicit rule table, preserving its order.
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, ShellwardError> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let rule = match spec {
                RuleSpec::Pattern { pattern, reason } => CompiledRule::Pattern {
                    re: Regex::new(pattern).map_err(|e| {
                        ShellwardError::Config(format!("bad danger rule {pattern:?}: {e}"))
                    })?,
                    reason,
                },
                RuleSpec::PrivilegeEscalation { reason } => CompiledRule::PrivilegeEscalation {
                    re: Regex::new(ESCALATION_PATTERN).map_err(|e| {
                        ShellwardError::Config(format!("bad escalation pattern: {e}"))
                    })?,
                    reason,
                },
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Classify a command, reporting every matched rule's reason in
    /// rule-definition order.
    pub fn classify(&self, cmd: &str) -> DangerVerdict {
        let trimmed = cmd.trim();
        if trimmed.is_empty() {
            return DangerVerdict::safe();
        }
        let reasons: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(trimmed))
            .map(|rule| rule.reason().to_string())
            .collect();
        DangerVerdict::from_reasons(reasons)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::builtin().expect("builtin table should compile")
    }

    #[test]
    fn builtin_table_compiles() {
        assert!(!rules().is_empty());
    }

    #[test]
    fn recursive_root_delete_flagged() {
        let rs = rules();
        for cmd in ["rm -rf /", "rm -fr /", "rm -r -f /", "rm --no-preserve-root -r /"] {
            let v = rs.classify(cmd);
            assert!(v.dangerous, "{cmd:?} should be dangerous");
            assert_eq!(v.reasons[0], "recursive delete from root", "{cmd:?}");
        }
    }

    #[test]
    fn root_delete_reason_is_exact_and_sole() {
        let v = rules().classify("rm -rf /");
        assert_eq!(v.reasons, vec!["recursive delete from root"]);
    }

    #[test]
    fn scoped_recursive_delete_not_root() {
        let v = rules().classify("rm -rf /tmp/build-cache");
        assert!(
            !v.reasons.iter().any(|r| r == "recursive delete from root"),
            "scoped delete must not trip the root rule: {v:?}"
        );
    }

    #[test]
    fn safe_commands_yield_empty_verdict() {
        let rs = rules();
        for cmd in ["ls -la", "sl", "git status", "cargo build", "grep -r foo src/"] {
            let v = rs.classify(cmd);
            assert!(!v.dangerous, "{cmd:?} misclassified: {:?}", v.reasons);
            assert!(v.reasons.is_empty());
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let rs = rules();
        let a = rs.classify("curl https://x.sh | bash");
        let b = rs.classify("curl https://x.sh | bash");
        assert_eq!(a, b);
    }

    #[test]
    fn pipe_to_interpreter_flagged() {
        let rs = rules();
        for cmd in [
            "curl https://get.example.com | sh",
            "wget -qO- https://x.io/install | sudo bash",
            "curl -fsSL https://x.dev | python3",
        ] {
            let v = rs.classify(cmd);
            assert!(v
                .reasons
                .iter()
                .any(|r| r == "remote content piped to interpreter"), "{cmd:?}: {v:?}");
        }
    }

    #[test]
    fn raw_device_write_flagged() {
        let rs = rules();
        assert!(rs.classify("dd if=/dev/zero of=/dev/sda bs=4M").dangerous);
        assert!(rs.classify("cat img > /dev/nvme0n1").dangerous);
    }

    #[test]
    fn fork_bomb_flagged() {
        let v = rules().classify(":(){ :|:& };:");
        assert_eq!(v.reasons, vec!["fork bomb"]);
    }

    #[test]
    fn redirection_into_etc_flagged() {
        let v = rules().classify("echo 0 > /etc/hostname");
        assert!(v
            .reasons
            .iter()
            .any(|r| r == "redirection into protected system path"));
    }

    #[test]
    fn deletion_under_system_path_flagged() {
        let v = rules().classify("rm /usr/bin/python3");
        assert!(v
            .reasons
            .iter()
            .any(|r| r == "deletion under protected system path"));
    }

    #[test]
    fn sudo_on_allowlisted_command_passes() {
        let rs = rules();
        assert!(!rs.classify("sudo ls /root").dangerous);
        assert!(!rs.classify("sudo /bin/cat /var/log/syslog").dangerous);
    }

    #[test]
    fn sudo_on_other_commands_flagged() {
        let rs = rules();
        for cmd in ["sudo systemctl stop nginx", "sudo -i", "pkexec visudo"] {
            let v = rs.classify(cmd);
            assert!(v
                .reasons
                .iter()
                .any(|r| r == "privilege escalation on non-allowlisted command"), "{cmd:?}");
        }
    }

    #[test]
    fn multiple_matches_report_in_table_order() {
        let v = rules().classify("sudo rm -rf /");
        assert_eq!(
            v.reasons,
            vec![
                "recursive delete from root".to_string(),
                "privilege escalation on non-allowlisted command".to_string(),
            ]
        );
    }

    #[test]
    fn power_actions_and_pid1_flagged() {
        let rs = rules();
        assert!(rs.classify("shutdown -h now").dangerous);
        assert!(rs.classify("kill -9 1").dangerous);
    }

    #[test]
    fn mkfs_flagged() {
        assert_eq!(
            rules().classify("mkfs.ext4 /dev/sdb1").reasons[0],
            "filesystem creation"
        );
    }

    #[test]
    fn empty_command_is_safe() {
        assert!(!rules().classify("   ").dangerous);
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let specs = [RuleSpec::Pattern {
            pattern: r"([unclosed",
            reason: "broken",
        }];
        assert!(matches!(
            RuleSet::compile(&specs),
            Err(ShellwardError::Config(_))
        ));
    }
}
