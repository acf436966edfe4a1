//! The per-request evaluation state machine.
//!
//! One [`Pipeline::handle`] call runs while the daemon holds the session's
//! in-flight guard, so everything here may mutate the session freely. Every
//! collaborator call is bounded by the configured timeout, and every
//! failure path answers with a message rather than letting an unvalidated
//! candidate through.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use shellward_guard::RuleSet;
use shellward_session::{ApprovalOrigin, PendingApproval, SessionContext, SessionSnapshot};
use shellward_types::{CommandRequest, DaemonConfig, EventKind, PipelineResponse};

use crate::collaborator::{CollaboratorError, Fixer, Translation, Translator};

/// Pipeline tuning, extracted from the daemon configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub directive_prefix: String,
    pub replan_bound: u32,
    pub collaborator_timeout: Duration,
    pub snapshot_lines: usize,
}

impl From<&DaemonConfig> for PipelineConfig {
    fn from(cfg: &DaemonConfig) -> Self {
        Self {
            directive_prefix: cfg.directive_prefix.clone(),
            replan_bound: cfg.replan_bound,
            collaborator_timeout: cfg.collaborator_timeout(),
            snapshot_lines: cfg.snapshot_lines,
        }
    }
}

/// The command pipeline: classifier plus collaborators.
pub struct Pipeline {
    rules: RuleSet,
    translator: Arc<dyn Translator>,
    fixer: Arc<dyn Fixer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        rules: RuleSet,
        translator: Arc<dyn Translator>,
        fixer: Arc<dyn Fixer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            rules,
            translator,
            fixer,
            config,
        }
    }

    /// Evaluate one request against the session. The caller holds the
    /// session's in-flight guard for the duration of this call.
    pub async fn handle(
        &self,
        session: &mut SessionContext,
        request: CommandRequest,
    ) -> PipelineResponse {
        match request {
            CommandRequest::Preexec { cmd, cwd, .. } => {
                self.handle_preexec(session, cmd, cwd).await
            }
            CommandRequest::Postexec {
                cmd,
                exit_code,
                stderr_tail,
                intent,
                ..
            } => {
                self.handle_postexec(session, cmd, exit_code, stderr_tail, intent)
                    .await
            }
            CommandRequest::Feedback { feedback, .. } => {
                self.handle_feedback(session, feedback).await
            }
        }
    }

    async fn handle_preexec(
        &self,
        session: &mut SessionContext,
        cmd: String,
        cwd: Option<String>,
    ) -> PipelineResponse {
        if let Some(cwd) = cwd {
            session.set_cwd(cwd);
        }
        let cmd = cmd.trim().to_string();

        let response = if let Some(intent) = cmd.strip_prefix(&self.config.directive_prefix) {
            self.translate_intent(session, intent.trim()).await
        } else {
            let verdict = self.rules.classify(&cmd);
            if verdict.dangerous {
                info!(command = %cmd, reasons = ?verdict.reasons, "literal command flagged");
                session.set_pending(PendingApproval {
                    origin: ApprovalOrigin::Translate {
                        intent: format!("Find a safer way to do this: {cmd}"),
                    },
                    candidate: cmd.clone(),
                    explanation: String::new(),
                    attempts: 0,
                    last_feedback: None,
                });
            }
            PipelineResponse::proceed(cmd.as_str(), &verdict)
        };

        session.record(EventKind::Preexec, cmd, response.action_name());
        response
    }

    async fn translate_intent(
        &self,
        session: &mut SessionContext,
        intent: &str,
    ) -> PipelineResponse {
        if intent.is_empty() {
            return PipelineResponse::message("empty directive; nothing to translate");
        }
        let snapshot = session.snapshot(self.config.snapshot_lines);
        let translated = match self
            .bounded("translator", self.translator.translate(intent, &snapshot))
            .await
        {
            Ok(t) => t,
            Err(resp) => return resp,
        };

        match translated {
            None => PipelineResponse::message(
                "no runnable command produced; rephrase the request or run a command directly",
            ),
            Some(Translation {
                command,
                explanation,
            }) => {
                let verdict = self.rules.classify(&command);
                if verdict.dangerous {
                    session.set_pending(PendingApproval {
                        origin: ApprovalOrigin::Translate {
                            intent: intent.to_string(),
                        },
                        candidate: command.clone(),
                        explanation: explanation.clone(),
                        attempts: 0,
                        last_feedback: None,
                    });
                }
                PipelineResponse::replace(command, explanation, &verdict)
            }
        }
    }

    async fn handle_postexec(
        &self,
        session: &mut SessionContext,
        cmd: String,
        exit_code: i32,
        stderr_tail: String,
        intent: Option<String>,
    ) -> PipelineResponse {
        if exit_code == 0 {
            session.record(EventKind::Postexec, cmd, "none");
            return PipelineResponse::none();
        }
        debug!(command = %cmd, exit_code, "command failed, consulting fixer");

        let snapshot = session.snapshot(self.config.snapshot_lines);
        let suggestion = match self
            .bounded(
                "fixer",
                self.fixer
                    .suggest_fix(&cmd, &stderr_tail, intent.as_deref(), &snapshot),
            )
            .await
        {
            Ok(s) => s,
            Err(resp) => {
                session.record(EventKind::Postexec, cmd, resp.action_name());
                return resp;
            }
        };

        let response = match suggestion {
            None => PipelineResponse::none(),
            Some(Translation {
                command,
                explanation,
            }) => {
                let verdict = self.rules.classify(&command);
                if verdict.dangerous {
                    session.set_pending(PendingApproval {
                        origin: ApprovalOrigin::Fix {
                            command: cmd.clone(),
                            stderr_tail: stderr_tail.clone(),
                            intent: intent.clone(),
                        },
                        candidate: command.clone(),
                        explanation: explanation.clone(),
                        attempts: 0,
                        last_feedback: None,
                    });
                }
                PipelineResponse::suggest_fix(command, explanation, &verdict)
            }
        };

        session.record(EventKind::Postexec, cmd, response.action_name());
        response
    }

    async fn handle_feedback(
        &self,
        session: &mut SessionContext,
        feedback: String,
    ) -> PipelineResponse {
        let Some(pending) = session.take_pending() else {
            return PipelineResponse::message("no candidate is awaiting confirmation");
        };

        if pending.attempts >= self.config.replan_bound {
            warn!(
                session = %session.id(),
                attempts = pending.attempts,
                "replan limit reached"
            );
            session.record(EventKind::Feedback, feedback.as_str(), "message");
            return PipelineResponse::message(format!(
                "replan limit reached after {} attempts; adjust the command manually",
                pending.attempts
            ));
        }

        let snapshot = session.snapshot(self.config.snapshot_lines);
        let replanned = match self.replan(&pending, &feedback, &snapshot).await {
            Ok(r) => r,
            Err(resp) => {
                // Keep the pending candidate so the user can retry or give up.
                session.set_pending(pending);
                session.record(EventKind::Feedback, feedback.as_str(), resp.action_name());
                return resp;
            }
        };

        let response = match replanned {
            None => PipelineResponse::message(
                "no alternative command found; adjust the command manually",
            ),
            Some(Translation {
                command,
                explanation,
            }) => {
                let verdict = self.rules.classify(&command);
                let next = PendingApproval {
                    origin: pending.origin.clone(),
                    candidate: command.clone(),
                    explanation: explanation.clone(),
                    attempts: pending.attempts + 1,
                    last_feedback: Some(feedback.clone()),
                };
                let resp = match pending.origin {
                    ApprovalOrigin::Translate { .. } => {
                        PipelineResponse::replace(command, explanation, &verdict)
                    }
                    ApprovalOrigin::Fix { .. } => {
                        PipelineResponse::suggest_fix(command, explanation, &verdict)
                    }
                };
                // A still-dangerous candidate stays pending for another
                // round; a safe one needs no further negotiation.
                if verdict.dangerous {
                    session.set_pending(next);
                }
                resp
            }
        };

        session.record(EventKind::Feedback, feedback, response.action_name());
        response
    }

    /// Re-invoke the originating collaborator with the rejection feedback
    /// merged into the intent.
    async fn replan(
        &self,
        pending: &PendingApproval,
        feedback: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<Option<Translation>, PipelineResponse> {
        match &pending.origin {
            ApprovalOrigin::Translate { intent } => {
                let merged = format!(
                    "{intent}\n\nThe previous suggestion `{}` was rejected. \
                     Feedback: {feedback}\nPrefer a less destructive alternative.",
                    pending.candidate
                );
                self.bounded("translator", self.translator.translate(&merged, snapshot))
                    .await
            }
            ApprovalOrigin::Fix {
                command,
                stderr_tail,
                intent,
            } => {
                let merged = match intent {
                    Some(intent) => format!(
                        "{intent}\nThe previous fix `{}` was rejected. Feedback: {feedback}",
                        pending.candidate
                    ),
                    None => format!(
                        "The previous fix `{}` was rejected. Feedback: {feedback}",
                        pending.candidate
                    ),
                };
                self.bounded(
                    "fixer",
                    self.fixer
                        .suggest_fix(command, stderr_tail, Some(&merged), snapshot),
                )
                .await
            }
        }
    }

    /// Run a collaborator call under the configured timeout, downgrading
    /// errors and timeouts to a message response.
    async fn bounded<F>(&self, what: &str, fut: F) -> Result<Option<Translation>, PipelineResponse>
    where
        F: std::future::Future<Output = Result<Option<Translation>, CollaboratorError>>,
    {
        match tokio::time::timeout(self.config.collaborator_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(collaborator = what, error = %e, "collaborator call failed");
                Err(PipelineResponse::message(format!("{what} unavailable: {e}")))
            }
            Err(_) => {
                warn!(
                    collaborator = what,
                    timeout_secs = self.config.collaborator_timeout.as_secs(),
                    "collaborator call timed out"
                );
                Err(PipelineResponse::message(format!(
                    "{what} timed out after {}s; run the command manually or retry",
                    self.config.collaborator_timeout.as_secs()
                )))
            }
        }
    }
}
