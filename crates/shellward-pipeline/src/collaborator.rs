//! The collaborator seam: translation and fixing as opaque services.
//!
//! The pipeline consumes both through traits so tests can substitute fakes
//! and deployments can swap providers. Collaborator failures never leak a
//! candidate command: the pipeline downgrades them to a message response.

use async_trait::async_trait;
use thiserror::Error;

use shellward_session::SessionSnapshot;

/// Errors from collaborator calls.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("malformed collaborator reply: {0}")]
    Malformed(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// A candidate command with its human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub command: String,
    pub explanation: String,
}

/// Turns a natural-language intent into a shell command.
///
/// `Ok(None)` means "no usable command": the collaborator answered but had
/// nothing runnable to offer (the explanation path of the underlying model).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        intent: &str,
        ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError>;
}

/// Proposes a corrected command for one that just failed.
#[async_trait]
pub trait Fixer: Send + Sync {
    async fn suggest_fix(
        &self,
        command: &str,
        stderr_tail: &str,
        intent: Option<&str>,
        ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError>;
}

/// Collaborator stub used when no provider is configured. Every call
/// reports `NotConfigured`, which the pipeline surfaces as a message.
pub struct Disabled;

#[async_trait]
impl Translator for Disabled {
    async fn translate(
        &self,
        _intent: &str,
        _ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("translator"))
    }
}

#[async_trait]
impl Fixer for Disabled {
    async fn suggest_fix(
        &self,
        _command: &str,
        _stderr_tail: &str,
        _intent: Option<&str>,
        _ctx: &SessionSnapshot,
    ) -> Result<Option<Translation>, CollaboratorError> {
        Err(CollaboratorError::NotConfigured("fixer"))
    }
}
