//! Error types shared across all Shellward crates.

/// Errors that can occur across the Shellward runtime.
///
/// Each variant corresponds to a different subsystem: wire protocol
/// decoding, external collaborators, session contention, configuration,
/// or the socket listener itself.
#[derive(Debug, thiserror::Error)]
pub enum ShellwardError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("collaborator timed out after {0}s")]
    Timeout(u64),

    #[error("session is busy evaluating another command")]
    SessionBusy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
