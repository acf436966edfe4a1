//! Core types shared across all Shellward crates.
//!
//! Defines the wire protocol (requests and responses), danger verdicts,
//! daemon configuration, session identifiers, and error types used by the
//! classifier, session store, pipeline, and daemon.

pub mod config;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod verdict;

pub use config::DaemonConfig;
pub use error::ShellwardError;
pub use ids::SessionId;
pub use protocol::{CommandRequest, EventKind, PipelineResponse};
pub use verdict::DangerVerdict;
