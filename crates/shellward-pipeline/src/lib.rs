//! The command-evaluation pipeline.
//!
//! Orchestrates the danger classifier, the session context store, and the
//! external collaborators (translator and fixer) into the per-request state
//! machine the daemon drives.
//!
//! - [`collaborator`]: the Translator/Fixer seam and errors.
//! - [`llm`]: an HTTP client implementing both collaborators against an
//!   OpenAI-compatible chat-completions endpoint.
//! - [`pipeline`]: the state machine itself.

pub mod collaborator;
pub mod llm;
pub mod pipeline;

pub use collaborator::{CollaboratorError, Disabled, Fixer, Translation, Translator};
pub use llm::ChatClient;
pub use pipeline::{Pipeline, PipelineConfig};
