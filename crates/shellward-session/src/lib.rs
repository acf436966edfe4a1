//! Per-session state for the Shellward daemon.
//!
//! A session is one continuous shell instance. Its context (bounded history
//! ring, working directory, pending approval state) lives in memory for the
//! daemon's lifetime; nothing is persisted across restarts.
//!
//! - [`store`]: the session context itself.
//! - [`registry`]: id-to-session map plus the per-session in-flight guard.

pub mod registry;
pub mod store;

pub use registry::{SessionHandle, SessionRegistry};
pub use store::{
    ApprovalOrigin, InteractionRecord, PendingApproval, SessionContext, SessionSnapshot,
};
