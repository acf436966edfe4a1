//! The Shellward session daemon.
//!
//! Long-lived process accepting many concurrent short-lived connections on
//! a unix domain socket. Each connection carries exactly one request and
//! receives exactly one response. Connections for distinct sessions run
//! fully in parallel; connections for the same session are serialized by
//! the session's in-flight guard.

pub mod server;

pub use server::Daemon;
