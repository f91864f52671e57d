//! # rdtab-client — session lifecycle host
//!
//! The UI-collaborator stand-in: loads a TOML connection profile,
//! builds a `SessionConfig`, runs a `SessionController` against a
//! pluggable engine, and drains lifecycle events to the log. Ships a
//! simulated engine so the whole lifecycle (connect, retry, kicked,
//! resolution rebuild) can be exercised without a display-protocol
//! stack.

pub mod config;
pub mod sim;
