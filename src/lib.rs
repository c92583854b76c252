//! foliosync
//!
//! Sidecar that keeps a remote portfolio ledger synchronized with canonical
//! transactions parsed from broker and exchange export files.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod task_runner;
