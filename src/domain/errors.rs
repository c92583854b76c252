//! Error taxonomy for the sync engine.
//!
//! Gateway errors separate client-side rejections (never retried) from
//! transient remote failures (retried, then deferred). Pass-level errors
//! distinguish the one condition that aborts a whole pass (authorization)
//! from conditions isolated to a single transaction.

use thiserror::Error;

use crate::domain::entities::transaction::{SourceKey, TransactionKind};

/// Failures surfaced by the remote gateway after its retry budget and
/// classification have been applied.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Remote rejected our credentials. Fatal for the whole pass: every
    /// subsequent call would fail identically.
    #[error("remote ledger rejected credentials (status {status}): {context}")]
    Unauthorized { status: u16, context: String },

    /// Remote rejected the request itself. Fatal for that one operation only.
    #[error("remote ledger rejected request (status {status}): {body}")]
    BadRequest { status: u16, body: String },

    /// Still failing after the full retry budget. The operation is deferred
    /// to the next scheduled pass.
    #[error("remote call failed after {attempts} attempts: {last_error}")]
    Transient { attempts: u32, last_error: String },
}

impl GatewayError {
    /// True for failures the next pass is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient { .. })
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, GatewayError::Unauthorized { .. })
    }
}

/// Pass-level failures of the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authorization failure, aborting pass: {0}")]
    Authorization(GatewayError),

    #[error("no remote mutation exists for kind {kind} (source key {source_key})")]
    UnsupportedKind {
        kind: TransactionKind,
        source_key: SourceKey,
    },
}

/// Failures while loading canonical transactions from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read transaction source {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("transaction source {path} is not valid: {reason}")]
    Malformed { path: String, reason: String },
}

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVariable(&'static str),

    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        variable: &'static str,
        reason: String,
    },
}
