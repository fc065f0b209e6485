// ABOUTME: Error taxonomy for readiness checks
// ABOUTME: Separates usage, connection, and per-rule query failures

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a readiness run.
///
/// Only `Usage` and `EndpointsFile` stop the process. `Connection` is fatal
/// for a single cluster target, and `Query` is folded into a failed rule
/// result instead of being propagated.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// Bad or conflicting flags, or a missing credential pairing.
    #[error("{0}")]
    Usage(String),

    /// The endpoints file could not be read.
    #[error("Failed to read endpoints file {path}: {source}")]
    EndpointsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cluster target (or one of its databases) could not be reached.
    #[error("Could not connect to {target}: {message}")]
    Connection { target: String, message: String },

    /// A single rule's catalog query failed.
    #[error("Rule '{rule}' query failed: {message}")]
    Query { rule: String, message: String },
}

impl ReadinessError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
