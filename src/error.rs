//! Error types for the mini-assembly crate.
//!
//! All failures are deterministic over immutable input.
//! A failed invocation is reproducible and must be fixed upstream; there is no retry logic.
//! Violated backend preconditions (see [`crate::marker_graph::MarkerGraph::merge`]) abort
//! through `assert!` instead of returning an error, as they indicate a bug rather than bad input.

use std::fmt;

//-----------------------------------------------------------------------------

/// Result type alias for mini-assembly operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for mini-assembly operations.
#[derive(Debug)]
pub enum Error {
    /// A stored alignment is corrupt: violated strict increase, out-of-range
    /// ordinals, marker-count mismatch, or an undecodable payload.
    DataIntegrity(String),

    /// The alignment store is missing, unpopulated, or has the wrong version.
    ResourceNotReady(String),

    /// A passed-through SQLite error.
    Database(String),

    /// An I/O error while reading inputs or writing reports.
    Io(String),

    /// A text input line that cannot be parsed.
    InvalidInput {
        /// Line number where the error occurred.
        line: usize,
        /// Error message.
        msg: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DataIntegrity(msg) => write!(f, "Data integrity error: {}", msg),
            Error::ResourceNotReady(msg) => write!(f, "Store not ready: {}", msg),
            Error::Database(msg) => write!(f, "Database error: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::InvalidInput { line, msg } => write!(f, "Invalid input at line {}: {}", line, msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

//-----------------------------------------------------------------------------
