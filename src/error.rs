//! Error types for `journal-forensics`.
//!
//! Only genuinely operational failures are errors: an unreachable object
//! store, an unresolvable pool, a failed write during a restore. Journal
//! *damage* (missing objects, bad framing, corrupt headers) is never an
//! error from the scanner; it is recorded on the scan result instead.

/// Result type for journal forensic operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors returned by the `journal-forensics` crate.
#[derive(thiserror::Error, Debug)]
pub enum JournalError {
    /// I/O error (dump files, fs-backed object store).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The object-store client could not be reached.
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    /// The pool id named in the MDS map does not exist in the store.
    #[error("pool {0} not found")]
    PoolNotFound(i64),

    /// An object the operation needed is absent.
    #[error("object not found: {0}")]
    ObjectMissing(String),

    /// Format error (corrupt, unexpected, unsupported).
    #[error("format error: {0}")]
    Format(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// The dump-file preamble could not be parsed.
    #[error("malformed dump file: {0}")]
    DumpFormat(String),

    /// Invalid configuration or use of an unbound component.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lock acquisition failed (poisoned lock in a store backend).
    #[error("lock failed on {resource}: {reason}")]
    LockFailed {
        /// What we were trying to lock.
        resource: String,
        /// Human-readable reason.
        reason: String,
    },
}
