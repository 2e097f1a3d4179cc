//! Error types for the loginpolicy core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Policy source errors
// ---------------------------------------------------------------------------

/// Errors from opening or reading the login policy file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The policy file could not be opened.
    #[error("policy file '{path}' is unavailable: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading or seeking inside an open policy file failed.
    #[error("policy read error: {0}")]
    Read(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Record errors
// ---------------------------------------------------------------------------

/// Reasons a policy line is rejected.
///
/// These never reach callers of the directory; the reader logs them and moves
/// on to the next line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The line has fewer than the six mandatory fields.
    #[error("expected at least 6 fields, found {0}")]
    TooFewFields(usize),

    /// A mandatory string field is empty.
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// An id field is not a number.
    #[error("field '{field}' is not a valid id: '{value}'")]
    InvalidId { field: &'static str, value: String },

    /// An id field is at or below the reserved range.
    #[error("field '{field}' must be greater than {min}, got {value}")]
    IdOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
    },

    /// A login name cannot be used as a single path component.
    #[error("login name '{0}' must not contain '/' or be '.' or '..'")]
    InvalidName(String),

    /// The superuser flag is not one of `1`, `Y`, `0`, `N`.
    #[error("unrecognized superuser flag '{0}'")]
    InvalidFlag(String),

    /// The line is not valid UTF-8 or contains a NUL byte.
    #[error("line is not valid UTF-8 text")]
    InvalidEncoding,
}

// ---------------------------------------------------------------------------
// Packing errors
// ---------------------------------------------------------------------------

/// Errors from serializing a record into a caller buffer.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PackError {
    /// The buffer is too small. Nothing was written to it.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    InsufficientCapacity { needed: usize, available: usize },
}

// ---------------------------------------------------------------------------
// Lookup errors
// ---------------------------------------------------------------------------

/// Caller-visible failure of a directory operation.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No entry matches the key, or the enumeration is exhausted.
    #[error("entry not found")]
    NotFound,

    /// The backing source could not be opened or read.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The caller must retry the same call with a larger buffer.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    InsufficientCapacity { needed: usize, available: usize },
}

impl From<SourceError> for LookupError {
    fn from(err: SourceError) -> Self {
        LookupError::Unavailable(err.to_string())
    }
}

impl From<PackError> for LookupError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::InsufficientCapacity { needed, available } => {
                LookupError::InsufficientCapacity { needed, available }
            }
        }
    }
}
