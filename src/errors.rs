/*!
This module contains the error types used across SiltDB as well as `From` implementations for
common errors to enable error propagation.

The set of failure categories is closed. Every fallible operation in the crate funnels into
[`SiltDbError`] so that callers have a single taxonomy to match on.
*/

use std::fmt;
use std::io;

/// Alias for a [`Result`] that wraps a [`SiltDbError`].
pub type SiltDbResult<T> = Result<T, SiltDbError>;

/// The closed set of failures that SiltDB operations can surface.
#[derive(Debug)]
pub enum SiltDbError {
    /**
    Variant for lookups of keys that are not present.

    The optional message carries context for the miss, e.g. that the key was found but is
    shadowed by a tombstone.
    */
    NotFound(Option<String>),

    /**
    Variant for data that failed an integrity check.

    This covers CRC mismatches, impossible lengths, bad record types, truncated headers,
    invalid key trailers, and bad footer magic numbers.
    */
    Corruption(String),

    /// Variant for recognized but unhandled format features e.g. an unknown compression type.
    NotSupported(String),

    /// Variant for caller contract violations e.g. out-of-order adds into a table builder.
    InvalidArgument(String),

    /// Variant for errors propagated from environment operations.
    IO(io::Error),
}

/// Public methods
impl SiltDbError {
    /// Returns true if this error is a [`SiltDbError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, SiltDbError::NotFound(_))
    }

    /// Returns true if this error is a [`SiltDbError::Corruption`].
    pub fn is_corruption(&self) -> bool {
        matches!(self, SiltDbError::Corruption(_))
    }
}

impl std::error::Error for SiltDbError {}

impl fmt::Display for SiltDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiltDbError::NotFound(maybe_context) => match maybe_context {
                Some(context) => write!(f, "Entry not found. {}", context),
                None => write!(f, "Entry not found."),
            },
            SiltDbError::Corruption(reason) => write!(f, "Corruption: {}", reason),
            SiltDbError::NotSupported(reason) => write!(f, "Not supported: {}", reason),
            SiltDbError::InvalidArgument(reason) => write!(f, "Invalid argument: {}", reason),
            SiltDbError::IO(base_err) => write!(f, "{}", base_err),
        }
    }
}

impl From<io::Error> for SiltDbError {
    fn from(err: io::Error) -> Self {
        SiltDbError::IO(err)
    }
}
