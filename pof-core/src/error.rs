//! Error types for POF encoding and decoding.

use thiserror::Error;

/// Outcome of a failed type registry lookup.
///
/// Registries report one of three distinct outcomes, and the codec hands each
/// one back to the caller unchanged inside [`PofError::UnknownType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeLookupError {
    /// The type id is negative or otherwise not a valid user type id.
    #[error("invalid user type id {0}")]
    InvalidTypeId(i32),

    /// Nothing was ever registered for the type.
    #[error("type {0} is not registered")]
    NotRegistered(String),

    /// The registration exists but is outdated; the caller should retry once.
    #[error("registration for type {0} is stale, retry once")]
    Stale(String),
}

impl TypeLookupError {
    /// Returns true if a single retry of the whole call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Corrupt or truncated encoding.
    DecodeMalformed,
    /// A property index moved backward.
    OutOfOrderIndex,
    /// Operation not permitted in the current stream or structure state.
    InvalidState,
    /// A type id or native type could not be resolved.
    UnknownType,
    /// A wire shape that is refused rather than mis-encoded.
    UnsupportedShape,
}

/// The main error type for POF operations.
#[derive(Debug, Error)]
pub enum PofError {
    /// The stream ended before the value was complete.
    #[error("truncated stream: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required by the pending read.
        needed: usize,
        /// Bytes left in the stream.
        available: usize,
    },

    /// A packed integer did not terminate within its width or overflowed it.
    #[error("malformed packed integer: does not fit in {bits} bits")]
    MalformedVarint {
        /// Width of the integer being decoded.
        bits: u32,
    },

    /// A decimal significand or scale exceeds the native decimal range.
    #[error("decimal overflow: {0}")]
    DecimalOverflow(String),

    /// Any other corrupt encoding.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// A decoded value could not be converted to the requested type.
    #[error("cannot convert {found} to {expected}")]
    Conversion {
        /// Requested type.
        expected: &'static str,
        /// Shape actually decoded.
        found: &'static str,
    },

    /// A property index lower than or equal to the structure's cursor.
    #[error("property index {index} is not after the previous index {previous}")]
    OutOfOrderIndex {
        /// Requested index.
        index: i32,
        /// Last index read or written in the structure.
        previous: i32,
    },

    /// Operation not permitted in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Nesting exceeded the configured limit.
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthExceeded {
        /// Configured maximum depth.
        limit: usize,
    },

    /// The underlying stream was closed.
    #[error("stream is closed")]
    Closed,

    /// The type registry could not resolve a type.
    #[error("unknown type: {0}")]
    UnknownType(#[from] TypeLookupError),

    /// A wire shape or value combination that is explicitly refused.
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),
}

impl PofError {
    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Truncated { .. }
            | Self::MalformedVarint { .. }
            | Self::DecimalOverflow(_)
            | Self::Malformed(_)
            | Self::Conversion { .. } => ErrorCategory::DecodeMalformed,
            Self::OutOfOrderIndex { .. } => ErrorCategory::OutOfOrderIndex,
            Self::InvalidState(_) | Self::DepthExceeded { .. } | Self::Closed => {
                ErrorCategory::InvalidState
            }
            Self::UnknownType(_) => ErrorCategory::UnknownType,
            Self::UnsupportedShape(_) => ErrorCategory::UnsupportedShape,
        }
    }

    /// Returns the registry outcome if this is an unknown-type error.
    pub fn lookup_error(&self) -> Option<&TypeLookupError> {
        match self {
            Self::UnknownType(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized `Result` type for POF operations.
pub type Result<T> = std::result::Result<T, PofError>;
