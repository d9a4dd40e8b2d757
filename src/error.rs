//! Error types for MftScope
//!
//! Every decoder in the crate reports failures through [`MftScopeError`].
//! Record-level failures can be detected with
//! [`MftScopeError::is_recoverable`] so that whole-MFT walks keep going past
//! individual damaged records.

use thiserror::Error;

/// Main error type for MftScope operations
#[derive(Error, Debug)]
pub enum MftScopeError {
    /// A caller-supplied value was unusable: out-of-range index, oversized
    /// requested length, buffer too small for the structure being decoded.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required precursor has not been read yet (e.g. asking for an
    /// attribute value before it was decoded).
    #[error("Missing value: {0}")]
    ValueMissing(&'static str),

    /// Initialisation would overwrite live state (e.g. a second
    /// `$STANDARD_INFORMATION` in one record, or re-decoding an attribute
    /// value that is already set).
    #[error("Value already set: {0}")]
    ValueAlreadySet(&'static str),

    /// An on-disk offset or size field exceeds its container, a VCN range is
    /// inverted, or a derived size exceeds the allocation guard.
    #[error("Value out of bounds: {0}")]
    ValueOutOfBounds(String),

    /// Signature mismatch, size outside the finite accepted set, or an
    /// attribute type a decoder does not handle.
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// A record-level decode failure tied to a specific MFT index.
    #[error("Invalid MFT record at index {0}: {1}")]
    InvalidRecord(u64, String),

    /// The volume source returned fewer bytes than the decoder needs.
    #[error("Short read at offset {offset}: requested {requested} bytes, got {got}")]
    ShortRead {
        offset: u64,
        requested: usize,
        got: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for MftScope operations
pub type Result<T> = std::result::Result<T, MftScopeError>;

impl MftScopeError {
    /// Check if this error is recoverable (a scan over many records can skip
    /// the damaged record and continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MftScopeError::InvalidRecord(_, _)
                | MftScopeError::ValueOutOfBounds(_)
                | MftScopeError::UnsupportedValue(_)
        )
    }
}
