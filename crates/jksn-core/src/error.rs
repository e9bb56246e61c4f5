//! Error types for JKSN encoding, decoding and value access.

use thiserror::Error;

/// Errors that can occur during JKSN encoding, decoding or value access.
#[derive(Error, Debug)]
pub enum JksnError {
    /// The value tree cannot be represented on the wire.
    #[error("JKSN encode error: {0}")]
    Encode(String),

    /// The byte stream is malformed. `offset` is the position of the byte
    /// (relative to the start of the input) where the problem was detected.
    #[error("JKSN decode error at offset {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    /// The checksum trailer or an in-stream checksum frame does not match
    /// the received bytes. Digests are rendered as lowercase hex.
    /// Reported as a decode error by [`JksnError::is_decode_error`].
    #[error("JKSN {algorithm} checksum mismatch: stream says {expected}, content hashes to {actual}")]
    Checksum {
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    /// An accessor, index or conversion was applied to an incompatible value.
    #[error("JKSN type error: {0}")]
    Type(String),

    /// The JSON bridge received text that is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing to an output sink or reading an input source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JksnError {
    pub(crate) fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        JksnError::Decode { offset, kind }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        JksnError::Type(message.into())
    }

    /// True for malformed input, including checksum failures.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, JksnError::Decode { .. } | JksnError::Checksum { .. })
    }

    pub fn is_checksum_error(&self) -> bool {
        matches!(self, JksnError::Checksum { .. })
    }

    pub fn is_type_error(&self) -> bool {
        matches!(self, JksnError::Type(_))
    }

    /// The decode failure kind, if this is a structural decode error.
    pub fn decode_kind(&self) -> Option<&DecodeErrorKind> {
        match self {
            JksnError::Decode { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// What went wrong while walking a JKSN byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("invalid control byte 0x{0:02x}")]
    InvalidTag(u8),

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("string payload is not valid UTF-16")]
    InvalidUtf16,

    #[error("missing 'jk!' header")]
    MissingHeader,

    #[error("back-reference to empty cache slot {0}")]
    EmptySlot(u8),

    #[error("back-reference to cache slot {slot} expects a {expected} but the slot holds a {found}")]
    SlotKindMismatch {
        slot: u8,
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,

    #[error("delta-encoded integer without a preceding integer")]
    DeltaWithoutBase,

    #[error("duplicate object key")]
    DuplicateKey,

    #[error("row/column swapped array column is not an array")]
    SwappedColumnNotArray,

    #[error("embedded JSON literal: {0}")]
    JsonLiteral(String),

    #[error("{0} trailing bytes after the root value")]
    TrailingBytes(usize),

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("input of {size} bytes exceeds the {max} byte limit")]
    InputTooLarge { size: usize, max: usize },

    #[error("row/column swapped arrays expand to more than {0} cells")]
    TooManySwappedCells(usize),
}

/// Convenience alias used throughout jksn-core.
pub type Result<T> = std::result::Result<T, JksnError>;
