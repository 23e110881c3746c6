//! Codec-specific error types.

use thiserror::Error;

/// Errors raised while encoding or decoding the binary tree stream.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An empty map key would be indistinguishable from an index marker.
    #[error("Empty name in path at depth {depth}")]
    EmptyPathName { depth: usize },

    #[error("Unsupported value: {0}")]
    UnsupportedValue(&'static str),

    #[error("Unsupported type tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("Unsupported int length {0}")]
    InvalidIntWidth(usize),

    #[error("Unsupported float length {0}")]
    InvalidFloatWidth(usize),

    #[error("Unsupported bool length {0}")]
    InvalidBoolLength(usize),

    #[error("String value is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    #[error("Numeric block length {0} is not a multiple of 8")]
    InvalidBlockLength(usize),

    #[error("Value field is empty")]
    EmptyValue,

    #[error("Malformed path at byte {offset}: {message}")]
    MalformedPath { offset: usize, message: &'static str },
}

impl CodecError {
    /// Whether this error was raised by the encoder (a caller defect).
    pub fn is_encode_error(&self) -> bool {
        matches!(
            self,
            CodecError::EmptyPathName { .. } | CodecError::UnsupportedValue(_)
        )
    }

    /// Whether this error was raised by malformed input to the decoder.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            CodecError::UnknownTag(_)
                | CodecError::InvalidIntWidth(_)
                | CodecError::InvalidFloatWidth(_)
                | CodecError::InvalidBoolLength(_)
                | CodecError::InvalidUtf8(_)
                | CodecError::InvalidBlockLength(_)
                | CodecError::EmptyValue
                | CodecError::MalformedPath { .. }
        )
    }

    /// Whether the stream ended in the middle of a frame.
    pub fn is_truncation(&self) -> bool {
        matches!(self, CodecError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
