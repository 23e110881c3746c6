//! Error handling for trackstream
//!
//! This module defines the crate-level error type and a Result alias used by
//! the streaming engines. Codec failures are wrapped from
//! [`CodecError`](crate::encoding::CodecError).

use crate::encoding::CodecError;
use thiserror::Error;

/// Main error type for streaming operations
#[derive(Error, Debug)]
pub enum StreamError {
    /// Encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Writing to or flushing the sink failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The row source failed mid-iteration
    #[error("Row cursor error: {0}")]
    Cursor(Box<dyn std::error::Error + Send + Sync>),

    /// A context blob was not valid JSON
    #[error("Invalid context JSON for metric '{key}': {source}")]
    Context {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSV rendering failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StreamError>,
    },
}

impl StreamError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StreamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an error raised by the row source
    pub fn cursor<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StreamError::Cursor(err.into())
    }

    /// Whether the client went away while we were writing
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            StreamError::Io(e) => Some(e),
            StreamError::Codec(CodecError::Io(e)) => Some(e),
            StreamError::WithContext { source, .. } => return source.is_disconnect(),
            _ => None,
        };
        io.is_some_and(|e| e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<StreamError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
