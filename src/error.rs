//! Error types for ignis.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("flush timed out with {pending} record(s) still pending")]
    FlushTimeout { pending: u64 },

    #[error("logger is closed")]
    Closed,

    #[error("sink write failed: {message}")]
    Sink { message: String },

    #[error("encode failed: {message}")]
    Encode { message: String },

    #[error("unsupported wire format version: {version}")]
    UnsupportedVersion { version: u8 },

    #[error("malformed binary record: {reason}")]
    MalformedRecord { reason: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn flush_timeout(pending: u64) -> Self {
        Self::FlushTimeout { pending }
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink { message: message.into() }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode { message: message.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord { reason: reason.into() }
    }
}
