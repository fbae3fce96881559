//! Error types for spool operations.

use std::io;

use thiserror::Error;

use crate::types::{InvalidMessageId, MessageId};

/// Failures of the on-disk spool.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A metadata record could not be encoded.
    #[error("failed to encode metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A metadata record exists but does not decode.
    #[error("metadata for {id} is corrupt: {source}")]
    Corrupt {
        id: MessageId,
        #[source]
        source: serde_json::Error,
    },

    /// No such message in the spool.
    #[error("message not found: {0}")]
    NotFound(MessageId),

    /// An id failed filename validation.
    #[error(transparent)]
    InvalidId(#[from] InvalidMessageId),

    /// The spool directory failed validation.
    #[error("spool validation error: {0}")]
    Validation(String),
}

/// Specialized `Result` type for spool operations.
pub type Result<T> = std::result::Result<T, SpoolError>;
