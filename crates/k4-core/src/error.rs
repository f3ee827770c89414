//! Typed error definitions for the K4 sink system.
//!
//! Provides [`K4Error`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

use crate::types::EventKind;

/// Domain-specific errors for the K4 sink system.
#[derive(Debug, Error)]
pub enum K4Error {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// A record is missing a required field or carries a value of the wrong type.
    #[error("malformed record: field `{field}` {reason}")]
    MalformedRecord { field: String, reason: String },

    /// BSON serialization of a record or payload failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// The batch queue was closed (writer gone or all senders dropped).
    #[error("queue closed")]
    QueueClosed,

    /// An event of one kind was offered to a sink of another kind.
    #[error("event kind mismatch: sink accepts {expected}, got {got}")]
    KindMismatch { expected: EventKind, got: EventKind },
}

impl K4Error {
    /// Shorthand for a [`K4Error::MalformedRecord`] caused by an absent field.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MalformedRecord {
            field: field.into(),
            reason: "is missing".into(),
        }
    }
}
