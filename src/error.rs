//! Error types for taskwire.

use std::sync::Arc;

use thiserror::Error;

/// Error shared between every waiter of a pause handle.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all taskwire operations.
#[derive(Debug, Error)]
pub enum TaskwireError {
    /// I/O error on a caller-supplied reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error (extension payloads).
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (extension payloads).
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// A slot value has no codec and the extension hook declined it.
    #[error("unsupported value kind `{kind}` in slot `{slot}` of {target}")]
    UnsupportedValueKind {
        target: String,
        slot: String,
        kind: String,
    },

    /// A slot matched none of the classification rules.
    #[error("unclassifiable slot `{slot}` in {target}: {reason}")]
    UnclassifiableSlot {
        target: String,
        slot: String,
        reason: String,
    },

    /// The stream was written under a different endianness convention.
    #[error("incompatible encoding: expected endianness byte {expected}, found {found}")]
    IncompatibleEncoding { expected: u8, found: u8 },

    /// Tag or shape mismatch while decoding.
    #[error("malformed stream at byte {offset} ({context}): {reason}")]
    MalformedStream {
        offset: usize,
        context: String,
        reason: String,
    },

    /// Nested frames exceeded the configured depth.
    #[error("frame chain deeper than {limit} levels")]
    ChainTooDeep { limit: usize },

    /// A pause handle was signalled more than once.
    #[error("pause handle already completed")]
    AlreadyCompleted,

    /// One or more completion callbacks failed.
    #[error("{} completion callback(s) failed", .0.len())]
    AggregateCallbackFailure(Vec<SharedError>),

    /// The awaited pause handle was completed with a failure.
    #[error("computation faulted: {0}")]
    Faulted(SharedError),
}

impl TaskwireError {
    /// Build a `MalformedStream` error.
    pub fn malformed(offset: usize, context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Build an `UnclassifiableSlot` error.
    pub fn unclassifiable(
        target: impl ToString,
        slot: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnclassifiableSlot {
            target: target.to_string(),
            slot: slot.into(),
            reason: reason.into(),
        }
    }

    /// Replace the context of a `MalformedStream` error; other errors pass through.
    pub fn in_context(self, context: impl FnOnce() -> String) -> Self {
        match self {
            Self::MalformedStream { offset, reason, .. } => Self::MalformedStream {
                offset,
                context: context(),
                reason,
            },
            other => other,
        }
    }

    /// Attach the frame target and slot name to a value-level error.
    pub fn for_slot(self, target: &impl std::fmt::Display, slot: &str) -> Self {
        match self {
            Self::UnsupportedValueKind { kind, .. } => Self::UnsupportedValueKind {
                target: target.to_string(),
                slot: slot.to_owned(),
                kind,
            },
            Self::MalformedStream { offset, reason, .. } => Self::MalformedStream {
                offset,
                context: format!("{} slot `{}`", target, slot),
                reason,
            },
            other => other,
        }
    }

    /// Byte offset for stream errors, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::MalformedStream { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Result type alias using TaskwireError.
pub type Result<T> = std::result::Result<T, TaskwireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_carries_offset_and_context() {
        let err = TaskwireError::malformed(17, "demo::Job::run slot `x`", "expected Value tag");
        assert_eq!(err.offset(), Some(17));
        let msg = err.to_string();
        assert!(msg.contains("byte 17"));
        assert!(msg.contains("slot `x`"));
    }

    #[test]
    fn test_aggregate_counts_failures() {
        let a: SharedError = Arc::new(std::io::Error::new(std::io::ErrorKind::Other, "a"));
        let b: SharedError = Arc::new(std::io::Error::new(std::io::ErrorKind::Other, "b"));
        let err = TaskwireError::AggregateCallbackFailure(vec![a, b]);
        assert_eq!(err.to_string(), "2 completion callback(s) failed");
        assert_eq!(err.offset(), None);
    }
}
