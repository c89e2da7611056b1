//! Error types for the exchange data model.

use thiserror::Error;

/// Errors raised while building, composing or reading exchange messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdmError {
    #[error("inconsistent {message_kind}: {reason}")]
    BuilderConsistency {
        message_kind: &'static str,
        reason: String,
    },
    #[error("slot collision: {0} already present")]
    SlotCollision(String),
    #[error("unclassifiable envelope: {0}")]
    Unclassifiable(String),
    #[error("unexpected slot {name} at {level} level")]
    UnexpectedSlot { level: &'static str, name: String },
    #[error("malformed slot {name}: {reason}")]
    MalformedSlot { name: String, reason: String },
    #[error("no registered exception kind for type {0}")]
    ExceptionTagLookupMiss(String),
    #[error("fragment conversion error: {0}")]
    Fragment(String),
}

impl EdmError {
    pub(crate) fn inconsistent(message_kind: &'static str, reason: impl Into<String>) -> Self {
        Self::BuilderConsistency {
            message_kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSlot {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from reading an envelope rather than building a message.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::Unclassifiable(_)
                | Self::UnexpectedSlot { .. }
                | Self::MalformedSlot { .. }
                | Self::ExceptionTagLookupMiss(_)
        )
    }
}

/// Convenience result type for exchange data model operations.
pub type EdmResult<T> = Result<T, EdmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_error_display() {
        let err = EdmError::inconsistent("request", "id is missing");
        assert_eq!(err.to_string(), "inconsistent request: id is missing");
        assert!(!err.is_read_failure());
    }

    #[test]
    fn read_failures_are_flagged() {
        assert!(EdmError::Unclassifiable("no query slot".into()).is_read_failure());
        assert!(EdmError::ExceptionTagLookupMiss("rs:Foo".into()).is_read_failure());
        assert!(!EdmError::SlotCollision("id".into()).is_read_failure());
    }
}
