//! Protocol errors
//!
//! These never escape [`Interpreter::interpret`](super::Interpreter::interpret).
//! They are collected per failed sub-operation and rendered into
//! [`InterpretResult::errors`](super::InterpretResult::errors).

use thiserror::Error;

use super::OperationKind;

/// A malformed or unusable protocol instruction
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The response (or an operation entry) was not valid protocol JSON
    #[error("Malformed protocol message: {0}")]
    Decode(String),

    /// A sub-message is present but its fields do not decode
    #[error("Invalid {kind} at operation {index}: {reason}")]
    InvalidSubMessage {
        /// Which sub-message failed
        kind: OperationKind,
        /// Position of the operation in the batch
        index: usize,
        /// Decoder message
        reason: String,
    },

    /// An update targets a surface the store does not hold
    #[error("{kind} at operation {index} targets unknown surface {surface_id:?}")]
    UnknownSurface {
        /// Which sub-message failed
        kind: OperationKind,
        /// Position of the operation in the batch
        index: usize,
        /// The dangling id
        surface_id: String,
    },

    /// `updateComponents` carried no components to recompose to
    #[error("updateComponents at operation {index} has an empty components list")]
    EmptyComponents {
        /// Position of the operation in the batch
        index: usize,
    },

    /// An operation object carried none of the known sub-messages
    #[error("Operation {index} carries no recognised sub-message")]
    EmptyOperation {
        /// Position of the operation in the batch
        index: usize,
    },

    /// A sub-message named an empty surface id
    #[error("{kind} at operation {index} has an empty surfaceId")]
    EmptySurfaceId {
        /// Which sub-message failed
        kind: OperationKind,
        /// Position of the operation in the batch
        index: usize,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_operation() {
        let err = ProtocolError::UnknownSurface {
            kind: OperationKind::UpdateDataModel,
            index: 1,
            surface_id: "ghost".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "updateDataModel at operation 1 targets unknown surface \"ghost\""
        );

        let err = ProtocolError::EmptyOperation { index: 3 };
        assert_eq!(err.to_string(), "Operation 3 carries no recognised sub-message");
    }
}
