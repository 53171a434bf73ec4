//! Agent Protocol
//!
//! Wire types for backend responses, the [`Interpreter`] that turns them into
//! surface mutations, and the [`resolve_pointer`] helper widgets use to bind
//! fields to their data model.

mod error;
mod interpreter;
mod pointer;
mod types;

pub use error::ProtocolError;
pub use interpreter::{BatchOutcome, InterpretResult, Interpreter};
pub use pointer::resolve_pointer;
pub use types::{
    BackendResponse, Component, CreateSurface, DeleteSurface, DeleteTarget, LegacyPayload,
    OperationKind, ResponseFormat, SubOperation, UpdateComponents, UpdateDataModel,
    WILDCARD_CONTEXT, WILDCARD_OVERLAY,
};
