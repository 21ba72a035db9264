//! Error types for gcl-runtime

use gcl_gc::GcError;
use thiserror::Error;

use crate::event_loop::HandleId;
use crate::value::{Value, ValueType};

/// Errors reported by the event loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// The loop owning the handle has been dropped
    #[error("event loop has been closed")]
    LoopClosed,

    /// The configured handle limit is reached
    #[error("event loop handle limit of {limit} reached")]
    HandleLimit {
        /// Configured limit
        limit: usize,
    },

    /// The handle is not registered with the loop anymore
    #[error("unknown event loop handle {0}")]
    UnknownHandle(HandleId),
}

/// Errors reported by host environment operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// A value would be created with no handle scope to root it
    #[error("no open handle scope")]
    NoHandleScope,

    /// Handle scopes must be closed innermost first
    #[error("handle scope mismatch: innermost scope is {expected}, tried to close {actual}")]
    ScopeMismatch {
        /// Depth of the innermost open scope
        expected: usize,
        /// Depth of the scope passed in
        actual: usize,
    },

    /// The operation is not allowed while finalizers run
    #[error("{operation} is not allowed from collector context")]
    InCollector {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// An object (or function) value was required
    #[error("object expected, got {0}")]
    ObjectExpected(ValueType),

    /// A function value was required
    #[error("function expected, got {0}")]
    FunctionExpected(ValueType),

    /// The reference belongs to another environment or was already released
    #[error("reference is not owned by this environment")]
    ForeignReference,

    /// The environment behind a weak handle has been dropped
    #[error("environment has been torn down")]
    EnvClosed,

    /// Heap error
    #[error(transparent)]
    Gc(#[from] GcError),

    /// Event loop error
    #[error(transparent)]
    Loop(#[from] LoopError),
}

/// Outcome of a failed function call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// The callee threw; the thrown value is carried unchanged
    #[error("function threw an exception")]
    Exception(Value),

    /// The call could not be made at all
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;
