//! Error types for the managed heap

use crate::object::ObjectId;
use thiserror::Error;

/// Errors reported by [`Heap`](crate::Heap) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GcError {
    /// The configured object limit is reached
    #[error("heap exhausted: object limit of {limit} reached")]
    HeapExhausted {
        /// Configured limit
        limit: usize,
    },

    /// The id refers to an object that has already been collected
    #[error("object {0} has been collected")]
    StaleObject(ObjectId),
}

/// Result alias for heap operations
pub type GcResult<T> = Result<T, GcError>;
