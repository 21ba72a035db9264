//! Registration entry point

use gcl_runtime::{Env, ErrorKind, HostError, Reference, Value, ValueType};
use thiserror::Error;

use crate::hook;

/// Why a registration did not happen
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegisterError {
    /// The callback argument is not callable
    #[error("Garbage collection callback must be a function")]
    CallbackNotFunction {
        /// What was passed instead, if it could be determined
        actual: Option<ValueType>,
    },

    /// The durable callback reference could not be created
    #[error("failed to create callback reference")]
    Reference(#[source] HostError),

    /// The finalizer could not be attached to the object
    #[error("Failed to add finalizer to value")]
    Finalizer(#[source] HostError),
}

impl RegisterError {
    /// The error class reported to script code
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegisterError::CallbackNotFunction { .. } => ErrorKind::TypeError,
            RegisterError::Reference(_) | RegisterError::Finalizer(_) => ErrorKind::Error,
        }
    }
}

/// A callback waiting for its object to die.
///
/// Owned by the finalizer attached to the object, so the collector can hand
/// it to the finalization hook at most once.
#[derive(Debug)]
pub(crate) struct Registration {
    callback: Reference,
}

impl Registration {
    pub(crate) fn into_callback(self) -> Reference {
        self.callback
    }
}

/// Call `callback` once `object` has been collected.
///
/// The callback runs with no arguments and an `undefined` receiver, on an
/// event loop turn after the collection that finalized `object`. Anything it
/// throws is reported as an uncaught exception.
pub fn gc_listen(env: &Env, object: &Value, callback: &Value) -> Result<(), RegisterError> {
    let actual = env.type_of(callback).ok();
    if actual != Some(ValueType::Function) {
        return Err(RegisterError::CallbackNotFunction { actual });
    }

    let callback = env
        .create_reference(callback, 1)
        .map_err(RegisterError::Reference)?;
    let registration = Registration { callback };

    // On failure the closure is dropped, and the reference with it.
    env.add_finalizer(object, move |ctx| {
        hook::on_object_finalized(ctx, registration)
    })
    .map_err(RegisterError::Finalizer)?;

    tracing::trace!(object = %env.describe(object), "gc listener registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_callable() {
        let env = Env::new();
        env.scoped(|env| {
            let obj = env.create_object().unwrap();
            assert_eq!(
                gc_listen(env, &obj, &Value::Number(1.0)),
                Err(RegisterError::CallbackNotFunction {
                    actual: Some(ValueType::Number)
                })
            );
            assert_eq!(
                gc_listen(env, &obj, &obj).unwrap_err().kind(),
                ErrorKind::TypeError
            );
        })
        .unwrap();
        assert_eq!(env.live_references(), 0);
        assert_eq!(env.pending_finalizers(), 0);
    }

    #[test]
    fn test_finalizer_failure_releases_reference() {
        let env = Env::new();
        env.scoped(|env| {
            let callback = env.create_function("cb", |_, _| Ok(Value::Undefined)).unwrap();
            let err = gc_listen(env, &Value::string("not an object"), &callback).unwrap_err();
            assert_eq!(
                err,
                RegisterError::Finalizer(HostError::ObjectExpected(ValueType::String))
            );
            assert_eq!(err.kind(), ErrorKind::Error);
            assert_eq!(err.to_string(), "Failed to add finalizer to value");
        })
        .unwrap();
        assert_eq!(env.live_references(), 0);
    }
}
