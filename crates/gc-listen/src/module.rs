//! Module export
//!
//! Exposes [`gc_listen`] to script code as a single function value.

use gcl_runtime::{Env, HostResult, Value};

use crate::register::{RegisterError, gc_listen};

/// Name of the exported function
pub const EXPORT_NAME: &str = "gc_listen";

/// Create the module export: `gc_listen(object, callback)`.
///
/// Missing arguments read as `undefined`. Registration failures are thrown
/// as error objects of the matching kind.
pub fn init(env: &Env) -> HostResult<Value> {
    env.create_function(EXPORT_NAME, |env, info| {
        gc_listen(env, &info.arg(0), &info.arg(1))
            .map(|()| Value::Undefined)
            .map_err(|err| to_exception(env, &err))
    })
}

fn to_exception(env: &Env, err: &RegisterError) -> Value {
    let message = err.to_string();
    match env.create_error(err.kind(), &message) {
        Ok(exception) => exception,
        Err(cause) => {
            tracing::warn!(error = %cause, "could not create error object, throwing message");
            Value::string(&message)
        }
    }
}

#[cfg(test)]
mod tests {
    use gcl_runtime::{CallError, ErrorKind, ValueType};

    use super::*;

    #[test]
    fn test_export_is_named_function() {
        let env = Env::new();
        env.scoped(|env| {
            let export = init(env).unwrap();
            assert_eq!(env.type_of(&export), Ok(ValueType::Function));
            assert_eq!(env.describe(&export), "[Function gc_listen]");
        })
        .unwrap();
    }

    #[test]
    fn test_single_argument_throws_type_error() {
        let env = Env::new();
        env.scoped(|env| {
            let export = init(env).unwrap();
            let obj = env.create_object().unwrap();
            let Err(CallError::Exception(exception)) =
                env.call_function(&Value::Undefined, &export, &[obj])
            else {
                panic!("expected a TypeError");
            };
            assert_eq!(
                env.error_info(&exception),
                Some((
                    ErrorKind::TypeError,
                    "Garbage collection callback must be a function".to_string()
                ))
            );
        })
        .unwrap();
    }
}
