//! Deferred task
//!
//! One-shot idle task that calls the user callback outside the collector.
//! It owns its idle handle (handed back by the loop) and the durable callback
//! reference, and releases both while it runs. Being consumed by
//! [`IdleTask::run`], it cannot run twice.

use gcl_runtime::{CallError, IdleHandle, IdleTask, Reference, Value, WeakEnv};

use crate::fatal::{OrAbort, fail_and_abort};

pub(crate) struct DeferredTask {
    env: WeakEnv,
    callback: Reference,
}

impl DeferredTask {
    pub(crate) fn new(env: WeakEnv, callback: Reference) -> Self {
        Self { env, callback }
    }
}

impl IdleTask for DeferredTask {
    fn run(self: Box<Self>, mut handle: IdleHandle) {
        let DeferredTask { env, callback } = *self;

        handle.stop().or_abort("failed to stop idle handle");
        let handle_id = handle.id();
        handle.close();

        let env = match env.try_upgrade() {
            Ok(env) => env,
            Err(err) => {
                tracing::debug!(handle = %handle_id, error = %err, "dropping gc callback");
                return;
            }
        };

        let scope = env
            .open_handle_scope()
            .or_abort("failed to open handle scope");

        let function = env
            .reference_value(&callback)
            .or_abort("failed to resolve callback reference")
            .or_abort("failed to resolve callback reference");
        env.delete_reference(callback)
            .or_abort("failed to delete callback reference");

        tracing::trace!(handle = %handle_id, "running gc callback");
        match env.call_function(&Value::Undefined, &function, &[]) {
            Ok(_) => {}
            Err(CallError::Exception(exception)) => {
                tracing::debug!(exception = %env.describe(&exception), "gc callback threw");
                env.trigger_uncaught_exception(exception)
                    .or_abort("failed to report uncaught exception");
            }
            Err(CallError::Host(err)) => {
                tracing::error!(error = %err, "gc callback could not be called");
                fail_and_abort("failed to call gc callback");
            }
        }

        env.close_handle_scope(scope)
            .or_abort("failed to close handle scope");
    }
}
