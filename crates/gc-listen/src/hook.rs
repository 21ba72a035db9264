//! Finalization hook
//!
//! Runs in collector context. It only allocates the deferred task and arms
//! it on the event loop; the callback itself runs on a later turn.

use gcl_runtime::FinalizeContext;

use crate::deferred::DeferredTask;
use crate::fatal::OrAbort;
use crate::register::Registration;

pub(crate) fn on_object_finalized(ctx: &FinalizeContext<'_>, registration: Registration) {
    let event_loop = ctx.event_loop().or_abort("failed to get the event loop");
    let handle = event_loop
        .idle_init()
        .or_abort("failed to initialize idle handle");

    tracing::trace!(loop_id = %event_loop.id(), handle = %handle.id(), "deferring gc callback");

    let task = DeferredTask::new(ctx.env_handle(), registration.into_callback());
    handle.start(task).or_abort("failed to start idle handle");
}
