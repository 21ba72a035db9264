//! # gc-listen
//!
//! Attach a callback to a managed object and have it called once the object
//! has been garbage collected.
//!
//! The collector only notifies a finalization hook, which arms a one-shot
//! idle task on the event loop. The callback runs from that task on a later
//! turn, in its own handle scope, never inside the collector. A callback that
//! throws is reported through the host's uncaught exception channel.
//!
//! ```ignore
//! let env = Env::new();
//! env.scoped(|env| {
//!     let obj = env.create_object()?;
//!     let callback = env.create_function("cb", |_, _| Ok(Value::Undefined))?;
//!     gc_listen(env, &obj, &callback)
//! })?;
//! env.collect_garbage()?;
//! env.run_event_loop()?;
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

mod deferred;
pub mod fatal;
mod hook;
pub mod module;
pub mod register;

pub use fatal::{FatalHook, OrAbort, clear_fatal_hook, fail_and_abort, set_fatal_hook};
pub use module::{EXPORT_NAME, init};
pub use register::{RegisterError, gc_listen};
