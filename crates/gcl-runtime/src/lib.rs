//! # gcl-runtime
//!
//! Single-threaded host environment used by `gc-listen`:
//! - Values and heap objects on a mark-sweep heap
//! - Handle scopes and counted durable references
//! - Native finalizers dispatched from collector context
//! - An idle event loop for work deferred past the collector
//! - An uncaught exception channel

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod event_loop;
pub mod object;
pub mod reference;
pub mod scope;
pub mod value;

pub use config::{LoopConfig, RuntimeConfig};
pub use env::{Env, FinalizeContext, Finalizer, UncaughtHandler, WeakEnv};
pub use error::{CallError, HostError, HostResult, LoopError};
pub use event_loop::{EventLoop, HandleId, IdleHandle, IdleTask, LoopId, LoopStats};
pub use object::{CallInfo, ErrorKind, ErrorObject, Function, JsObject, NativeFn};
pub use reference::Reference;
pub use scope::HandleScope;
pub use value::{Value, ValueType};

pub use gcl_gc::{GcConfig, GcStats};
