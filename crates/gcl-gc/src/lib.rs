//! # gcl-gc
//!
//! Managed heap for the gc-listen host.
//!
//! ## Design
//!
//! - **Arena allocation**: objects live in generation-checked slots
//! - **Stop-the-world mark/sweep**: tri-color marking from caller-provided roots
//! - **Finalization registry**: weak targets whose payloads are moved out when
//!   the target is found dead, never more than once

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod finalization;
pub mod heap;
pub mod object;

pub use error::{GcError, GcResult};
pub use finalization::FinalizationRegistry;
pub use heap::{Collection, GcConfig, GcStats, Heap};
pub use object::{GcHeader, GcTraceable, MarkColor, ObjectId};
