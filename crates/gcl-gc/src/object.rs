//! GC object layout

use std::cell::Cell;
use std::fmt;

/// Handle to an allocation in a [`Heap`](crate::Heap).
///
/// The generation is bumped every time a slot is freed, so an id that
/// outlives its object never resolves to whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the heap arena
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when this id was handed out
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Mark color for tri-color marking
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkColor {
    /// Not yet visited
    White = 0,
    /// In worklist
    Gray = 1,
    /// Fully scanned
    Black = 2,
}

/// GC object header
#[derive(Debug)]
pub struct GcHeader {
    mark: Cell<MarkColor>,
}

impl GcHeader {
    /// Create new header
    pub const fn new() -> Self {
        Self {
            mark: Cell::new(MarkColor::White),
        }
    }

    /// Get mark color
    pub fn mark(&self) -> MarkColor {
        self.mark.get()
    }

    /// Set mark color
    pub fn set_mark(&self, color: MarkColor) {
        self.mark.set(color);
    }
}

impl Default for GcHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for GC-managed payloads.
///
/// `trace` must report every object the payload keeps alive. Anything not
/// reported is treated as weak.
pub trait GcTraceable {
    /// Whether `trace` can report anything at all. Leaf payloads skip the call.
    const NEEDS_TRACE: bool = true;

    /// Report references to other objects
    fn trace(&self, tracer: &mut dyn FnMut(ObjectId));

    /// Bytes accounted to this payload beyond its inline size
    fn external_size(&self) -> usize {
        0
    }
}
