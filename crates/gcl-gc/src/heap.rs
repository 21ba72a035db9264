//! GC Heap management
//!
//! Stop-the-world mark/sweep over a generation-checked arena.
//!
//! A cycle runs in four phases:
//!
//! 1. reset every mark to white
//! 2. mark from the caller's roots, tracing through [`GcTraceable`]
//! 3. pull finalizer payloads of white targets out of the registry
//! 4. sweep: free white objects and bump their slot generation
//!
//! Finalizer payloads are returned to the caller rather than run here. The
//! caller decides what "collector context" means for them.

use std::mem;
use std::time::{Duration, Instant};

use crate::error::{GcError, GcResult};
use crate::finalization::FinalizationRegistry;
use crate::object::{GcHeader, GcTraceable, MarkColor, ObjectId};

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Allocated bytes after which `should_gc` reports true (default: 1MB)
    pub gc_threshold: usize,
    /// Hard cap on live objects; allocation fails past it (default: none)
    pub max_objects: Option<usize>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            gc_threshold: 1024 * 1024, // 1MB
            max_objects: None,
        }
    }
}

impl GcConfig {
    /// Config with a custom GC threshold
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            gc_threshold: threshold,
            ..Default::default()
        }
    }

    /// Cap the number of live objects
    pub fn max_objects(mut self, limit: usize) -> Self {
        self.max_objects = Some(limit);
        self
    }
}

/// Collection statistics
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    /// Live bytes
    pub total_bytes: usize,
    /// Live objects
    pub allocation_count: usize,
    /// Number of collections performed
    pub collection_count: usize,
    /// Bytes reclaimed by the last collection
    pub last_reclaimed: usize,
    /// Objects marked live by the last collection
    pub last_marked: usize,
    /// Finalizer payloads handed out across all collections
    pub finalizers_dispatched: usize,
    /// Pause time of the last collection
    pub last_pause_time: Duration,
    /// Accumulated pause time
    pub total_pause_time: Duration,
}

/// Outcome of a single collection
#[derive(Debug)]
pub struct Collection<F> {
    /// Bytes reclaimed
    pub reclaimed: usize,
    /// Ids freed by the sweep; none of them resolves anymore
    pub freed: Vec<ObjectId>,
    /// Finalizer payloads whose targets died, in registration order
    pub finalized: Vec<F>,
}

struct Allocation<T> {
    header: GcHeader,
    size: usize,
    value: T,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Allocation<T>>,
}

/// Managed heap of `T` payloads
pub struct Heap<T> {
    config: GcConfig,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    total_bytes: usize,
    stats: GcStats,
}

impl<T: GcTraceable> Heap<T> {
    /// Create new heap with default config
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create new heap with custom config
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            total_bytes: 0,
            stats: GcStats::default(),
        }
    }

    /// Get config
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Allocate a new object
    pub fn alloc(&mut self, value: T) -> GcResult<ObjectId> {
        if let Some(limit) = self.config.max_objects {
            if self.live >= limit {
                return Err(GcError::HeapExhausted { limit });
            }
        }

        let size = mem::size_of::<Allocation<T>>() + value.external_size();
        let allocation = Allocation {
            header: GcHeader::new(),
            size,
            value,
        };

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(allocation);
                ObjectId::new(index, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| GcError::HeapExhausted {
                    limit: u32::MAX as usize,
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(allocation),
                });
                ObjectId::new(index, 0)
            }
        };

        self.live += 1;
        self.total_bytes += size;
        Ok(id)
    }

    fn allocation(&self, id: ObjectId) -> Option<&Allocation<T>> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Whether `id` still refers to a live object
    pub fn contains(&self, id: ObjectId) -> bool {
        self.allocation(id).is_some()
    }

    /// Borrow a live object
    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.allocation(id).map(|a| &a.value)
    }

    /// Borrow a live object, reporting stale ids as an error
    pub fn try_get(&self, id: ObjectId) -> GcResult<&T> {
        self.get(id).ok_or(GcError::StaleObject(id))
    }

    /// Mutably borrow a live object
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entry.as_mut().map(|a| &mut a.value)
    }

    /// Number of live objects
    pub fn allocation_count(&self) -> usize {
        self.live
    }

    /// Live bytes
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Check if GC should be triggered
    pub fn should_gc(&self) -> bool {
        self.total_bytes >= self.config.gc_threshold
    }

    /// Get collection statistics
    pub fn stats(&self) -> GcStats {
        GcStats {
            total_bytes: self.total_bytes,
            allocation_count: self.live,
            ..self.stats.clone()
        }
    }

    /// Perform a full mark/sweep collection without finalization tracking
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectId>) -> usize {
        let mut none: FinalizationRegistry<()> = FinalizationRegistry::new();
        self.collect_with_finalizers(roots, &mut none).reclaimed
    }

    /// Perform a full mark/sweep collection, moving out the finalizer
    /// payloads of every registry target that did not survive.
    pub fn collect_with_finalizers<F>(
        &mut self,
        roots: impl IntoIterator<Item = ObjectId>,
        registry: &mut FinalizationRegistry<F>,
    ) -> Collection<F> {
        let start = Instant::now();

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "gcl::gc",
            heap_bytes = self.total_bytes,
            objects = self.live,
            finalizers = registry.len(),
            "GC cycle starting"
        );

        // Phase 1: Reset all marks to white
        self.reset_marks();

        // Phase 2: Mark from roots
        let marked = self.mark(roots);

        // Phase 3: Dead finalization targets, while mark bits are still valid
        let finalized = registry.sweep_dead_targets(|id| {
            self.allocation(id)
                .is_some_and(|a| a.header.mark() == MarkColor::Black)
        });

        // Phase 4: Sweep unmarked objects
        let (reclaimed, freed) = self.sweep();

        let elapsed = start.elapsed();
        self.stats.collection_count += 1;
        self.stats.last_reclaimed = reclaimed;
        self.stats.last_marked = marked;
        self.stats.finalizers_dispatched += finalized.len();
        self.stats.last_pause_time = elapsed;
        self.stats.total_pause_time += elapsed;

        #[cfg(feature = "gc_logging")]
        tracing::info!(
            target: "gcl::gc",
            collection = self.stats.collection_count,
            reclaimed_bytes = reclaimed,
            freed_objects = freed.len(),
            finalizers = finalized.len(),
            pause_us = elapsed.as_micros() as u64,
            live_objects = self.live,
            "GC cycle complete"
        );

        Collection {
            reclaimed,
            freed,
            finalized,
        }
    }

    fn reset_marks(&self) {
        for slot in &self.slots {
            if let Some(allocation) = &slot.entry {
                allocation.header.set_mark(MarkColor::White);
            }
        }
    }

    fn shade(&self, id: ObjectId, worklist: &mut Vec<ObjectId>) {
        if let Some(allocation) = self.allocation(id) {
            if allocation.header.mark() == MarkColor::White {
                allocation.header.set_mark(MarkColor::Gray);
                worklist.push(id);
            }
        }
    }

    fn mark(&self, roots: impl IntoIterator<Item = ObjectId>) -> usize {
        let mut worklist = Vec::new();
        for root in roots {
            self.shade(root, &mut worklist);
        }

        let mut marked = 0;
        while let Some(id) = worklist.pop() {
            let Some(allocation) = self.allocation(id) else {
                continue;
            };
            if T::NEEDS_TRACE {
                allocation
                    .value
                    .trace(&mut |child| self.shade(child, &mut worklist));
            }
            allocation.header.set_mark(MarkColor::Black);
            marked += 1;
        }
        marked
    }

    fn sweep(&mut self) -> (usize, Vec<ObjectId>) {
        let mut reclaimed = 0;
        let mut freed = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let dead = slot
                .entry
                .as_ref()
                .is_some_and(|a| a.header.mark() == MarkColor::White);
            if !dead {
                continue;
            }
            if let Some(allocation) = slot.entry.take() {
                reclaimed += allocation.size;
                freed.push(ObjectId::new(index as u32, slot.generation));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }

        self.live -= freed.len();
        self.total_bytes -= reclaimed;
        (reclaimed, freed)
    }
}

impl<T: GcTraceable> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("live", &self.live)
            .field("total_bytes", &self.total_bytes)
            .field("collections", &self.stats.collection_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl GcTraceable for Leaf {
        const NEEDS_TRACE: bool = false;

        fn trace(&self, _tracer: &mut dyn FnMut(ObjectId)) {}
    }

    #[test]
    fn test_heap_creation() {
        let heap: Heap<Leaf> = Heap::new();
        assert_eq!(heap.total_bytes(), 0);
        assert_eq!(heap.allocation_count(), 0);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut heap = Heap::new();
        let first = heap.alloc(Leaf).unwrap();
        heap.collect([]);
        assert!(!heap.contains(first));

        let second = heap.alloc(Leaf).unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(heap.get(first).is_none());
        assert_eq!(heap.try_get(first).err(), Some(GcError::StaleObject(first)));
    }

    #[test]
    fn test_object_limit() {
        let mut heap = Heap::with_config(GcConfig::default().max_objects(1));
        heap.alloc(Leaf).unwrap();
        assert_eq!(
            heap.alloc(Leaf).err(),
            Some(GcError::HeapExhausted { limit: 1 })
        );
    }
}
