//! Finalizer tracking: weak targets mapped to the payloads that run when they die.
//!
//! Entries do not keep their targets alive. During a collection, once marking
//! is done, every entry whose target stayed white is removed and its payload
//! is handed back to the caller of the collection. Removal moves the payload
//! out by value, so a target can never deliver the same payload twice.

use crate::object::ObjectId;

/// A single target registration
struct TargetEntry<F> {
    /// Weak target (NOT traced)
    target: ObjectId,
    /// Payload handed back once the target is collected
    payload: F,
}

/// Registry of finalizers keyed by their weak target.
pub struct FinalizationRegistry<F> {
    entries: Vec<TargetEntry<F>>,
}

impl<F> FinalizationRegistry<F> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Attach a payload to `target`. A target may carry several payloads;
    /// they are returned in registration order.
    pub fn register(&mut self, target: ObjectId, payload: F) {
        self.entries.push(TargetEntry { target, payload });
    }

    /// Number of payloads still waiting for their target to die.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of payloads attached to `target`.
    pub fn count_for(&self, target: ObjectId) -> usize {
        self.entries.iter().filter(|e| e.target == target).count()
    }

    /// Remove every entry whose target is no longer live and return the payloads.
    ///
    /// Called by the heap between mark and sweep, while mark bits are valid.
    pub(crate) fn sweep_dead_targets(&mut self, is_live: impl Fn(ObjectId) -> bool) -> Vec<F> {
        let mut dead = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());

        for entry in self.entries.drain(..) {
            if is_live(entry.target) {
                kept.push(entry);
            } else {
                dead.push(entry.payload);
            }
        }

        self.entries = kept;
        dead
    }
}

impl<F> Default for FinalizationRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> std::fmt::Debug for FinalizationRegistry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizationRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
