//! Durable references
//!
//! A reference keeps a value reachable independently of whoever handed it
//! out. While its count is above zero the value is a GC root; at zero the
//! reference is weak and reads back as `None` once the target is collected.
//!
//! [`Reference`] is an owned token. It is not `Clone`, and it releases its
//! table entry when dropped, so every reference is released exactly once.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use gcl_gc::ObjectId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::value::Value;

struct RefEntry {
    /// `None` once a weak target has been collected
    value: Option<Value>,
    count: u32,
}

#[derive(Default)]
pub(crate) struct ReferenceTable {
    entries: FxHashMap<u64, RefEntry>,
    next_id: u64,
}

impl ReferenceTable {
    pub(crate) fn insert(&mut self, value: Value, count: u32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            RefEntry {
                value: Some(value),
                count,
            },
        );
        id
    }

    pub(crate) fn value(&self, id: u64) -> Option<Option<Value>> {
        self.entries.get(&id).map(|e| e.value.clone())
    }

    pub(crate) fn adjust(&mut self, id: u64, increment: bool) -> Option<u32> {
        let entry = self.entries.get_mut(&id)?;
        entry.count = if increment {
            entry.count.saturating_add(1)
        } else {
            entry.count.saturating_sub(1)
        };
        Some(entry.count)
    }

    fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Objects held by references with a positive count
    pub(crate) fn strong_roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries
            .values()
            .filter(|e| e.count > 0)
            .filter_map(|e| e.value.as_ref().and_then(Value::as_object))
    }

    /// Forget weak targets that were just freed
    pub(crate) fn clear_freed(&mut self, freed: &[ObjectId]) {
        if freed.is_empty() {
            return;
        }
        let freed: FxHashSet<ObjectId> = freed.iter().copied().collect();
        for entry in self.entries.values_mut() {
            let dead = entry
                .value
                .as_ref()
                .and_then(Value::as_object)
                .is_some_and(|id| freed.contains(&id));
            if dead {
                entry.value = None;
            }
        }
    }
}

/// Owned durable reference
#[must_use = "dropping a Reference releases it"]
pub struct Reference {
    id: u64,
    table: Weak<RefCell<ReferenceTable>>,
}

impl Reference {
    pub(crate) fn new(id: u64, table: &Rc<RefCell<ReferenceTable>>) -> Self {
        Self {
            id,
            table: Rc::downgrade(table),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn belongs_to(&self, table: &Rc<RefCell<ReferenceTable>>) -> bool {
        Weak::ptr_eq(&self.table, &Rc::downgrade(table))
    }
}

impl Drop for Reference {
    fn drop(&mut self) {
        // The table dies with its environment; nothing to release then.
        if let Some(table) = self.table.upgrade() {
            table.borrow_mut().remove(self.id);
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_releases_entry() {
        let table = Rc::new(RefCell::new(ReferenceTable::default()));
        let id = table.borrow_mut().insert(Value::Number(1.0), 1);
        let reference = Reference::new(id, &table);
        assert_eq!(table.borrow().len(), 1);

        drop(reference);
        assert_eq!(table.borrow().len(), 0);
    }

    #[test]
    fn test_clear_freed_only_touches_freed_targets() {
        let mut heap = gcl_gc::Heap::new();
        let ids: Vec<ObjectId> = (0..20_000)
            .map(|_| heap.alloc(crate::object::JsObject::Plain(Vec::new())).unwrap())
            .collect();

        let mut table = ReferenceTable::default();
        let entries: Vec<u64> = ids
            .iter()
            .map(|id| table.insert(Value::Object(*id), 0))
            .collect();
        let primitive = table.insert(Value::Number(1.0), 0);

        let freed: Vec<ObjectId> = ids.iter().copied().step_by(2).collect();
        table.clear_freed(&freed);

        for (i, entry) in entries.iter().enumerate() {
            let value = table.value(*entry).unwrap();
            assert_eq!(value.is_none(), i % 2 == 0, "entry {i}");
        }
        assert_eq!(table.value(primitive), Some(Some(Value::Number(1.0))));
    }

    #[test]
    fn test_count_saturates_at_zero() {
        let mut table = ReferenceTable::default();
        let id = table.insert(Value::Null, 0);
        assert_eq!(table.adjust(id, false), Some(0));
        assert_eq!(table.adjust(id, true), Some(1));
        assert_eq!(table.adjust(99, true), None);
    }
}
