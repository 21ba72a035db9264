//! GC correctness tests
//!
//! These tests verify that the stop-the-world mark/sweep collector handles
//! reachability and finalization targets correctly.

use gcl_gc::{FinalizationRegistry, GcConfig, GcTraceable, Heap, ObjectId};

/// Simple test object for GC testing
struct TestObject {
    value: i32,
    /// Optional reference to another object
    reference: Option<ObjectId>,
}

impl TestObject {
    fn leaf(value: i32) -> Self {
        Self {
            value,
            reference: None,
        }
    }
}

impl GcTraceable for TestObject {
    fn trace(&self, tracer: &mut dyn FnMut(ObjectId)) {
        if let Some(id) = self.reference {
            tracer(id);
        }
    }
}

#[test]
fn test_collect_simple_garbage() {
    let mut heap = Heap::new();
    heap.alloc(TestObject::leaf(42)).unwrap();

    assert_eq!(heap.allocation_count(), 1);
    assert!(heap.total_bytes() > 0);

    // Force GC with no roots
    let reclaimed = heap.collect([]);

    assert!(reclaimed > 0);
    assert_eq!(heap.allocation_count(), 0);
    assert_eq!(heap.total_bytes(), 0);
}

#[test]
fn test_rooted_chain_survives() {
    let mut heap = Heap::new();
    let tail = heap.alloc(TestObject::leaf(2)).unwrap();
    let head = heap
        .alloc(TestObject {
            value: 1,
            reference: Some(tail),
        })
        .unwrap();

    heap.collect([head]);

    assert_eq!(heap.allocation_count(), 2);
    assert_eq!(heap.get(tail).map(|o| o.value), Some(2));
    assert_eq!(heap.stats().last_marked, 2);
}

#[test]
fn test_circular_references_collected() {
    let mut heap = Heap::new();
    let obj1 = heap.alloc(TestObject::leaf(1)).unwrap();
    let obj2 = heap
        .alloc(TestObject {
            value: 2,
            reference: Some(obj1), // obj2 -> obj1
        })
        .unwrap();

    // Complete the cycle: obj1 -> obj2
    heap.get_mut(obj1).unwrap().reference = Some(obj2);

    // Force GC with NO roots - both objects should be collected
    let reclaimed = heap.collect([]);

    assert!(reclaimed > 0);
    assert_eq!(heap.allocation_count(), 0);
}

#[test]
fn test_finalizer_payload_only_for_dead_targets() {
    let mut heap = Heap::new();
    let mut registry = FinalizationRegistry::new();

    let live = heap.alloc(TestObject::leaf(1)).unwrap();
    let dead = heap.alloc(TestObject::leaf(2)).unwrap();
    registry.register(live, "live");
    registry.register(dead, "dead");

    let collection = heap.collect_with_finalizers([live], &mut registry);

    assert_eq!(collection.finalized, vec!["dead"]);
    assert_eq!(collection.freed, vec![dead]);
    assert_eq!(registry.len(), 1);
    assert_eq!(heap.stats().finalizers_dispatched, 1);
}

#[test]
fn test_finalizer_delivered_once_across_cycles() {
    let mut heap = Heap::new();
    let mut registry = FinalizationRegistry::new();

    let target = heap.alloc(TestObject::leaf(7)).unwrap();
    registry.register(target, 7u32);

    let first = heap.collect_with_finalizers([], &mut registry);
    let second = heap.collect_with_finalizers([], &mut registry);

    assert_eq!(first.finalized, vec![7]);
    assert!(second.finalized.is_empty());
    assert!(registry.is_empty());
}

#[test]
fn test_target_kept_alive_through_another_object() {
    let mut heap = Heap::new();
    let mut registry = FinalizationRegistry::new();

    let target = heap.alloc(TestObject::leaf(1)).unwrap();
    let holder = heap
        .alloc(TestObject {
            value: 0,
            reference: Some(target),
        })
        .unwrap();
    registry.register(target, ());

    let collection = heap.collect_with_finalizers([holder], &mut registry);
    assert!(collection.finalized.is_empty());

    let collection = heap.collect_with_finalizers([], &mut registry);
    assert_eq!(collection.finalized.len(), 1);
}

#[test]
fn test_heap_growth_bounded() {
    let mut heap = Heap::with_config(GcConfig::with_threshold(1024));

    for i in 0..100 {
        heap.alloc(TestObject::leaf(i)).unwrap();

        // Trigger GC periodically to keep heap bounded
        if i % 10 == 9 {
            heap.collect([]);
        }
    }

    heap.collect([]);

    assert_eq!(heap.total_bytes(), 0);
    assert_eq!(heap.allocation_count(), 0);
}

#[test]
fn test_gc_statistics() {
    let mut heap = Heap::new();

    let stats = heap.stats();
    assert_eq!(stats.collection_count, 0);
    assert_eq!(stats.total_bytes, 0);
    assert_eq!(stats.allocation_count, 0);

    heap.alloc(TestObject::leaf(42)).unwrap();

    let stats = heap.stats();
    assert_eq!(stats.allocation_count, 1);
    assert!(stats.total_bytes > 0);

    heap.collect([]);

    let stats = heap.stats();
    assert_eq!(stats.collection_count, 1);
    assert_eq!(stats.allocation_count, 0);
    assert!(stats.last_reclaimed > 0);
}

#[test]
fn test_should_gc_threshold() {
    let mut heap = Heap::with_config(GcConfig::with_threshold(200));

    assert!(!heap.should_gc());

    for _ in 0..10 {
        heap.alloc(TestObject::leaf(0)).unwrap();
    }

    assert!(heap.should_gc());

    heap.collect([]);
    assert!(!heap.should_gc());
}
