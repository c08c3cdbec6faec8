// ============================================================================
// ripple-store - An Observable, Indexed, In-Memory Keyed Store
// ============================================================================
//
// Many independent observers track a changing object set without seeing
// redundant or interleaved notifications: same-tick mutations to a key are
// coalesced into a minimal net effect (add/update/remove) and emitted as
// batched events once per flush, while pluggable secondary indexes follow
// the raw mutation stream.
// ============================================================================

pub mod core;
pub mod scheduling;
pub mod store;

// Re-export core items at crate root for ergonomic access
pub use core::error::StoreError;
pub use core::event::{ChangeKind, Mutation, StoreEvent};
pub use core::key::{Key, KeyExtractor, Keyed};

// Re-export scheduling
pub use scheduling::{DeferredScheduler, EagerScheduler, FlushScheduler, ScheduledFlush};

// Re-export the store surface
pub use store::{Entries, FlushHandle, Index, Keys, Store, Subscription, Values};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Clone, Debug, PartialEq)]
    struct Obj {
        id: &'static str,
        v: i64,
    }

    impl Keyed for Obj {
        fn key(&self) -> Option<Key> {
            Some(self.id.into())
        }
    }

    fn obj(id: &'static str, v: i64) -> Obj {
        Obj { id, v }
    }

    fn recording(store: &Store<Obj>) -> Rc<RefCell<Vec<StoreEvent<Obj>>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let _ = store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn two_batches_end_to_end() {
        let store = Store::new();
        let events = recording(&store);

        store.add("a", obj("a", 1)).unwrap();
        store.add("b", obj("b", 2)).unwrap();
        store.tick();

        {
            let events = events.borrow();
            assert_eq!(events.len(), 2);
            assert_eq!(
                events[0],
                StoreEvent::Add(HashMap::from([
                    ("a".into(), obj("a", 1)),
                    ("b".into(), obj("b", 2)),
                ]))
            );
            assert_eq!(events[1], StoreEvent::Settle);
        }
        events.borrow_mut().clear();

        store.update("a", obj("a", 9)).unwrap();
        store.remove("b").unwrap();
        store.tick();

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            StoreEvent::Update(HashMap::from([("a".into(), obj("a", 9))]))
        );
        assert_eq!(events[1], StoreEvent::Remove(vec!["b".into()]));
        assert_eq!(events[2], StoreEvent::Settle);

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn size_matches_item_count_at_every_quiescent_point() {
        let store = Store::new();

        store.add("a", obj("a", 1)).unwrap();
        store.set("b", obj("b", 2));
        store.tick();
        assert_eq!(store.len(), store.entries().count());

        store.buffered(|| {
            store.remove("a").unwrap();
            store.add("c", obj("c", 3)).unwrap();
            store.unset("missing");
        });
        assert_eq!(store.len(), 2);
        assert_eq!(store.len(), store.entries().count());

        store.clear();
        store.tick();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn eager_scheduler_emits_per_unbuffered_mutation() {
        let store: Store<Obj> = Store::with_scheduler(Rc::new(EagerScheduler::new()));
        let events = recording(&store);

        store.add("a", obj("a", 1)).unwrap();
        // No tick needed: the automatic flush ran at schedule time
        assert_eq!(events.borrow().len(), 2);

        events.borrow_mut().clear();
        store.buffered(|| {
            store.add("b", obj("b", 2)).unwrap();
            store.add("c", obj("c", 3)).unwrap();
            assert!(events.borrow().is_empty());
        });
        // Manual scopes still coalesce under the eager scheduler
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn shared_scheduler_across_stores() {
        let scheduler = Rc::new(DeferredScheduler::new());
        let left: Store<Obj> = Store::with_scheduler(scheduler.clone());
        let right: Store<Obj> = Store::with_scheduler(scheduler.clone());

        left.add("a", obj("a", 1)).unwrap();
        right.add("b", obj("b", 2)).unwrap();
        assert_eq!(scheduler.pending(), 2);

        scheduler.run_pending();
        assert_eq!(scheduler.pending(), 0);
    }
}
