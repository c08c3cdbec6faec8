// ============================================================================
// ripple-store - Events
// Raw per-mutation notifications and coalesced batch events
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::core::key::Key;

// =============================================================================
// CHANGE KINDS
// =============================================================================

/// Net effect of the mutations to one key since the last flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

// =============================================================================
// RAW MUTATIONS
// =============================================================================

/// A single raw mutation, delivered synchronously to every attached index
/// before the mutation is merged into the pending log.
///
/// Raw mutations are never coalesced; only the public [`StoreEvent`] batches
/// are. For `Removed`, `value` is the value as it was just before removal.
#[derive(Clone, Copy, Debug)]
pub struct Mutation<'a, V> {
    pub kind: ChangeKind,
    pub key: &'a Key,
    pub value: &'a V,
}

// =============================================================================
// BATCHED EVENTS
// =============================================================================

/// A coalesced change event, emitted once per non-empty key set when a
/// buffering scope closes, followed by a terminal [`Settle`](Self::Settle).
///
/// `Remove` carries only the affected keys (sorted); the removed values are
/// not observable through the batched surface.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent<V> {
    Add(HashMap<Key, V>),
    Update(HashMap<Key, V>),
    Remove(Vec<Key>),
    Settle,
}

impl<V> StoreEvent<V> {
    /// Keys affected by this event, in no particular order.
    pub fn keys(&self) -> Vec<&Key> {
        match self {
            StoreEvent::Add(items) | StoreEvent::Update(items) => items.keys().collect(),
            StoreEvent::Remove(keys) => keys.iter().collect(),
            StoreEvent::Settle => Vec::new(),
        }
    }
}

// =============================================================================
// LISTENER SLOTS
// =============================================================================

/// One registered listener.
///
/// Slots are snapshotted before dispatch (collect-then-call), so a listener
/// may subscribe or unsubscribe reentrantly without tripping a borrow. The
/// `active` flag makes an unsubscribe during dispatch take effect for the
/// remainder of that dispatch.
pub(crate) struct ListenerSlot<V> {
    pub(crate) id: u64,
    pub(crate) active: Cell<bool>,
    pub(crate) callback: RefCell<Box<dyn FnMut(&StoreEvent<V>)>>,
}

impl<V> ListenerSlot<V> {
    pub(crate) fn new(id: u64, callback: Box<dyn FnMut(&StoreEvent<V>)>) -> Self {
        Self {
            id,
            active: Cell::new(true),
            callback: RefCell::new(callback),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_keys_cover_every_shape() {
        let add: StoreEvent<i32> = StoreEvent::Add(HashMap::from([(Key::from("a"), 1)]));
        assert_eq!(add.keys(), vec![&Key::from("a")]);

        let remove: StoreEvent<i32> = StoreEvent::Remove(vec!["a".into(), "b".into()]);
        assert_eq!(remove.keys().len(), 2);

        let settle: StoreEvent<i32> = StoreEvent::Settle;
        assert!(settle.keys().is_empty());
    }

    #[test]
    fn listener_slot_starts_active() {
        let slot: ListenerSlot<i32> = ListenerSlot::new(1, Box::new(|_| {}));
        assert!(slot.active.get());
        assert_eq!(slot.id, 1);
    }
}
