// ============================================================================
// ripple-store - Cursors
// Restartable, weakly-consistent iteration over store contents
// ============================================================================
//
// A cursor snapshots the key set at creation and resolves values lazily at
// each step. Mutating the store mid-iteration is allowed: keys removed since
// the snapshot are skipped, values reflect the state at step time. Call the
// store method again for a fresh cursor.
// ============================================================================

use std::rc::Rc;

use crate::core::key::Key;

use super::StoreInner;

// =============================================================================
// ENTRIES
// =============================================================================

/// Lazy `(key, value)` cursor. Finite, bounded by the key set at creation.
pub struct Entries<V> {
    inner: Rc<StoreInner<V>>,
    keys: std::vec::IntoIter<Key>,
}

impl<V: Clone + 'static> Entries<V> {
    pub(crate) fn new(inner: Rc<StoreInner<V>>) -> Self {
        let mut keys: Vec<Key> = inner.items.borrow().keys().cloned().collect();
        keys.sort();
        Self {
            inner,
            keys: keys.into_iter(),
        }
    }
}

impl<V: Clone + 'static> Iterator for Entries<V> {
    type Item = (Key, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let value = self.inner.items.borrow().get(&key).cloned();
            if let Some(value) = value {
                return Some((key, value));
            }
            // Removed since the snapshot; skip
        }
    }
}

// =============================================================================
// KEYS
// =============================================================================

/// Cursor over the keys present when it was created.
pub struct Keys {
    keys: std::vec::IntoIter<Key>,
}

impl Keys {
    pub(crate) fn new<V>(inner: &StoreInner<V>) -> Self {
        let mut keys: Vec<Key> = inner.items.borrow().keys().cloned().collect();
        keys.sort();
        Self {
            keys: keys.into_iter(),
        }
    }
}

impl Iterator for Keys {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.keys.next()
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// Lazy value cursor; same consistency as [`Entries`].
pub struct Values<V> {
    entries: Entries<V>,
}

impl<V: Clone + 'static> Values<V> {
    pub(crate) fn new(entries: Entries<V>) -> Self {
        Self { entries }
    }
}

impl<V: Clone + 'static> Iterator for Values<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(_, value)| value)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::core::key::{Key, Keyed};
    use crate::store::Store;

    #[derive(Clone, Debug, PartialEq)]
    struct Doc {
        id: &'static str,
    }

    impl Keyed for Doc {
        fn key(&self) -> Option<Key> {
            Some(self.id.into())
        }
    }

    fn seeded() -> Store<Doc> {
        let store = Store::new();
        for id in ["a", "b", "c"] {
            store.add_item(Doc { id }).unwrap();
        }
        store
    }

    #[test]
    fn entries_yield_every_pair() {
        let store = seeded();
        let pairs: Vec<_> = store.entries().collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], (Key::from("a"), Doc { id: "a" }));
    }

    #[test]
    fn cursors_are_restartable() {
        let store = seeded();

        let first: Vec<Key> = store.keys().collect();
        let second: Vec<Key> = store.keys().collect();
        assert_eq!(first, second);

        let values: Vec<Doc> = store.values().collect();
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn removal_mid_iteration_is_skipped() {
        let store = seeded();

        let mut entries = store.entries();
        let (first, _) = entries.next().unwrap();
        assert_eq!(first, Key::from("a"));

        store.remove("b").unwrap();
        let rest: Vec<Key> = entries.map(|(key, _)| key).collect();
        assert_eq!(rest, vec![Key::from("c")]);
    }

    #[test]
    fn values_read_at_step_time() {
        let store = seeded();

        let mut values = store.values();
        values.next();

        store.update("c", Doc { id: "c2" }).unwrap();
        let last: Vec<Doc> = values.collect();
        assert_eq!(last.last().unwrap().id, "c2");
    }

    #[test]
    fn empty_store_yields_nothing() {
        let store: Store<Doc> = Store::new();
        assert_eq!(store.entries().count(), 0);
        assert_eq!(store.keys().count(), 0);
    }
}
