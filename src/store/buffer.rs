// ============================================================================
// ripple-store - Buffering & Coalescing
// Pending-log merge rules and the one-shot flush capability
// ============================================================================
//
// While a buffering scope is open, mutations accumulate in the pending log
// as one net action per key. Closing the outermost scope partitions the log
// into added/updated/removed key sets, emits one batched event per non-empty
// set, then a settle signal, then clears the log.
// ============================================================================

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::core::error::StoreError;
use crate::core::event::{ChangeKind, StoreEvent};
use crate::core::key::Key;

use super::{Store, StoreInner};

// =============================================================================
// PENDING-LOG MERGE
// =============================================================================

/// Fold one raw mutation into the net effect recorded for its key.
///
/// A key added then removed in the same scope leaves no entry at all; a key
/// removed then re-added is an update (it existed at the last flush
/// boundary). The remaining combinations cannot occur: operation-level
/// validation rejects adding a present key or updating an absent one.
pub(crate) fn merge_pending(pending: &mut HashMap<Key, ChangeKind>, key: Key, incoming: ChangeKind) {
    use ChangeKind::{Added, Removed, Updated};

    match (pending.get(&key).copied(), incoming) {
        (None, kind) => {
            pending.insert(key, kind);
        }
        (Some(Added), Updated) => {} // still a net add
        (Some(Added), Removed) => {
            pending.remove(&key); // net zero
        }
        (Some(Updated), Updated) => {}
        (Some(Updated), Removed) => {
            pending.insert(key, Removed);
        }
        (Some(Removed), Added) => {
            pending.insert(key, Updated); // existed before the scope opened
        }
        (Some(prev), kind) => {
            debug_assert!(false, "unreachable pending merge: {prev:?} then {kind:?}");
            pending.insert(key, kind);
        }
    }
}

// =============================================================================
// FLUSH HANDLE
// =============================================================================

/// One-shot capability to close a buffering scope.
///
/// Returned by [`Store::buffer_events`]; the automatic scope opened by the
/// first unbuffered mutation holds one internally. Only the invocation that
/// brings the scope depth back to zero emits; every handle fails with
/// `BufferAlreadyFlushed` on its second use.
pub struct FlushHandle<V> {
    store: Weak<StoreInner<V>>,
    spent: Cell<bool>,
}

impl<V: Clone + 'static> FlushHandle<V> {
    pub(crate) fn new(store: Weak<StoreInner<V>>) -> Self {
        Self {
            store,
            spent: Cell::new(false),
        }
    }

    /// Close this handle's scope. Emits the coalesced batch if this was the
    /// outermost open scope and the pending log is non-empty.
    pub fn flush(&self) -> Result<(), StoreError> {
        if self.spent.replace(true) {
            return Err(StoreError::BufferAlreadyFlushed);
        }

        let Some(inner) = self.store.upgrade() else {
            // Store already dropped; nothing left to emit
            return Ok(());
        };

        let depth = inner.buffer_depth.get().saturating_sub(1);
        inner.buffer_depth.set(depth);
        if depth > 0 {
            return Ok(());
        }

        // Swap the log out before any listener runs: reentrant mutations
        // start a fresh log and a fresh automatic scope.
        let pending = inner.pending.replace(HashMap::new());
        if pending.is_empty() {
            return Ok(());
        }

        let mut added: HashMap<Key, V> = HashMap::new();
        let mut updated: HashMap<Key, V> = HashMap::new();
        let mut removed: Vec<Key> = Vec::new();
        {
            let items = inner.items.borrow();
            for (key, kind) in pending {
                match kind {
                    ChangeKind::Added => {
                        if let Some(value) = items.get(&key) {
                            added.insert(key, value.clone());
                        }
                    }
                    ChangeKind::Updated => {
                        if let Some(value) = items.get(&key) {
                            updated.insert(key, value.clone());
                        }
                    }
                    ChangeKind::Removed => removed.push(key),
                }
            }
        }
        removed.sort();

        tracing::debug!(
            added = added.len(),
            updated = updated.len(),
            removed = removed.len(),
            "flushing buffered changes"
        );

        if !added.is_empty() {
            inner.dispatch(&StoreEvent::Add(added));
        }
        if !updated.is_empty() {
            inner.dispatch(&StoreEvent::Update(updated));
        }
        if !removed.is_empty() {
            inner.dispatch(&StoreEvent::Remove(removed));
        }
        inner.dispatch(&StoreEvent::Settle);

        Ok(())
    }
}

// =============================================================================
// BUFFERING SCOPES
// =============================================================================

impl<V: Clone + 'static> Store<V> {
    /// Open a buffering scope and return its flush capability.
    ///
    /// While any scope is open, no automatic flush fires; only the close
    /// that brings the depth back to zero emits the coalesced batch.
    pub fn buffer_events(&self) -> FlushHandle<V> {
        let depth = self.inner.buffer_depth.get() + 1;
        self.inner.buffer_depth.set(depth);
        FlushHandle::new(Rc::downgrade(&self.inner))
    }

    /// Run `f` inside a buffering scope, flushing on the way out.
    ///
    /// The scope closes even if `f` panics.
    pub fn buffered<R>(&self, f: impl FnOnce() -> R) -> R {
        struct ScopeGuard<V: Clone + 'static> {
            handle: FlushHandle<V>,
        }

        impl<V: Clone + 'static> Drop for ScopeGuard<V> {
            fn drop(&mut self) {
                // The guard owns the handle, so this is its first use
                let _ = self.handle.flush();
            }
        }

        let _guard = ScopeGuard {
            handle: self.buffer_events(),
        };
        f()
    }
}

// =============================================================================
// TESTS
// =============================================================================
