// ============================================================================
// ripple-store - Index Registry
// Pluggable secondary indexes fed by the raw mutation stream
// ============================================================================
//
// An index is a black box that maintains its own derived view. Once
// attached it sees every raw mutation synchronously, before the mutation is
// merged into the pending log; it never sees the coalesced batches. An
// index attached mid-scope seeds itself from the full item map at attach
// time and sees only mutations recorded afterwards.
// ============================================================================

use std::any::Any;
use std::rc::Rc;

use crate::core::error::StoreError;
use crate::core::event::Mutation;

use super::Store;

// =============================================================================
// INDEX TRAIT
// =============================================================================

/// A pluggable derived view kept in sync with the store.
///
/// `on_attach` and `on_detach` are each invoked exactly once, in that
/// order, for the lifetime of an attachment; `on_attach` receives the store
/// so the index can seed its view from the current item map. Hooks may
/// mutate the store reentrantly; such mutations fold into the same pending
/// log as any other. Hook panics propagate - the store never catches them.
///
/// The index's typed item view is reached by downcasting the registered
/// trait object through `as_any`.
pub trait Index<V> {
    fn on_attach(&self, store: &Store<V>);

    fn on_detach(&self, store: &Store<V>);

    /// One raw, uncoalesced mutation.
    fn on_change(&self, mutation: &Mutation<'_, V>);

    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// REGISTRY OPERATIONS
// =============================================================================

impl<V: Clone + 'static> Store<V> {
    /// Attach `index` under `name` and invoke its attach hook.
    ///
    /// Fails with `DuplicateIndex` if the name is taken; the registry and
    /// the existing attachment are left untouched on failure.
    pub fn create_index(
        &self,
        name: impl Into<String>,
        index: Rc<dyn Index<V>>,
    ) -> Result<(), StoreError> {
        let name = name.into();
        {
            let mut indexes = self.inner.indexes.borrow_mut();
            if indexes.contains_key(&name) {
                return Err(StoreError::DuplicateIndex(name));
            }
            indexes.insert(name.clone(), index.clone());
        }

        tracing::debug!(%name, "index attached");
        index.on_attach(self);
        Ok(())
    }

    /// Detach the index registered under `name` and invoke its detach hook.
    ///
    /// Fails with `NoSuchIndex` if no such name is registered. The store's
    /// own item mapping is unaffected.
    pub fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        let index = self
            .inner
            .indexes
            .borrow_mut()
            .remove(name)
            .ok_or_else(|| StoreError::NoSuchIndex(name.to_string()))?;

        tracing::debug!(name, "index detached");
        index.on_detach(self);
        Ok(())
    }

    /// The index registered under `name`, if any.
    pub fn index(&self, name: &str) -> Option<Rc<dyn Index<V>>> {
        self.inner.indexes.borrow().get(name).cloned()
    }
}

// =============================================================================
// TESTS
// =============================================================================
