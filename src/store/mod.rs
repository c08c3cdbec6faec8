// ============================================================================
// ripple-store - Store
// The observable, indexed, in-memory keyed collection
// ============================================================================
//
// A Store owns the item mapping, the pending-change log, the buffering
// depth, the index registry, and the listener registry. Mutations apply to
// the item map, notify attached indexes synchronously with the raw
// mutation, then merge into the pending log; the first mutation outside any
// buffering scope schedules a deferred flush that emits the coalesced batch.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::core::error::StoreError;
use crate::core::event::{ChangeKind, ListenerSlot, Mutation, StoreEvent};
use crate::core::key::{Key, KeyExtractor, Keyed};
use crate::scheduling::{DeferredScheduler, FlushScheduler};

pub mod buffer;
pub mod cursor;
pub mod index;

pub use buffer::FlushHandle;
pub use cursor::{Entries, Keys, Values};
pub use index::Index;

use buffer::merge_pending;

// =============================================================================
// STORE INNER
// =============================================================================

/// Shared store state. Public handles are cheap clones over this.
pub(crate) struct StoreInner<V> {
    /// key -> value, no ordering guarantee
    pub(crate) items: RefCell<HashMap<Key, V>>,

    /// Net mutation per key since the last flush
    pub(crate) pending: RefCell<HashMap<Key, ChangeKind>>,

    /// Open buffering scopes; zero means the next mutation schedules a flush
    pub(crate) buffer_depth: Cell<u32>,

    /// Attached indexes by name
    pub(crate) indexes: RefCell<HashMap<String, Rc<dyn Index<V>>>>,

    /// Batch event listeners
    pub(crate) listeners: RefCell<Vec<Rc<ListenerSlot<V>>>>,
    pub(crate) next_listener_id: Cell<u64>,

    /// Key derivation for value-only operations
    pub(crate) extractor: RefCell<KeyExtractor<V>>,

    /// Deferral point for automatic flushes
    pub(crate) scheduler: Rc<dyn FlushScheduler>,
}

impl<V: Clone + 'static> StoreInner<V> {
    fn new(extractor: KeyExtractor<V>, scheduler: Rc<dyn FlushScheduler>) -> Self {
        Self {
            items: RefCell::new(HashMap::new()),
            pending: RefCell::new(HashMap::new()),
            buffer_depth: Cell::new(0),
            indexes: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(0),
            extractor: RefCell::new(extractor),
            scheduler,
        }
    }

    // =========================================================================
    // MUTATION CORE
    // =========================================================================

    fn add(self: &Rc<Self>, key: Key, value: V) -> Result<(), StoreError> {
        if self.items.borrow().contains_key(&key) {
            return Err(StoreError::DuplicateItem(key));
        }
        self.items.borrow_mut().insert(key.clone(), value.clone());
        self.notify_indexes(ChangeKind::Added, &key, &value);
        self.record(key, ChangeKind::Added);
        Ok(())
    }

    fn set(self: &Rc<Self>, key: Key, value: V) {
        let existed = self.items.borrow().contains_key(&key);
        self.items.borrow_mut().insert(key.clone(), value.clone());

        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        self.notify_indexes(kind, &key, &value);
        self.record(key, kind);
    }

    fn update(self: &Rc<Self>, key: Key, value: V) -> Result<(), StoreError> {
        if !self.items.borrow().contains_key(&key) {
            return Err(StoreError::NoSuchItem(key));
        }
        self.items.borrow_mut().insert(key.clone(), value.clone());
        self.notify_indexes(ChangeKind::Updated, &key, &value);
        self.record(key, ChangeKind::Updated);
        Ok(())
    }

    fn remove(self: &Rc<Self>, key: Key) -> Result<(), StoreError> {
        let removed = self.items.borrow_mut().remove(&key);
        let Some(prev) = removed else {
            return Err(StoreError::NoSuchItem(key));
        };
        self.notify_indexes(ChangeKind::Removed, &key, &prev);
        self.record(key, ChangeKind::Removed);
        Ok(())
    }

    fn unset(self: &Rc<Self>, key: Key) {
        let removed = self.items.borrow_mut().remove(&key);
        if let Some(prev) = removed {
            self.notify_indexes(ChangeKind::Removed, &key, &prev);
            self.record(key, ChangeKind::Removed);
        }
    }

    fn clear(self: &Rc<Self>) {
        let drained: Vec<(Key, V)> = {
            let mut items = self.items.borrow_mut();
            items.drain().collect()
        };
        for (key, prev) in drained {
            self.notify_indexes(ChangeKind::Removed, &key, &prev);
            self.record(key, ChangeKind::Removed);
        }
    }

    /// Merge one raw mutation into the pending log; the first mutation at
    /// depth zero opens the implicit scope and defers its flush.
    pub(crate) fn record(self: &Rc<Self>, key: Key, kind: ChangeKind) {
        tracing::trace!(%key, ?kind, "recording mutation");
        merge_pending(&mut self.pending.borrow_mut(), key, kind);

        if self.buffer_depth.get() == 0 {
            self.buffer_depth.set(1);
            let handle = FlushHandle::new(Rc::downgrade(self));
            self.scheduler.defer(Box::new(move || {
                if let Err(err) = handle.flush() {
                    tracing::debug!(%err, "deferred flush failed");
                }
            }));
        }
    }

    /// Feed one raw mutation to every attached index, synchronously.
    ///
    /// Indexes are snapshotted first so a hook may attach or detach indexes
    /// (or mutate the store) without tripping a borrow.
    pub(crate) fn notify_indexes(&self, kind: ChangeKind, key: &Key, value: &V) {
        let attached: Vec<Rc<dyn Index<V>>> = self.indexes.borrow().values().cloned().collect();
        if attached.is_empty() {
            return;
        }

        let mutation = Mutation { kind, key, value };
        for index in attached {
            index.on_change(&mutation);
        }
    }

    /// Deliver one batched event to every listener (collect-then-call).
    pub(crate) fn dispatch(&self, event: &StoreEvent<V>) {
        let slots: Vec<Rc<ListenerSlot<V>>> = self.listeners.borrow().iter().cloned().collect();
        for slot in slots {
            if slot.active.get() {
                (slot.callback.borrow_mut())(event);
            }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// An observable, indexed, in-memory keyed store.
///
/// Mutations are coalesced per key into a minimal net effect and emitted as
/// batched [`StoreEvent`]s once per flush; attached [`Index`]es see every
/// raw mutation synchronously.
///
/// `Store` is a cheap handle: cloning shares the same underlying state.
///
/// # Example
///
/// ```
/// use ripple_store::{Key, Keyed, Store, StoreEvent};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Vm {
///     id: &'static str,
///     power: &'static str,
/// }
///
/// impl Keyed for Vm {
///     fn key(&self) -> Option<Key> {
///         Some(self.id.into())
///     }
/// }
///
/// let store = Store::new();
/// let events: Rc<RefCell<Vec<StoreEvent<Vm>>>> = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = events.clone();
/// let _sub = store.subscribe(move |event| sink.borrow_mut().push(event.clone()));
///
/// store.add_item(Vm { id: "vm-1", power: "on" }).unwrap();
/// store.add_item(Vm { id: "vm-2", power: "off" }).unwrap();
/// assert_eq!(store.len(), 2);
///
/// // Nothing is emitted until the deferred flush runs
/// assert!(events.borrow().is_empty());
/// store.tick();
///
/// // One coalesced `add` for both keys, then the settle signal
/// assert_eq!(events.borrow().len(), 2);
/// assert!(matches!(events.borrow()[1], StoreEvent::Settle));
/// ```
pub struct Store<V> {
    pub(crate) inner: Rc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Keyed + Clone + 'static> Store<V> {
    /// Create an empty store with the default key extractor ([`Keyed::key`])
    /// and the default deferred scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Rc::new(DeferredScheduler::new()))
    }

    /// Create an empty store with an injected flush scheduler.
    pub fn with_scheduler(scheduler: Rc<dyn FlushScheduler>) -> Self {
        Self {
            inner: Rc::new(StoreInner::new(Rc::new(|v: &V| v.key()), scheduler)),
        }
    }
}

impl<V: Keyed + Clone + 'static> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + 'static> Store<V> {
    /// Create an empty store with a custom key extractor, for value types
    /// that do not implement [`Keyed`].
    ///
    /// Note that [`touch`](Store::touch) requires `V: Keyed` for its
    /// composite check, so it is unavailable on stores built this way.
    pub fn with_extractor(extractor: impl Fn(&V) -> Option<Key> + 'static) -> Self {
        Self {
            inner: Rc::new(StoreInner::new(
                Rc::new(extractor),
                Rc::new(DeferredScheduler::new()),
            )),
        }
    }

    /// Replace this store's key extractor.
    pub fn set_key_extractor(&self, extractor: impl Fn(&V) -> Option<Key> + 'static) {
        *self.inner.extractor.borrow_mut() = Rc::new(extractor);
    }

    fn derive_key(&self, value: &V) -> Result<Key, StoreError> {
        (self.inner.extractor.borrow())(value).ok_or(StoreError::InvalidKey)
    }

    // =========================================================================
    // MUTATIONS (explicit key)
    // =========================================================================

    /// Insert a new entry. Fails with `DuplicateItem` if the key exists.
    pub fn add(&self, key: impl Into<Key>, value: V) -> Result<(), StoreError> {
        self.inner.add(key.into(), value)
    }

    /// Insert or overwrite unconditionally.
    pub fn set(&self, key: impl Into<Key>, value: V) {
        self.inner.set(key.into(), value);
    }

    /// Overwrite an existing entry. Fails with `NoSuchItem` if absent.
    pub fn update(&self, key: impl Into<Key>, value: V) -> Result<(), StoreError> {
        self.inner.update(key.into(), value)
    }

    /// Delete an entry. Fails with `NoSuchItem` if absent.
    pub fn remove(&self, key: impl Into<Key>) -> Result<(), StoreError> {
        self.inner.remove(key.into())
    }

    /// Delete an entry if present; silently a no-op otherwise.
    pub fn unset(&self, key: impl Into<Key>) {
        self.inner.unset(key.into());
    }

    /// Remove every entry, recording a removal per key.
    pub fn clear(&self) {
        self.inner.clear();
    }

    // =========================================================================
    // MUTATIONS (key derived from the value)
    // =========================================================================

    /// [`add`](Store::add) with the key derived by the extractor.
    pub fn add_item(&self, value: V) -> Result<(), StoreError> {
        let key = self.derive_key(&value)?;
        self.inner.add(key, value)
    }

    /// [`set`](Store::set) with the key derived by the extractor.
    pub fn set_item(&self, value: V) -> Result<(), StoreError> {
        let key = self.derive_key(&value)?;
        self.inner.set(key, value);
        Ok(())
    }

    /// [`update`](Store::update) with the key derived by the extractor.
    pub fn update_item(&self, value: V) -> Result<(), StoreError> {
        let key = self.derive_key(&value)?;
        self.inner.update(key, value)
    }

    /// [`remove`](Store::remove) with the key derived by the extractor.
    pub fn remove_item(&self, value: &V) -> Result<(), StoreError> {
        let key = self.derive_key(value)?;
        self.inner.remove(key)
    }

    /// [`unset`](Store::unset) with the key derived by the extractor.
    /// Key derivation can still fail; a missing entry cannot.
    pub fn unset_item(&self, value: &V) -> Result<(), StoreError> {
        let key = self.derive_key(value)?;
        self.inner.unset(key);
        Ok(())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Current value for `key`. Fails with `NoSuchItem` if absent.
    pub fn get(&self, key: impl Into<Key>) -> Result<V, StoreError> {
        let key = key.into();
        match self.inner.items.borrow().get(&key) {
            Some(value) => Ok(value.clone()),
            None => Err(StoreError::NoSuchItem(key)),
        }
    }

    /// Current value for `key`, or `default` if absent. Never fails.
    pub fn get_or(&self, key: impl Into<Key>, default: V) -> V {
        self.inner
            .items
            .borrow()
            .get(&key.into())
            .cloned()
            .unwrap_or(default)
    }

    /// Pure membership test.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.inner.items.borrow().contains_key(&key.into())
    }

    /// Number of entries currently in the store.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restartable `(key, value)` cursor; call again for a fresh one.
    /// Weakly consistent under concurrent mutation: keys removed after the
    /// cursor was created are skipped, values are read at step time.
    pub fn entries(&self) -> Entries<V> {
        Entries::new(self.inner.clone())
    }

    /// Restartable key cursor over the keys present at call time.
    pub fn keys(&self) -> Keys {
        Keys::new(&self.inner)
    }

    /// Restartable value cursor; same consistency as [`entries`](Store::entries).
    pub fn values(&self) -> Values<V> {
        Values::new(self.entries())
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Register a listener for batched change events.
    ///
    /// The returned [`Subscription`] detaches the listener when
    /// [`unsubscribe`](Subscription::unsubscribe)d; dropping it without
    /// unsubscribing leaves the listener attached for the store's lifetime.
    pub fn subscribe(&self, listener: impl FnMut(&StoreEvent<V>) + 'static) -> Subscription<V> {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);

        self.inner
            .listeners
            .borrow_mut()
            .push(Rc::new(ListenerSlot::new(id, Box::new(listener))));

        Subscription {
            store: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Run the scheduler's pending automatic flushes.
    pub fn tick(&self) {
        self.inner.scheduler.run_pending();
    }

    /// The scheduler this store defers its automatic flushes to.
    pub fn scheduler(&self) -> Rc<dyn FlushScheduler> {
        self.inner.scheduler.clone()
    }
}

impl<V: Keyed + Clone + 'static> Store<V> {
    /// Record that an existing composite value's internal state changed
    /// externally, without replacing the stored value. Returns the current
    /// value. Fails with `NoSuchItem` if absent, `IllegalTouch` if the
    /// value is not composite.
    pub fn touch(&self, key: impl Into<Key>) -> Result<V, StoreError> {
        let key = key.into();
        let current = match self.inner.items.borrow().get(&key) {
            Some(value) => value.clone(),
            None => return Err(StoreError::NoSuchItem(key)),
        };
        if !current.is_composite() {
            return Err(StoreError::IllegalTouch(key));
        }

        self.inner.notify_indexes(ChangeKind::Updated, &key, &current);
        self.inner.record(key, ChangeKind::Updated);
        Ok(current)
    }

    /// [`touch`](Store::touch) with the key derived by the extractor.
    pub fn touch_item(&self, value: &V) -> Result<V, StoreError> {
        let key = self.derive_key(value)?;
        self.touch(key)
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("items", &*self.inner.items.borrow())
            .field("pending", &self.inner.pending.borrow().len())
            .field("buffer_depth", &self.inner.buffer_depth.get())
            .finish()
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle to a registered listener.
pub struct Subscription<V> {
    store: Weak<StoreInner<V>>,
    id: u64,
}

impl<V> Subscription<V> {
    /// Detach the listener. Safe to call mid-dispatch: the listener stops
    /// receiving events immediately, including the rest of the current
    /// batch.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.store.upgrade() {
            let mut listeners = inner.listeners.borrow_mut();
            for slot in listeners.iter() {
                if slot.id == self.id {
                    slot.active.set(false);
                }
            }
            listeners.retain(|slot| slot.id != self.id);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
