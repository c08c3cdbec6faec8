use ripple_store::{
    ChangeKind, Index, Key, Keyed, Mutation, Store, StoreError, StoreEvent,
};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
struct Host {
    name: &'static str,
    pool: &'static str,
}

impl Keyed for Host {
    fn key(&self) -> Option<Key> {
        Some(self.name.into())
    }
}

fn host(name: &'static str, pool: &'static str) -> Host {
    Host { name, pool }
}

/// Records the raw mutation stream: kind and key, in delivery order.
#[derive(Default)]
struct Journal {
    log: RefCell<Vec<(ChangeKind, Key)>>,
}

impl Index<Host> for Journal {
    fn on_attach(&self, _store: &Store<Host>) {}

    fn on_detach(&self, _store: &Store<Host>) {}

    fn on_change(&self, mutation: &Mutation<'_, Host>) {
        self.log
            .borrow_mut()
            .push((mutation.kind, mutation.key.clone()));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn full_lifecycle_with_index_and_listener() {
    let store = Store::new();

    let journal = Rc::new(Journal::default());
    store.create_index("journal", journal.clone()).unwrap();

    let settles = Rc::new(RefCell::new(0));
    let settles_clone = settles.clone();
    let _ = store.subscribe(move |event| {
        if matches!(event, StoreEvent::Settle) {
            *settles_clone.borrow_mut() += 1;
        }
    });

    store.add_item(host("h1", "east")).unwrap();
    store.add_item(host("h2", "west")).unwrap();
    store.update_item(host("h1", "west")).unwrap();
    store.remove("h2").unwrap();
    store.tick();

    // The index saw all four raw mutations, uncoalesced and in order
    assert_eq!(
        *journal.log.borrow(),
        vec![
            (ChangeKind::Added, Key::from("h1")),
            (ChangeKind::Added, Key::from("h2")),
            (ChangeKind::Updated, Key::from("h1")),
            (ChangeKind::Removed, Key::from("h2")),
        ]
    );

    // Listeners saw one coalesced batch
    assert_eq!(*settles.borrow(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("h1").unwrap().pool, "west");
}

#[test]
fn index_attached_mid_scope_sees_only_later_mutations() {
    let store = Store::new();
    let journal = Rc::new(Journal::default());

    let handle = store.buffer_events();
    store.add_item(host("h1", "east")).unwrap();

    store.create_index("journal", journal.clone()).unwrap();
    store.add_item(host("h2", "west")).unwrap();
    handle.flush().unwrap();

    let log = journal.log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0], (ChangeKind::Added, Key::from("h2")));
}

#[test]
fn deleting_one_index_leaves_others_attached() {
    let store = Store::new();
    let kept = Rc::new(Journal::default());
    let dropped = Rc::new(Journal::default());

    store.create_index("kept", kept.clone()).unwrap();
    store.create_index("dropped", dropped.clone()).unwrap();
    store.delete_index("dropped").unwrap();

    store.add_item(host("h1", "east")).unwrap();
    assert_eq!(kept.log.borrow().len(), 1);
    assert!(dropped.log.borrow().is_empty());
}

#[test]
fn error_taxonomy_round_trip() {
    let store = Store::new();
    store.add_item(host("h1", "east")).unwrap();

    assert_eq!(
        store.add_item(host("h1", "east")),
        Err(StoreError::DuplicateItem("h1".into()))
    );
    assert_eq!(
        store.update("h9", host("h9", "east")),
        Err(StoreError::NoSuchItem("h9".into()))
    );
    assert_eq!(
        store.remove("h9"),
        Err(StoreError::NoSuchItem("h9".into()))
    );
    assert_eq!(
        store.delete_index("nope"),
        Err(StoreError::NoSuchIndex("nope".into()))
    );

    // unset swallows absence but nothing else does
    store.unset("h9");
    assert_eq!(store.len(), 1);
}

#[test]
fn touch_signals_external_mutation() {
    let store = Store::new();
    store.add_item(host("h1", "east")).unwrap();
    store.tick();

    let updates = Rc::new(RefCell::new(Vec::new()));
    let updates_clone = updates.clone();
    let _ = store.subscribe(move |event| {
        if let StoreEvent::Update(items) = event {
            updates_clone
                .borrow_mut()
                .extend(items.keys().cloned());
        }
    });

    let current = store.touch("h1").unwrap();
    assert_eq!(current.pool, "east");
    store.tick();

    assert_eq!(*updates.borrow(), vec![Key::from("h1")]);
}
