use fibre_framework::{Component, Entity, Error, Event, Framework, Identifier, LayerRoot};
use pretty_assertions::assert_eq;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Mutex,
};

// --- Test Fixtures ---

const DOC_UPDATED: Event<String> = Event::new("DocUpdated");

#[derive(Default)]
struct AuditLog {
  entries: Mutex<Vec<String>>,
}

struct Workspace {
  root: LayerRoot<()>,
}

#[derive(Default)]
struct WorkspaceIndexer {
  indexed: Mutex<Vec<String>>,
}

fn workspace() -> Identifier<Workspace> {
  Identifier::of()
}

/// AuditLog at the root, WorkspaceIndexer inside the workspace scope; both
/// listen for DOC_UPDATED.
fn build_framework() -> Framework {
  let framework = Framework::new();
  framework
    .edit()
    .service((), |()| Ok(AuditLog::default()))
    .unwrap()
    .on_event(&Identifier::<AuditLog>::of(), &DOC_UPDATED, |log, doc| {
      log.entries.lock().unwrap().push(format!("updated {doc}"));
      Ok(())
    })
    .layer((), |()| Ok(Workspace { root: LayerRoot::new()? }))
    .unwrap()
    .service((), |()| Ok(WorkspaceIndexer::default()))
    .unwrap()
    .on_event(&Identifier::<WorkspaceIndexer>::of(), &DOC_UPDATED, |indexer, doc| {
      indexer.indexed.lock().unwrap().push(doc.clone());
      Ok(())
    });
  framework
}

// --- Event Tests ---

#[test]
fn test_handlers_bind_when_the_component_is_built() {
  let framework = build_framework();
  let root = framework.provider();

  // Nothing constructed yet, so nothing listens.
  assert_eq!(root.emit_event(&DOC_UPDATED, "doc-0".to_string()).unwrap(), 0);

  let log = root.get(&Identifier::<AuditLog>::of()).unwrap();
  assert_eq!(root.emit_event(&DOC_UPDATED, "doc-1".to_string()).unwrap(), 1);

  // Resolving again hits the cache and does not bind a second time.
  root.get(&Identifier::<AuditLog>::of()).unwrap();
  assert_eq!(root.emit_event(&DOC_UPDATED, "doc-2".to_string()).unwrap(), 1);

  assert_eq!(*log.entries.lock().unwrap(), vec!["updated doc-1", "updated doc-2"]);
}

#[test]
fn test_events_bubble_up_but_not_down() {
  let framework = build_framework();
  let root = framework.provider();
  let log = root.get(&Identifier::<AuditLog>::of()).unwrap();

  let ws = root.create_scope(&workspace(), "ws-1", ()).unwrap();
  let indexer = ws.get(&Identifier::<WorkspaceIndexer>::of()).unwrap();

  assert_eq!(ws.emit_event(&DOC_UPDATED, "from-ws".to_string()).unwrap(), 2);
  assert_eq!(root.emit_event(&DOC_UPDATED, "from-root".to_string()).unwrap(), 1);

  assert_eq!(*indexer.indexed.lock().unwrap(), vec!["from-ws"]);
  assert_eq!(
    *log.entries.lock().unwrap(),
    vec!["updated from-ws", "updated from-root"]
  );
}

#[test]
fn test_sibling_scopes_do_not_hear_each_other() {
  let framework = build_framework();
  let root = framework.provider();

  let first = root.create_scope(&workspace(), "ws-1", ()).unwrap();
  let second = root.create_scope(&workspace(), "ws-2", ()).unwrap();
  let first_indexer = first.get(&Identifier::<WorkspaceIndexer>::of()).unwrap();
  let second_indexer = second.get(&Identifier::<WorkspaceIndexer>::of()).unwrap();

  first.emit_event(&DOC_UPDATED, "only-first".to_string()).unwrap();

  assert_eq!(*first_indexer.indexed.lock().unwrap(), vec!["only-first"]);
  assert!(second_indexer.indexed.lock().unwrap().is_empty());
}

#[test]
fn test_layer_root_emits_on_its_own_scope() {
  let framework = build_framework();
  let root = framework.provider();

  let ws = root.create_scope(&workspace(), "ws-1", ()).unwrap();
  let indexer = ws.get(&Identifier::<WorkspaceIndexer>::of()).unwrap();
  let ws_root = ws.root().unwrap();

  assert_eq!(ws_root.root.emit_event(&DOC_UPDATED, "via-root".to_string()).unwrap(), 1);
  assert_eq!(*indexer.indexed.lock().unwrap(), vec!["via-root"]);
  assert_eq!(ws_root.root.event_bus().unwrap().scope(), ws.scope());
}

#[test]
fn test_component_event_bus_subscription() {
  struct Notifier {
    component: Component,
  }

  const SAVED: Event<u32> = Event::new("Saved");

  let framework = Framework::new();
  framework
    .edit()
    .service((), |()| Ok(Notifier { component: Component::new()? }))
    .unwrap();

  let provider = framework.provider();
  let notifier = provider.get(&Identifier::<Notifier>::of()).unwrap();
  let bus = notifier.component.event_bus().unwrap();

  let total = Arc::new(AtomicUsize::new(0));
  let sink = total.clone();
  let subscription = bus.on(&SAVED, move |bytes| {
    sink.fetch_add(*bytes as usize, Ordering::SeqCst);
    Ok(())
  });

  provider.emit_event(&SAVED, 40).unwrap();
  provider.emit_event(&SAVED, 2).unwrap();
  assert_eq!(total.load(Ordering::SeqCst), 42);

  assert!(subscription.unsubscribe());
  assert_eq!(provider.emit_event(&SAVED, 100).unwrap(), 0);
  assert_eq!(total.load(Ordering::SeqCst), 42);
}

#[test]
fn test_failing_listener_does_not_stop_delivery() {
  const PING: Event<()> = Event::new("Ping");

  let framework = Framework::new();
  let provider = framework.provider();
  let reached = Arc::new(AtomicUsize::new(0));

  provider.event_bus().on(&PING, |_| Err(Error::NoEntityContext));
  let counter = reached.clone();
  provider.event_bus().on(&PING, move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(())
  });

  assert_eq!(provider.emit_event(&PING, ()).unwrap(), 1);
  assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn test_payload_of_another_type_is_not_delivered() {
  const RENAMED: Event<String> = Event::new("Renamed");
  const RENAMED_BY_ID: Event<u32> = Event::new("Renamed");

  let framework = Framework::new();
  let provider = framework.provider();
  let heard = Arc::new(AtomicUsize::new(0));
  let counter = heard.clone();

  provider.event_bus().on(&RENAMED, move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(())
  });

  assert_eq!(provider.emit_event(&RENAMED_BY_ID, 7).unwrap(), 0);
  assert_eq!(heard.load(Ordering::SeqCst), 0);
  assert_eq!(provider.emit_event(&RENAMED, "draft".to_string()).unwrap(), 1);
}

#[test]
fn test_entity_handlers_end_with_the_entity() {
  struct Card {
    entity: Entity<()>,
    updates: AtomicUsize,
  }

  let framework = Framework::new();
  framework
    .edit()
    .entity((), |()| {
      Ok(Card {
        entity: Entity::new()?,
        updates: AtomicUsize::new(0),
      })
    })
    .unwrap()
    .on_event(&Identifier::<Card>::of(), &DOC_UPDATED, |card, _| {
      card.updates.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });

  let provider = framework.provider();
  let card = provider.create_entity(&Identifier::<Card>::of(), "card-1", ()).unwrap();
  assert_eq!(card.entity.id(), "card-1");
  assert_eq!(provider.event_bus().listener_count(&DOC_UPDATED), 1);

  provider.emit_event(&DOC_UPDATED, "doc".to_string()).unwrap();
  assert_eq!(card.updates.load(Ordering::SeqCst), 1);

  drop(card);
  assert_eq!(provider.event_bus().listener_count(&DOC_UPDATED), 0);
  assert_eq!(provider.emit_event(&DOC_UPDATED, "doc".to_string()).unwrap(), 0);
}

#[test]
fn test_dispose_clears_listeners() {
  let framework = build_framework();
  let root = framework.provider();
  root.get(&Identifier::<AuditLog>::of()).unwrap();
  assert_eq!(root.event_bus().listener_count(&DOC_UPDATED), 1);

  root.dispose();

  assert_eq!(root.event_bus().listener_count(&DOC_UPDATED), 0);
  assert!(matches!(
    root.emit_event(&DOC_UPDATED, "late".to_string()),
    Err(Error::Disposed { .. })
  ));
}
