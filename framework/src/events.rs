//! Typed events delivered through a per-provider bus.
//!
//! Every [`Provider`](crate::Provider) owns an [`EventBus`] chained to its
//! parent's. Emitting on a bus notifies its own listeners first and then
//! bubbles up through every ancestor, so a service in the root scope hears
//! events raised inside any workspace or document scope, never the reverse.
//!
//! Listeners come from two places: ad hoc subscriptions through
//! [`EventBus::on`], and handlers declared at registration time with
//! [`FrameworkEditor::on_event`](crate::FrameworkEditor::on_event). The latter
//! are bound to a component when it is constructed and hold it weakly.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::context::AnyArc;
use crate::error::{Error, Result};
use crate::identifier::{Identifier, IdentifierValue, DEFAULT_VARIANT};
use crate::resolver::downcast;
use crate::scope::ScopePath;

type Payload = dyn Any + Send + Sync;
type ListenerFn = dyn Fn(&Payload) -> Result<()> + Send + Sync;
type AliveFn = dyn Fn() -> bool + Send + Sync;
type BindFn = dyn Fn(&EventBus, &AnyArc) -> Result<Subscription> + Send + Sync;

/// A named event carrying a payload of type `P`.
///
/// ```
/// use fibre_framework::Event;
///
/// const DOC_OPENED: Event<String> = Event::new("DocOpened");
/// assert_eq!(DOC_OPENED.name(), "DocOpened");
/// ```
pub struct Event<P> {
  value: IdentifierValue,
  _marker: PhantomData<fn(P)>,
}

impl<P> Event<P> {
  pub const fn new(name: &'static str) -> Self {
    Self {
      value: IdentifierValue::from_static(name, DEFAULT_VARIANT),
      _marker: PhantomData,
    }
  }

  pub fn name(&self) -> &str {
    self.value.name()
  }

  pub fn value(&self) -> &IdentifierValue {
    &self.value
  }
}

impl<P> Clone for Event<P> {
  fn clone(&self) -> Self {
    Self {
      value: self.value.clone(),
      _marker: PhantomData,
    }
  }
}

impl<P> fmt::Debug for Event<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Event<{}>{}", type_name::<P>(), self.value)
  }
}

fn payload_of<'p, P: Any>(event: &IdentifierValue, payload: &'p Payload) -> Result<&'p P> {
  payload.downcast_ref::<P>().ok_or_else(|| Error::EventPayloadMismatch {
    event: event.clone(),
    expected: type_name::<P>(),
  })
}

struct Listener {
  id: u64,
  callback: Arc<ListenerFn>,
  // Set for handlers bound to a component; the listener dies with it.
  alive: Option<Box<AliveFn>>,
}

impl Listener {
  fn is_alive(&self) -> bool {
    self.alive.as_ref().map_or(true, |alive| alive())
  }
}

struct EventBusInner {
  scope: ScopePath,
  parent: Option<EventBus>,
  listeners: RwLock<IndexMap<IdentifierValue, Vec<Listener>>>,
  next_id: AtomicU64,
}

/// The event bus of one provider.
#[derive(Clone)]
pub struct EventBus {
  inner: Arc<EventBusInner>,
}

impl EventBus {
  pub(crate) fn new(scope: ScopePath, parent: Option<EventBus>) -> Self {
    Self {
      inner: Arc::new(EventBusInner {
        scope,
        parent,
        listeners: RwLock::new(IndexMap::new()),
        next_id: AtomicU64::new(0),
      }),
    }
  }

  pub fn scope(&self) -> &ScopePath {
    &self.inner.scope
  }

  pub fn parent(&self) -> Option<&EventBus> {
    self.inner.parent.as_ref()
  }

  /// Subscribes `listener` to `event` on this bus.
  ///
  /// The listener stays subscribed until [`Subscription::unsubscribe`] is
  /// called or the bus is cleared by disposing its provider; dropping the
  /// returned handle does not unsubscribe.
  pub fn on<P: Any + Send + Sync>(
    &self,
    event: &Event<P>,
    listener: impl Fn(&P) -> Result<()> + Send + Sync + 'static,
  ) -> Subscription {
    let key = event.value().clone();
    self.subscribe(
      event.value().clone(),
      None,
      Arc::new(move |payload: &Payload| listener(payload_of::<P>(&key, payload)?)),
    )
  }

  pub(crate) fn subscribe(
    &self,
    event: IdentifierValue,
    alive: Option<Box<AliveFn>>,
    callback: Arc<ListenerFn>,
  ) -> Subscription {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    trace!(%event, scope = %self.inner.scope, listener = id, "subscribed to event");
    self
      .inner
      .listeners
      .write()
      .entry(event.clone())
      .or_default()
      .push(Listener { id, callback, alive });
    Subscription {
      bus: Arc::downgrade(&self.inner),
      event,
      id,
    }
  }

  /// Delivers `payload` to this bus's listeners, then to every ancestor's.
  ///
  /// A failing listener is logged and does not stop delivery. Returns how many
  /// listeners handled the event successfully.
  pub fn emit<P: Any + Send + Sync>(&self, event: &Event<P>, payload: P) -> usize {
    self.emit_raw(event.value(), &payload)
  }

  fn emit_raw(&self, event: &IdentifierValue, payload: &Payload) -> usize {
    // Snapshot so listeners may subscribe or emit themselves.
    let callbacks: Vec<Arc<ListenerFn>> = {
      let mut listeners = self.inner.listeners.write();
      match listeners.get_mut(event) {
        Some(entries) => {
          entries.retain(Listener::is_alive);
          entries.iter().map(|listener| Arc::clone(&listener.callback)).collect()
        }
        None => Vec::new(),
      }
    };

    trace!(%event, scope = %self.inner.scope, listeners = callbacks.len(), "emitting event");
    let mut handled = 0;
    for callback in callbacks {
      match callback(payload) {
        Ok(()) => handled += 1,
        Err(error) => warn!(%event, scope = %self.inner.scope, %error, "event listener failed"),
      }
    }

    match &self.inner.parent {
      Some(parent) => handled + parent.emit_raw(event, payload),
      None => handled,
    }
  }

  /// Live listeners for `event` on this bus alone.
  pub fn listener_count<P>(&self, event: &Event<P>) -> usize {
    self
      .inner
      .listeners
      .read()
      .get(event.value())
      .map_or(0, |entries| entries.iter().filter(|listener| listener.is_alive()).count())
  }

  pub(crate) fn clear(&self) {
    self.inner.listeners.write().clear();
  }
}

impl fmt::Debug for EventBus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventBus")
      .field("scope", &self.inner.scope)
      .field("events", &self.inner.listeners.read().len())
      .finish()
  }
}

/// Handle to one listener, returned by [`EventBus::on`].
#[derive(Debug)]
pub struct Subscription {
  bus: Weak<EventBusInner>,
  event: IdentifierValue,
  id: u64,
}

impl Subscription {
  /// Removes the listener. Returns `false` if it was already gone.
  pub fn unsubscribe(self) -> bool {
    let Some(bus) = self.bus.upgrade() else {
      return false;
    };
    let mut listeners = bus.listeners.write();
    let Some(entries) = listeners.get_mut(&self.event) else {
      return false;
    };

    let before = entries.len();
    entries.retain(|listener| listener.id != self.id);
    let removed = entries.len() != before;
    if entries.is_empty() {
      listeners.shift_remove(&self.event);
    }
    removed
  }
}

/// A handler declared at registration time, bound to each instance of its
/// component as the instance is constructed.
#[derive(Clone)]
pub(crate) struct EventHandler {
  event: IdentifierValue,
  bind: Arc<BindFn>,
}

impl EventHandler {
  pub(crate) fn new<T, P>(
    component: &Identifier<T>,
    event: &Event<P>,
    handler: impl Fn(&T, &P) -> Result<()> + Send + Sync + 'static,
  ) -> Self
  where
    T: ?Sized + Send + Sync + 'static,
    P: Any + Send + Sync,
  {
    let component = component.value().clone();
    let key = event.value().clone();
    let handler = Arc::new(handler);

    let bind = move |bus: &EventBus, instance: &AnyArc| -> Result<Subscription> {
      // Weak on the typed instance, which outlives the erased wrapper.
      let target: Weak<T> = Arc::downgrade(&downcast::<T>(&component, instance)?);
      let alive = target.clone();
      let handler = Arc::clone(&handler);
      let key = key.clone();
      Ok(bus.subscribe(
        key.clone(),
        Some(Box::new(move || alive.strong_count() > 0) as Box<AliveFn>),
        Arc::new(move |payload: &Payload| match target.upgrade() {
          Some(instance) => handler(&*instance, payload_of::<P>(&key, payload)?),
          None => Ok(()),
        }),
      ))
    };

    Self {
      event: event.value().clone(),
      bind: Arc::new(bind),
    }
  }

  pub(crate) fn event(&self) -> &IdentifierValue {
    &self.event
  }

  pub(crate) fn bind(&self, bus: &EventBus, instance: &AnyArc) -> Result<Subscription> {
    (self.bind)(bus, instance)
  }
}

impl fmt::Debug for EventHandler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventHandler").field("event", &self.event).finish_non_exhaustive()
  }
}
