//! Container instances: one scope, one cache, an optional parent.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::collection::Framework;
use crate::context::{self, AnyArc, ConstructionContext};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::identifier::{Identifier, IdentifierValue};
use crate::resolver::{downcast, ResolveOptions, Resolver};
use crate::scope::ScopePath;

/// The well-known identifier every provider answers with itself.
pub const PROVIDER: Identifier<Provider> = Identifier::new("FrameworkProvider");

struct ProviderInner {
  collection: Framework,
  scope: ScopePath,
  parent: Option<Provider>,
  cache: DashMap<IdentifierValue, AnyArc>,
  root: Mutex<Option<(IdentifierValue, AnyArc)>>,
  children: Mutex<Vec<Weak<ProviderInner>>>,
  event_bus: EventBus,
  disposed: AtomicBool,
}

/// A resolved container bound to one collection, one scope and one cache.
///
/// Cloning is cheap and yields another handle to the same container. Cached
/// instances live until the provider is disposed or the last handle dropped.
///
/// Components that take the provider itself as a dependency (via
/// [`PROVIDER`]) form a reference cycle with its cache; [`Provider::dispose`]
/// breaks it. Components that only need a back reference should hold a
/// [`WeakProvider`], which is what [`Component`](crate::Component) does.
#[derive(Clone)]
pub struct Provider {
  inner: Arc<ProviderInner>,
}

impl Provider {
  pub(crate) fn new(collection: Framework, scope: ScopePath, parent: Option<Provider>) -> Self {
    debug!(%scope, has_parent = parent.is_some(), "creating provider");
    let event_bus = EventBus::new(scope.clone(), parent.as_ref().map(|parent| parent.event_bus().clone()));
    Self {
      inner: Arc::new(ProviderInner {
        collection,
        scope,
        parent,
        cache: DashMap::new(),
        root: Mutex::new(None),
        children: Mutex::new(Vec::new()),
        event_bus,
        disposed: AtomicBool::new(false),
      }),
    }
  }

  /// Identifier under which components can depend on their own provider.
  pub fn identifier() -> Identifier<Provider> {
    PROVIDER
  }

  pub fn collection(&self) -> &Framework {
    &self.inner.collection
  }

  pub fn scope(&self) -> &ScopePath {
    &self.inner.scope
  }

  pub fn parent(&self) -> Option<&Provider> {
    self.inner.parent.as_ref()
  }

  pub fn downgrade(&self) -> WeakProvider {
    WeakProvider(Arc::downgrade(&self.inner))
  }

  /// `true` if both handles point at the same container.
  pub fn ptr_eq(&self, other: &Provider) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  // --- Resolution ---

  pub fn get<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Arc<T>> {
    Resolver::new(self).get(identifier)
  }

  pub fn get_with<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
    options: ResolveOptions,
  ) -> Result<Arc<T>> {
    Resolver::new(self).get_with(identifier, options)
  }

  /// Like [`get`](Self::get), but `Ok(None)` when nothing is registered along
  /// the parent chain. Every other error still propagates.
  pub fn get_optional<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Option<Arc<T>>> {
    Resolver::new(self).get_optional(identifier)
  }

  /// Every registered variant, in registration order.
  pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Vec<Arc<T>>> {
    Resolver::new(self).get_all(identifier)
  }

  pub fn get_all_by_variant<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
  ) -> Result<Vec<(Cow<'static, str>, Arc<T>)>> {
    Resolver::new(self).get_all_by_variant(identifier, ResolveOptions::default())
  }

  /// Builds a fresh, uncached instance of an entity registered in this
  /// provider's own scope, with `id` and `props` available to its
  /// [`Entity`](crate::Entity) base.
  pub fn create_entity<T, P>(&self, identifier: &Identifier<T>, id: impl Into<Arc<str>>, props: P) -> Result<Arc<T>>
  where
    T: ?Sized + Send + Sync + 'static,
    P: Any + Send + Sync,
  {
    let instance = self.create_entity_raw(identifier.value(), id.into(), Arc::new(props))?;
    downcast(identifier.value(), &instance)
  }

  fn create_entity_raw(&self, identifier: &IdentifierValue, id: Arc<str>, props: AnyArc) -> Result<AnyArc> {
    debug!(%identifier, entity_id = %id, scope = %self.scope(), "creating entity");
    let resolver = Resolver::new(self);
    let instance = context::with_context(ConstructionContext::entity(id, props), || {
      resolver.get_raw(identifier, ResolveOptions::entity())
    })?;
    instance.ok_or_else(|| Error::ServiceNotFound {
      identifier: identifier.clone(),
    })
  }

  /// Creates a child provider whose scope is this one's extended by the root
  /// identifier's name, and builds the root entity inside it.
  ///
  /// The child has its own cache and falls back to this provider for
  /// anything not registered in its scope. It is disposed along with this
  /// provider.
  pub fn create_scope<T, P>(&self, root: &Identifier<T>, id: impl Into<Arc<str>>, props: P) -> Result<ScopeHandle<T>>
  where
    T: ?Sized + Send + Sync + 'static,
    P: Any + Send + Sync,
  {
    self.ensure_alive()?;
    let scope = self.scope().child(root.name().to_owned());
    let child = self.collection().provider_at(scope, Some(self));

    let instance = child.create_entity_raw(root.value(), id.into(), Arc::new(props))?;
    downcast::<T>(root.value(), &instance)?;
    *child.inner.root.lock() = Some((root.value().clone(), instance));

    let mut children = self.inner.children.lock();
    children.retain(|weak| weak.strong_count() > 0);
    children.push(Arc::downgrade(&child.inner));

    Ok(ScopeHandle {
      provider: child,
      _marker: PhantomData,
    })
  }

  // --- Events ---

  pub fn event_bus(&self) -> &EventBus {
    &self.inner.event_bus
  }

  /// Emits `event` on this provider's bus; it bubbles up to every ancestor.
  /// Returns how many listeners handled it.
  pub fn emit_event<P: Any + Send + Sync>(&self, event: &Event<P>, payload: P) -> Result<usize> {
    self.ensure_alive()?;
    Ok(self.inner.event_bus.emit(event, payload))
  }

  // --- Lifecycle ---

  /// Tears the provider down: child scopes first, then the scope root and
  /// every cached instance. Later resolution fails with [`Error::Disposed`].
  /// Calling it again is a no-op.
  pub fn dispose(&self) {
    if self.inner.disposed.swap(true, Ordering::AcqRel) {
      return;
    }

    let children = std::mem::take(&mut *self.inner.children.lock());
    for child in children.iter().filter_map(Weak::upgrade) {
      Provider { inner: child }.dispose();
    }

    let root = self.inner.root.lock().take();
    drop(root);
    self.inner.cache.clear();
    self.inner.event_bus.clear();
    debug!(scope = %self.scope(), "provider disposed");
  }

  pub fn is_disposed(&self) -> bool {
    self.inner.disposed.load(Ordering::Acquire)
  }

  /// Number of instances currently cached. Diagnostic only.
  pub fn cached_count(&self) -> usize {
    self.inner.cache.len()
  }

  // --- Internals used by the resolver ---

  pub(crate) fn ensure_alive(&self) -> Result<()> {
    if self.is_disposed() {
      return Err(Error::Disposed {
        scope: self.scope().clone(),
      });
    }
    Ok(())
  }

  pub(crate) fn cached(&self, identifier: &IdentifierValue) -> Option<AnyArc> {
    self.inner.cache.get(identifier).map(|entry| Arc::clone(entry.value()))
  }

  /// Inserts unless another resolution got there first; returns the winner.
  pub(crate) fn cache_insert(&self, identifier: IdentifierValue, instance: AnyArc) -> AnyArc {
    Arc::clone(self.inner.cache.entry(identifier).or_insert(instance).value())
  }

  /// Subscribes a freshly built instance to the handlers declared for it.
  pub(crate) fn bind_event_handlers(&self, identifier: &IdentifierValue, instance: &AnyArc) {
    for handler in self.collection().event_handlers(identifier, self.scope()) {
      trace!(%identifier, event = %handler.event(), scope = %self.scope(), "binding event handler");
      if let Err(error) = handler.bind(&self.inner.event_bus, instance) {
        warn!(%identifier, %error, "could not bind event handler");
      }
    }
  }

  pub(crate) fn root_instance(&self, identifier: &IdentifierValue) -> Option<AnyArc> {
    match &*self.inner.root.lock() {
      Some((root, instance)) if root == identifier => Some(Arc::clone(instance)),
      _ => None,
    }
  }
}

impl fmt::Debug for Provider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Provider")
      .field("scope", self.scope())
      .field("cached", &self.cached_count())
      .field("disposed", &self.is_disposed())
      .finish()
  }
}

/// A non-owning reference to a [`Provider`].
#[derive(Clone)]
pub struct WeakProvider(Weak<ProviderInner>);

impl WeakProvider {
  pub fn upgrade(&self) -> Option<Provider> {
    self.0.upgrade().map(|inner| Provider { inner })
  }
}

impl fmt::Debug for WeakProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.upgrade() {
      Some(provider) => write!(f, "WeakProvider({})", provider.scope()),
      None => f.write_str("WeakProvider(<dropped>)"),
    }
  }
}

/// Owner of a scope created by [`Provider::create_scope`].
///
/// The handle owns the child provider, which in turn owns the root entity.
/// Dereferences to the child [`Provider`].
pub struct ScopeHandle<T: ?Sized> {
  provider: Provider,
  _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ScopeHandle<T> {
  /// The root entity, until the scope is disposed.
  pub fn root(&self) -> Result<Arc<T>> {
    let root = self.provider.inner.root.lock();
    match &*root {
      Some((identifier, instance)) => downcast(identifier, instance),
      None => Err(Error::Disposed {
        scope: self.provider.scope().clone(),
      }),
    }
  }

  pub fn provider(&self) -> &Provider {
    &self.provider
  }

  pub fn into_provider(self) -> Provider {
    self.provider
  }
}

impl<T: ?Sized> Deref for ScopeHandle<T> {
  type Target = Provider;

  fn deref(&self) -> &Provider {
    &self.provider
  }
}

impl<T: ?Sized> Clone for ScopeHandle<T> {
  fn clone(&self) -> Self {
    Self {
      provider: self.provider.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T: ?Sized> fmt::Debug for ScopeHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ScopeHandle").field(&self.provider).finish()
  }
}
