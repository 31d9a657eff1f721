//! The registry of component factories.
//!
//! A [`Framework`] is a three-level map `scope -> identifier name -> variant ->
//! factory`. It never holds instances; those live in the cache of each
//! [`Provider`] built from it.
//!
//! Dependencies are not stored either. A registration such as
//!
//! ```text
//! editor.service((Identifier::<A>::of(),), |(a,)| Ok(B { a }))
//! ```
//!
//! is turned into a factory closure that resolves `A` through the resolver it
//! is handed and then calls the constructor, so dependencies are re-resolved
//! (from cache or freshly) every time the factory runs.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::context::AnyArc;
use crate::dependencies::Dependencies;
use crate::error::{Error, Result};
use crate::events::{Event, EventHandler};
use crate::identifier::{Identifier, IdentifierValue};
use crate::provider::Provider;
use crate::resolver::Resolver;
use crate::scope::ScopePath;

type FactoryFn = dyn Fn(&Resolver<'_>) -> Result<AnyArc> + Send + Sync;

/// How a registered component may be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
  /// Resolved and cached through `get`/`get_all`.
  Service,
  /// Built uncached through `create_entity`.
  Entity,
  /// The root entity of a scope, built through `create_scope`.
  Layer,
}

/// A registered factory together with its kind.
#[derive(Clone)]
pub struct ComponentFactory {
  kind: ComponentKind,
  factory: Arc<FactoryFn>,
}

impl ComponentFactory {
  pub(crate) fn new(
    kind: ComponentKind,
    factory: impl Fn(&Resolver<'_>) -> Result<AnyArc> + Send + Sync + 'static,
  ) -> Self {
    Self {
      kind,
      factory: Arc::new(factory),
    }
  }

  pub(crate) fn from_value<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
    let value: AnyArc = Arc::new(value);
    Self::new(ComponentKind::Service, move |_| Ok(Arc::clone(&value)))
  }

  pub fn kind(&self) -> ComponentKind {
    self.kind
  }

  pub(crate) fn call(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
    (self.factory)(resolver)
  }
}

impl fmt::Debug for ComponentFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComponentFactory")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

type Variants = IndexMap<Cow<'static, str>, ComponentFactory>;

#[derive(Clone, Default)]
struct Registry {
  components: IndexMap<ScopePath, IndexMap<Cow<'static, str>, Variants>>,
  handlers: IndexMap<ScopePath, IndexMap<IdentifierValue, Vec<EventHandler>>>,
}

/// Where and how [`Framework::add_factory`] stores a registration.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
  pub scope: ScopePath,
  pub override_existing: bool,
}

impl RegisterOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn scope(mut self, scope: ScopePath) -> Self {
    self.scope = scope;
    self
  }

  pub fn override_existing(mut self, override_existing: bool) -> Self {
    self.override_existing = override_existing;
    self
  }
}

/// A collection of component definitions.
///
/// Registration goes through [`Framework::edit`]; providers are created with
/// [`Framework::provider`] and [`Framework::provider_at`]. Providers share the
/// registry with the framework they were built from, so registrations made
/// later are visible to them for anything they have not cached yet.
///
/// `Clone` produces an independent collection holding the same factories.
///
/// ```
/// use fibre_framework::{Framework, Identifier};
/// use std::sync::Arc;
///
/// struct A { value: String }
/// struct B { a: Arc<A> }
/// struct C { b: Arc<B> }
///
/// # fn main() -> fibre_framework::Result<()> {
/// let framework = Framework::new();
/// framework
///   .edit()
///   .service((), |()| Ok(A { value: "hello world".into() }))?
///   .service((Identifier::<A>::of(),), |(a,)| Ok(B { a }))?
///   .service((Identifier::<B>::of(),), |(b,)| Ok(C { b }))?;
///
/// let provider = framework.provider();
/// assert_eq!(provider.get(&Identifier::<C>::of())?.b.a.value, "hello world");
/// # Ok(())
/// # }
/// ```
pub struct Framework {
  registry: Arc<RwLock<Registry>>,
}

impl Framework {
  pub fn new() -> Self {
    Self {
      registry: Arc::new(RwLock::new(Registry::default())),
    }
  }

  /// Another handle onto the same registry.
  pub(crate) fn share(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
    }
  }

  /// Starts a chain of registrations at the root scope.
  pub fn edit(&self) -> FrameworkEditor<'_> {
    FrameworkEditor {
      collection: self,
      current_scope: ScopePath::root(),
    }
  }

  /// The number of `(scope, identifier, variant)` registrations.
  pub fn component_count(&self) -> usize {
    self
      .registry
      .read()
      .components
      .values()
      .flat_map(|identifiers| identifiers.values())
      .map(|variants| variants.len())
      .sum()
  }

  pub fn add_factory<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
    factory: impl Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
    options: &RegisterOptions,
  ) -> Result<()> {
    let factory = ComponentFactory::new(ComponentKind::Service, move |resolver| {
      Ok(Arc::new(factory(resolver)?) as AnyArc)
    });
    self.insert(identifier.value(), factory, options)
  }

  pub fn add_value<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
    value: Arc<T>,
    options: &RegisterOptions,
  ) -> Result<()> {
    self.insert(identifier.value(), ComponentFactory::from_value(value), options)
  }

  pub(crate) fn insert(
    &self,
    identifier: &IdentifierValue,
    factory: ComponentFactory,
    options: &RegisterOptions,
  ) -> Result<()> {
    let mut registry = self.registry.write();
    let variants = registry
      .components
      .entry(options.scope.clone())
      .or_default()
      .entry(identifier.name_cow().clone())
      .or_default();

    if variants.contains_key(identifier.variant()) && !options.override_existing {
      debug!(%identifier, scope = %options.scope, "rejected duplicate registration");
      return Err(Error::DuplicateServiceDefinition {
        identifier: identifier.clone(),
      });
    }

    trace!(%identifier, scope = %options.scope, kind = ?factory.kind(), "registered component");
    variants.insert(identifier.variant_cow().clone(), factory);
    Ok(())
  }

  /// Deletes a registration. Returns whether anything was removed.
  pub fn remove<T: ?Sized>(&self, identifier: &Identifier<T>, scope: &ScopePath) -> bool {
    self.remove_value(identifier.value(), scope)
  }

  pub(crate) fn remove_value(&self, identifier: &IdentifierValue, scope: &ScopePath) -> bool {
    let mut registry = self.registry.write();
    let Some(identifiers) = registry.components.get_mut(scope) else {
      return false;
    };
    let Some(variants) = identifiers.get_mut(identifier.name()) else {
      return false;
    };

    let removed = variants.shift_remove(identifier.variant()).is_some();
    if variants.is_empty() {
      identifiers.shift_remove(identifier.name());
    }
    if removed {
      trace!(%identifier, %scope, "removed component");
    }
    removed
  }

  /// Exact-scope lookup; parent fallback is the resolver's job.
  pub fn get_factory(&self, identifier: &IdentifierValue, scope: &ScopePath) -> Option<ComponentFactory> {
    self
      .registry
      .read()
      .components
      .get(scope)?
      .get(identifier.name())?
      .get(identifier.variant())
      .cloned()
  }

  /// Every variant registered for the identifier's name in one scope, in
  /// registration order. `None` when the scope has no entry for the name.
  pub fn get_factory_all(
    &self,
    identifier: &IdentifierValue,
    scope: &ScopePath,
  ) -> Option<Vec<(Cow<'static, str>, ComponentFactory)>> {
    let registry = self.registry.read();
    let variants = registry.components.get(scope)?.get(identifier.name())?;
    Some(
      variants
        .iter()
        .map(|(variant, factory)| (variant.clone(), factory.clone()))
        .collect(),
    )
  }

  /// Declares that every instance of `identifier` built in `scope` handles
  /// `event`. Instances constructed before the declaration are not affected.
  pub fn add_event_handler<T, P>(
    &self,
    identifier: &Identifier<T>,
    event: &Event<P>,
    handler: impl Fn(&T, &P) -> Result<()> + Send + Sync + 'static,
    scope: &ScopePath,
  ) where
    T: ?Sized + Send + Sync + 'static,
    P: Any + Send + Sync,
  {
    trace!(identifier = %identifier.value(), event = %event.value(), %scope, "registered event handler");
    self
      .registry
      .write()
      .handlers
      .entry(scope.clone())
      .or_default()
      .entry(identifier.value().clone())
      .or_default()
      .push(EventHandler::new(identifier, event, handler));
  }

  pub(crate) fn event_handlers(&self, identifier: &IdentifierValue, scope: &ScopePath) -> Vec<EventHandler> {
    self
      .registry
      .read()
      .handlers
      .get(scope)
      .and_then(|identifiers| identifiers.get(identifier))
      .cloned()
      .unwrap_or_default()
  }

  /// A provider for the root scope with no parent.
  pub fn provider(&self) -> Provider {
    self.provider_at(ScopePath::root(), None)
  }

  /// A provider for `scope`, falling back to `parent` for anything not
  /// registered in that exact scope.
  pub fn provider_at(&self, scope: ScopePath, parent: Option<&Provider>) -> Provider {
    Provider::new(self.share(), scope, parent.cloned())
  }
}

impl Default for Framework {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for Framework {
  /// Copies the maps; factories are shared by reference.
  fn clone(&self) -> Self {
    Self {
      registry: Arc::new(RwLock::new(self.registry.read().clone())),
    }
  }
}

impl fmt::Debug for Framework {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Framework")
      .field("component_count", &self.component_count())
      .finish()
  }
}

/// Chains registrations against one [`Framework`], tracking the current scope.
///
/// Constructors return `Result` so that component bases such as
/// [`Entity::new`](crate::Entity::new) can be built with `?`.
pub struct FrameworkEditor<'a> {
  collection: &'a Framework,
  current_scope: ScopePath,
}

impl<'a> FrameworkEditor<'a> {
  pub fn current_scope(&self) -> &ScopePath {
    &self.current_scope
  }

  fn register(&mut self, identifier: &IdentifierValue, factory: ComponentFactory, override_existing: bool) -> Result<&mut Self> {
    let options = RegisterOptions {
      scope: self.current_scope.clone(),
      override_existing,
    };
    self.collection.insert(identifier, factory, &options)?;
    Ok(self)
  }

  // --- Services ---

  /// Registers `T` under `Identifier::<T>::of()`, built from `deps`.
  pub fn service<T, D>(
    &mut self,
    deps: D,
    ctor: impl Fn(D::Output) -> Result<T> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: Send + Sync + 'static,
    D: Dependencies,
  {
    let factory = dependencies_to_factory(ComponentKind::Service, deps, move |args| ctor(args).map(Arc::new));
    self.register(Identifier::<T>::of().value(), factory, false)
  }

  /// Registers `T` with a factory that resolves its own dependencies.
  pub fn service_factory<T>(
    &mut self,
    factory: impl Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: Send + Sync + 'static,
  {
    let factory = ComponentFactory::new(ComponentKind::Service, move |resolver| {
      Ok(Arc::new(Arc::new(factory(resolver)?)) as AnyArc)
    });
    self.register(Identifier::<T>::of().value(), factory, false)
  }

  /// Registers a ready-made `T`.
  pub fn service_value<T: Send + Sync + 'static>(&mut self, value: T) -> Result<&mut Self> {
    self.register(Identifier::<T>::of().value(), ComponentFactory::from_value(Arc::new(value)), false)
  }

  // --- Implementations of an identifier ---

  /// Registers an implementation for an arbitrary (possibly `dyn`) identifier.
  pub fn implement<T, D>(
    &mut self,
    identifier: &Identifier<T>,
    deps: D,
    ctor: impl Fn(D::Output) -> Result<Arc<T>> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
    D: Dependencies,
  {
    let factory = dependencies_to_factory(ComponentKind::Service, deps, ctor);
    self.register(identifier.value(), factory, false)
  }

  pub fn implement_factory<T>(
    &mut self,
    identifier: &Identifier<T>,
    factory: impl Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
  {
    let factory = ComponentFactory::new(ComponentKind::Service, move |resolver| {
      Ok(Arc::new(factory(resolver)?) as AnyArc)
    });
    self.register(identifier.value(), factory, false)
  }

  pub fn implement_value<T>(&mut self, identifier: &Identifier<T>, value: Arc<T>) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
  {
    self.register(identifier.value(), ComponentFactory::from_value(value), false)
  }

  // --- Entities and scopes ---

  /// Registers an entity type. Entities are only built by `create_entity`.
  pub fn entity<T, D>(
    &mut self,
    deps: D,
    ctor: impl Fn(D::Output) -> Result<T> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: Send + Sync + 'static,
    D: Dependencies,
  {
    let factory = dependencies_to_factory(ComponentKind::Entity, deps, move |args| ctor(args).map(Arc::new));
    self.register(Identifier::<T>::of().value(), factory, false)
  }

  /// Enters the scope rooted at `T` and registers `T` as that scope's root.
  ///
  /// Every registration chained after this lands in the new scope, which is
  /// the scope of the provider `create_scope(&Identifier::<T>::of(), ..)`
  /// creates.
  pub fn layer<T, D>(
    &mut self,
    deps: D,
    ctor: impl Fn(D::Output) -> Result<T> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: Send + Sync + 'static,
    D: Dependencies,
  {
    let identifier = Identifier::<T>::of();
    self.current_scope = self.current_scope.child(identifier.value().name_cow().clone());
    let factory = dependencies_to_factory(ComponentKind::Layer, deps, move |args| ctor(args).map(Arc::new));
    self.register(identifier.value(), factory, false)
  }

  /// Enters a plain named scope without registering a root.
  pub fn scope(&mut self, segment: impl Into<Cow<'static, str>>) -> &mut Self {
    self.current_scope = self.current_scope.child(segment);
    self
  }

  // --- Overrides ---

  /// Like [`implement`](Self::implement), replacing any existing registration.
  pub fn override_with<T, D>(
    &mut self,
    identifier: &Identifier<T>,
    deps: D,
    ctor: impl Fn(D::Output) -> Result<Arc<T>> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
    D: Dependencies,
  {
    let factory = dependencies_to_factory(ComponentKind::Service, deps, ctor);
    self.register(identifier.value(), factory, true)
  }

  pub fn override_factory<T>(
    &mut self,
    identifier: &Identifier<T>,
    factory: impl Fn(&Resolver<'_>) -> Result<Arc<T>> + Send + Sync + 'static,
  ) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
  {
    let factory = ComponentFactory::new(ComponentKind::Service, move |resolver| {
      Ok(Arc::new(factory(resolver)?) as AnyArc)
    });
    self.register(identifier.value(), factory, true)
  }

  pub fn override_value<T>(&mut self, identifier: &Identifier<T>, value: Arc<T>) -> Result<&mut Self>
  where
    T: ?Sized + Send + Sync + 'static,
  {
    self.register(identifier.value(), ComponentFactory::from_value(value), true)
  }

  // --- Events ---

  /// Makes every instance of `identifier` registered in the current scope
  /// handle `event`, emitted from this scope or any scope below it.
  pub fn on_event<T, P>(
    &mut self,
    identifier: &Identifier<T>,
    event: &Event<P>,
    handler: impl Fn(&T, &P) -> Result<()> + Send + Sync + 'static,
  ) -> &mut Self
  where
    T: ?Sized + Send + Sync + 'static,
    P: Any + Send + Sync,
  {
    self.collection.add_event_handler(identifier, event, handler, &self.current_scope);
    self
  }

  /// Removes the registration in the current scope, if any.
  pub fn remove<T: ?Sized>(&mut self, identifier: &Identifier<T>) -> &mut Self {
    self.collection.remove_value(identifier.value(), &self.current_scope);
    self
  }
}

/// Turns a dependency list and a constructor into a factory closure.
fn dependencies_to_factory<T, D, F>(kind: ComponentKind, deps: D, ctor: F) -> ComponentFactory
where
  T: ?Sized + Send + Sync + 'static,
  D: Dependencies,
  F: Fn(D::Output) -> Result<Arc<T>> + Send + Sync + 'static,
{
  ComponentFactory::new(kind, move |resolver| {
    let args = deps.resolve_all(resolver)?;
    Ok(Arc::new(ctor(args)?) as AnyArc)
  })
}
