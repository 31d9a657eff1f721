//! Component bases.
//!
//! Types registered with the framework embed one of these to learn, at
//! construction time, which provider built them:
//!
//! - [`Component`]: the owning provider.
//! - [`Entity`]: plus an externally assigned id and props.
//! - [`LayerRoot`]: an entity anchoring a scope, forwarding container
//!   operations and event emission to the scope's provider.
//!
//! Each base is built with `new()` inside a factory and fails when called
//! anywhere else.

use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::context;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::identifier::Identifier;
use crate::provider::{Provider, ScopeHandle, WeakProvider};
use crate::scope::ScopePath;

/// Holds a back reference to the provider that constructed it.
#[derive(Clone)]
pub struct Component {
  framework: WeakProvider,
  scope: ScopePath,
}

impl Component {
  /// Captures the provider from the active construction context.
  pub fn new() -> Result<Self> {
    let provider = context::current()
      .provider
      .ok_or(Error::NoConstructionContext)?;
    Ok(Self {
      framework: provider.downgrade(),
      scope: provider.scope().clone(),
    })
  }

  /// The owning provider, unless it has been disposed or dropped.
  pub fn framework(&self) -> Result<Provider> {
    self
      .framework
      .upgrade()
      .filter(|provider| !provider.is_disposed())
      .ok_or_else(|| Error::Disposed {
        scope: self.scope.clone(),
      })
  }

  pub fn scope(&self) -> &ScopePath {
    &self.scope
  }

  /// The event bus of the owning provider.
  pub fn event_bus(&self) -> Result<EventBus> {
    Ok(self.framework()?.event_bus().clone())
  }
}

impl fmt::Debug for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Component").field("scope", &self.scope).finish()
  }
}

/// A component with an externally supplied id and props.
pub struct Entity<P = ()> {
  component: Component,
  id: Arc<str>,
  props: Arc<P>,
}

impl<P: Any + Send + Sync> Entity<P> {
  /// Captures the provider, id and props from the active construction context.
  pub fn new() -> Result<Self> {
    let component = Component::new()?;
    let active = context::current();
    let id = active.entity_id.ok_or(Error::NoEntityContext)?;
    let props = active
      .props
      .ok_or(Error::NoEntityContext)?
      .downcast::<P>()
      .map_err(|_| Error::PropsMismatch {
        expected: type_name::<P>(),
      })?;
    Ok(Self { component, id, props })
  }
}

impl<P> Entity<P> {
  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn props(&self) -> &P {
    &self.props
  }

  pub fn component(&self) -> &Component {
    &self.component
  }
}

impl<P> Deref for Entity<P> {
  type Target = Component;

  fn deref(&self) -> &Component {
    &self.component
  }
}

impl<P> Clone for Entity<P> {
  fn clone(&self) -> Self {
    Self {
      component: self.component.clone(),
      id: Arc::clone(&self.id),
      props: Arc::clone(&self.props),
    }
  }
}

impl<P: fmt::Debug> fmt::Debug for Entity<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Entity")
      .field("id", &self.id)
      .field("scope", self.component.scope())
      .field("props", &self.props)
      .finish()
  }
}

/// The root entity of a scope.
///
/// Forwards container operations to the provider the scope was created with.
/// The provider owns the root, not the other way around: disposing the
/// provider (or its [`ScopeHandle`]) drops the root.
pub struct LayerRoot<P = ()> {
  entity: Entity<P>,
}

impl<P: Any + Send + Sync> LayerRoot<P> {
  pub fn new() -> Result<Self> {
    Ok(Self { entity: Entity::new()? })
  }
}

impl<P> LayerRoot<P> {
  pub fn entity(&self) -> &Entity<P> {
    &self.entity
  }

  pub fn get<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Arc<T>> {
    self.framework()?.get(identifier)
  }

  pub fn get_optional<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Option<Arc<T>>> {
    self.framework()?.get_optional(identifier)
  }

  pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Vec<Arc<T>>> {
    self.framework()?.get_all(identifier)
  }

  pub fn get_all_by_variant<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
  ) -> Result<Vec<(Cow<'static, str>, Arc<T>)>> {
    self.framework()?.get_all_by_variant(identifier)
  }

  pub fn create_entity<T, Q>(&self, identifier: &Identifier<T>, id: impl Into<Arc<str>>, props: Q) -> Result<Arc<T>>
  where
    T: ?Sized + Send + Sync + 'static,
    Q: Any + Send + Sync,
  {
    self.framework()?.create_entity(identifier, id, props)
  }

  pub fn create_scope<T, Q>(&self, root: &Identifier<T>, id: impl Into<Arc<str>>, props: Q) -> Result<ScopeHandle<T>>
  where
    T: ?Sized + Send + Sync + 'static,
    Q: Any + Send + Sync,
  {
    self.framework()?.create_scope(root, id, props)
  }

  pub fn emit_event<Q: Any + Send + Sync>(&self, event: &Event<Q>, payload: Q) -> Result<usize> {
    self.framework()?.emit_event(event, payload)
  }
}

impl<P> Deref for LayerRoot<P> {
  type Target = Entity<P>;

  fn deref(&self) -> &Entity<P> {
    &self.entity
  }
}

impl<P: fmt::Debug> fmt::Debug for LayerRoot<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("LayerRoot").field(&self.entity).finish()
  }
}
