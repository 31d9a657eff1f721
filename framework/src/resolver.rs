//! Per-call-chain resolution.
//!
//! A fresh [`Resolver`] is created for every top-level `get`/`get_all`. Each
//! factory invocation receives a child resolver one level deeper whose stack
//! includes the identifier being built, which is how cycles and runaway chains
//! are caught.

use std::any::type_name;
use std::borrow::Cow;
use std::sync::Arc;

use tracing::trace;

use crate::collection::{ComponentFactory, ComponentKind};
use crate::context::{self, AnyArc, ConstructionContext};
use crate::error::{Error, Result};
use crate::identifier::{Identifier, IdentifierValue};
use crate::provider::{Provider, PROVIDER};

/// Resolution depth at which a chain is abandoned with
/// [`Error::RecursionLimit`], whether or not it repeats.
pub const RECURSION_LIMIT: usize = 100;

/// Per-call resolution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
  /// Do not fall back to the parent provider.
  pub same_scope: bool,
  /// Return nothing instead of [`Error::ServiceNotFound`].
  pub optional: bool,
  no_cache: bool,
}

impl ResolveOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn same_scope(mut self, same_scope: bool) -> Self {
    self.same_scope = same_scope;
    self
  }

  pub fn optional(mut self, optional: bool) -> Self {
    self.optional = optional;
    self
  }

  /// The discipline used for entities and scope roots: local scope only,
  /// always a fresh instance, never cached.
  pub(crate) fn entity() -> Self {
    Self {
      same_scope: true,
      optional: false,
      no_cache: true,
    }
  }
}

/// The dependency-resolution handle passed to every factory.
pub struct Resolver<'a> {
  provider: &'a Provider,
  depth: usize,
  stack: Vec<IdentifierValue>,
}

impl<'a> Resolver<'a> {
  pub(crate) fn new(provider: &'a Provider) -> Self {
    Self {
      provider,
      depth: 0,
      stack: Vec::new(),
    }
  }

  /// The provider this resolver is currently resolving against.
  pub fn provider(&self) -> &'a Provider {
    self.provider
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  /// The identifiers currently being constructed, outermost first.
  pub fn stack(&self) -> &[IdentifierValue] {
    &self.stack
  }

  pub fn get<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Arc<T>> {
    self.get_with(identifier, ResolveOptions::default())
  }

  pub fn get_with<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
    options: ResolveOptions,
  ) -> Result<Arc<T>> {
    let options = options.optional(false);
    match self.get_raw(identifier.value(), options)? {
      Some(instance) => downcast(identifier.value(), &instance),
      None => Err(Error::ServiceNotFound {
        identifier: identifier.value().clone(),
      }),
    }
  }

  pub fn get_optional<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
  ) -> Result<Option<Arc<T>>> {
    self
      .get_raw(identifier.value(), ResolveOptions::default().optional(true))?
      .map(|instance| downcast(identifier.value(), &instance))
      .transpose()
  }

  pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self, identifier: &Identifier<T>) -> Result<Vec<Arc<T>>> {
    Ok(
      self
        .get_all_by_variant(identifier, ResolveOptions::default())?
        .into_iter()
        .map(|(_, instance)| instance)
        .collect(),
    )
  }

  pub fn get_all_by_variant<T: ?Sized + Send + Sync + 'static>(
    &self,
    identifier: &Identifier<T>,
    options: ResolveOptions,
  ) -> Result<Vec<(Cow<'static, str>, Arc<T>)>> {
    self
      .get_all_raw(identifier.value(), options)?
      .into_iter()
      .map(|(variant, instance)| {
        let typed = downcast(&identifier.value().with_variant(variant.clone()), &instance)?;
        Ok((variant, typed))
      })
      .collect()
  }

  /// Resolves one identifier. `Ok(None)` only when `options.optional` is set
  /// and nothing is registered anywhere along the parent chain.
  pub(crate) fn get_raw(&self, identifier: &IdentifierValue, options: ResolveOptions) -> Result<Option<AnyArc>> {
    let provider = self.provider;
    provider.ensure_alive()?;

    if identifier == PROVIDER.value() {
      return Ok(Some(Arc::new(Arc::new(provider.clone())) as AnyArc));
    }
    if !options.no_cache {
      if let Some(root) = provider.root_instance(identifier) {
        return Ok(Some(root));
      }
    }

    let Some(factory) = provider.collection().get_factory(identifier, provider.scope()) else {
      if let Some(parent) = provider.parent() {
        if !options.same_scope {
          trace!(%identifier, scope = %provider.scope(), "falling back to parent provider");
          return self.retarget(parent).get_raw(identifier, options);
        }
      }
      if options.optional {
        return Ok(None);
      }
      return Err(Error::ServiceNotFound {
        identifier: identifier.clone(),
      });
    };

    self.materialize(identifier, &factory, options.no_cache).map(Some)
  }

  /// Resolves every variant registered for the identifier's name.
  ///
  /// When the provider's scope has no entry for the name at all, the parent's
  /// result is returned as is; local variants are never merged with the
  /// parent's.
  pub(crate) fn get_all_raw(
    &self,
    identifier: &IdentifierValue,
    options: ResolveOptions,
  ) -> Result<Vec<(Cow<'static, str>, AnyArc)>> {
    let provider = self.provider;
    provider.ensure_alive()?;

    let Some(variants) = provider.collection().get_factory_all(identifier, provider.scope()) else {
      if let Some(parent) = provider.parent() {
        if !options.same_scope {
          trace!(%identifier, scope = %provider.scope(), "falling back to parent provider for all variants");
          return self.retarget(parent).get_all_raw(identifier, options);
        }
      }
      return Ok(Vec::new());
    };

    variants
      .into_iter()
      .map(|(variant, factory)| {
        let key = identifier.with_variant(variant.clone());
        let instance = self.materialize(&key, &factory, false)?;
        Ok((variant, instance))
      })
      .collect()
  }

  /// Returns the cached instance or runs the factory one level deeper.
  fn materialize(&self, identifier: &IdentifierValue, factory: &ComponentFactory, no_cache: bool) -> Result<AnyArc> {
    if !no_cache {
      if let Some(instance) = self.provider.cached(identifier) {
        return Ok(instance);
      }
    }

    // Cycles through entities and scope roots are still cycles.
    let next = self.track(identifier)?;
    if !no_cache && factory.kind() != ComponentKind::Service {
      return Err(Error::EntityResolution {
        identifier: identifier.clone(),
      });
    }
    trace!(%identifier, scope = %self.provider.scope(), depth = next.depth, "running factory");

    let instance = context::with_context(ConstructionContext::provider(self.provider.clone()), || {
      factory.call(&next)
    })
    .map_err(|err| match err {
      Error::ServiceNotFound { identifier: target } => Error::MissingDependency {
        from: identifier.clone(),
        target,
        stack: self.stack.clone(),
      },
      other => other,
    })?;

    if no_cache {
      self.provider.bind_event_handlers(identifier, &instance);
      return Ok(instance);
    }

    let winner = self.provider.cache_insert(identifier.clone(), Arc::clone(&instance));
    // Only the instance that made it into the cache listens for events.
    if Arc::ptr_eq(&winner, &instance) {
      self.provider.bind_event_handlers(identifier, &winner);
    }
    Ok(winner)
  }

  /// Checks depth and cycles, then builds the resolver for the next level.
  fn track(&self, identifier: &IdentifierValue) -> Result<Resolver<'a>> {
    let depth = self.depth + 1;
    if depth >= RECURSION_LIMIT {
      return Err(Error::RecursionLimit {
        identifier: identifier.clone(),
      });
    }

    let mut stack = self.stack.clone();
    stack.push(identifier.clone());
    if self.stack.contains(identifier) {
      return Err(Error::CircularDependency { stack });
    }

    Ok(Resolver {
      provider: self.provider,
      depth,
      stack,
    })
  }

  /// The same chain, continued against another provider.
  fn retarget(&self, provider: &'a Provider) -> Resolver<'a> {
    Resolver {
      provider,
      depth: self.depth,
      stack: self.stack.clone(),
    }
  }
}

pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
  identifier: &IdentifierValue,
  instance: &AnyArc,
) -> Result<Arc<T>> {
  instance
    .downcast_ref::<Arc<T>>()
    .cloned()
    .ok_or_else(|| Error::TypeMismatch {
      identifier: identifier.clone(),
      expected: type_name::<T>(),
    })
}
