//! Typed dependency lists.
//!
//! A registration declares what it needs as a tuple; every element is resolved
//! through the factory's [`Resolver`] each time the factory runs, and the
//! constructor receives the resolved values positionally.
//!
//! | element          | resolved via   | yields            |
//! |------------------|----------------|-------------------|
//! | `Identifier<T>`  | `get`          | `Arc<T>`          |
//! | `All<T>`         | `get_all`      | `Vec<Arc<T>>`     |
//! | `Optional<T>`    | `get_optional` | `Option<Arc<T>>`  |

use std::sync::Arc;

use crate::error::Result;
use crate::identifier::{All, Identifier, Optional};
use crate::resolver::Resolver;

/// One entry of a dependency list.
pub trait Dependency: Send + Sync + 'static {
  type Output;

  fn resolve(&self, resolver: &Resolver<'_>) -> Result<Self::Output>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Identifier<T> {
  type Output = Arc<T>;

  fn resolve(&self, resolver: &Resolver<'_>) -> Result<Arc<T>> {
    resolver.get(self)
  }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for All<T> {
  type Output = Vec<Arc<T>>;

  fn resolve(&self, resolver: &Resolver<'_>) -> Result<Vec<Arc<T>>> {
    resolver.get_all(&self.0)
  }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Optional<T> {
  type Output = Option<Arc<T>>;

  fn resolve(&self, resolver: &Resolver<'_>) -> Result<Option<Arc<T>>> {
    resolver.get_optional(&self.0)
  }
}

/// A full dependency list: `()` or a tuple of up to eight [`Dependency`] values.
pub trait Dependencies: Send + Sync + 'static {
  type Output;

  fn resolve_all(&self, resolver: &Resolver<'_>) -> Result<Self::Output>;
}

impl Dependencies for () {
  type Output = ();

  fn resolve_all(&self, _resolver: &Resolver<'_>) -> Result<()> {
    Ok(())
  }
}

impl_dependencies!(D1);
impl_dependencies!(D1, D2);
impl_dependencies!(D1, D2, D3);
impl_dependencies!(D1, D2, D3, D4);
impl_dependencies!(D1, D2, D3, D4, D5);
impl_dependencies!(D1, D2, D3, D4, D5, D6);
impl_dependencies!(D1, D2, D3, D4, D5, D6, D7);
impl_dependencies!(D1, D2, D3, D4, D5, D6, D7, D8);
