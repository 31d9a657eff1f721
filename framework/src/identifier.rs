//! Typed tokens naming a registrable component kind.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// The variant every identifier carries until [`Identifier::variant`] picks another.
pub const DEFAULT_VARIANT: &str = "default";

/// The untyped `(name, variant)` pair behind an [`Identifier`].
///
/// Equality and hashing are structural on both fields. This is the key used by
/// the registry and by every provider's cache.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IdentifierValue {
  name: Cow<'static, str>,
  variant: Cow<'static, str>,
}

impl IdentifierValue {
  pub fn new(name: impl Into<Cow<'static, str>>, variant: impl Into<Cow<'static, str>>) -> Self {
    Self {
      name: name.into(),
      variant: variant.into(),
    }
  }

  pub(crate) const fn from_static(name: &'static str, variant: &'static str) -> Self {
    Self {
      name: Cow::Borrowed(name),
      variant: Cow::Borrowed(variant),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn variant(&self) -> &str {
    &self.variant
  }

  pub fn is_default_variant(&self) -> bool {
    self.variant == DEFAULT_VARIANT
  }

  /// A sibling value sharing this name.
  pub(crate) fn with_variant(&self, variant: Cow<'static, str>) -> Self {
    Self {
      name: self.name.clone(),
      variant,
    }
  }

  pub(crate) fn name_cow(&self) -> &Cow<'static, str> {
    &self.name
  }

  pub(crate) fn variant_cow(&self) -> &Cow<'static, str> {
    &self.variant
  }
}

impl fmt::Display for IdentifierValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_default_variant() {
      write!(f, "[{}]", self.name)
    } else {
      write!(f, "[{}]({})", self.name, self.variant)
    }
  }
}

impl fmt::Debug for IdentifierValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

/// A typed identifier for components of type `T`.
///
/// `T` may be unsized, which is how capabilities are expressed: an
/// `Identifier<dyn Storage>` can have one implementation per variant.
///
/// ```
/// use fibre_framework::Identifier;
///
/// trait Storage: Send + Sync {}
///
/// const STORAGE: Identifier<dyn Storage> = Identifier::new("Storage");
///
/// let local = STORAGE.variant("local");
/// assert_eq!(local.name(), "Storage");
/// assert_eq!(local.variant_name(), "local");
/// assert_ne!(local, STORAGE);
/// ```
pub struct Identifier<T: ?Sized> {
  value: IdentifierValue,
  _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Identifier<T> {
  /// Creates an identifier with the default variant. Usable in `const` items.
  pub const fn new(name: &'static str) -> Self {
    Self {
      value: IdentifierValue::from_static(name, DEFAULT_VARIANT),
      _marker: PhantomData,
    }
  }

  /// Identifies `T` by its type name. This is what `service`, `entity` and
  /// `layer` register concrete types under.
  pub fn of() -> Self {
    Self::new(type_name::<T>())
  }

  /// Returns a sibling identifier sharing this name with a different variant.
  pub fn variant(&self, variant: impl Into<Cow<'static, str>>) -> Self {
    Self {
      value: self.value.with_variant(variant.into()),
      _marker: PhantomData,
    }
  }

  /// Declares a dependency on every registered variant.
  pub fn all(&self) -> All<T> {
    All(self.clone())
  }

  /// Declares a dependency that resolves to `None` when nothing is registered.
  pub fn optional(&self) -> Optional<T> {
    Optional(self.clone())
  }

  pub fn name(&self) -> &str {
    self.value.name()
  }

  pub fn variant_name(&self) -> &str {
    self.value.variant()
  }

  pub fn value(&self) -> &IdentifierValue {
    &self.value
  }
}

impl<T: ?Sized> Clone for Identifier<T> {
  fn clone(&self) -> Self {
    Self {
      value: self.value.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Identifier<U>> for Identifier<T> {
  fn eq(&self, other: &Identifier<U>) -> bool {
    self.value == other.value
  }
}

impl<T: ?Sized> Eq for Identifier<T> {}

impl<T: ?Sized> Hash for Identifier<T> {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.value.hash(state);
  }
}

impl<T: ?Sized> fmt::Display for Identifier<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.value, f)
  }
}

impl<T: ?Sized> fmt::Debug for Identifier<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Identifier<{}>{}", type_name::<T>(), self.value)
  }
}

/// Dependency marker: resolve every variant of the wrapped identifier, in
/// registration order.
pub struct All<T: ?Sized>(pub Identifier<T>);

impl<T: ?Sized> Clone for All<T> {
  fn clone(&self) -> Self {
    All(self.0.clone())
  }
}

/// Dependency marker: resolve the wrapped identifier if it is registered.
pub struct Optional<T: ?Sized>(pub Identifier<T>);

impl<T: ?Sized> Clone for Optional<T> {
  fn clone(&self) -> Self {
    Optional(self.0.clone())
  }
}
