//! Public macros for declaring identifiers, plus the tuple expansion used by
//! dependency lists.

/// Declares a `const` [`Identifier`](crate::Identifier).
///
/// The identifier name defaults to the constant's own name.
///
/// # Examples
///
/// ```
/// use fibre_framework::identifier;
///
/// pub trait Clipboard: Send + Sync {
///   fn read(&self) -> String;
/// }
///
/// identifier!(pub CLIPBOARD: dyn Clipboard);
/// identifier!(SETTINGS: String = "app-settings");
///
/// assert_eq!(CLIPBOARD.name(), "CLIPBOARD");
/// assert_eq!(SETTINGS.name(), "app-settings");
/// ```
#[macro_export]
macro_rules! identifier {
  ($vis:vis $name:ident : $ty:ty = $label:expr) => {
    $vis const $name: $crate::Identifier<$ty> = $crate::Identifier::new($label);
  };

  ($vis:vis $name:ident : $ty:ty) => {
    $vis const $name: $crate::Identifier<$ty> = $crate::Identifier::new(stringify!($name));
  };
}

// Implements `Dependencies` for a tuple of `Dependency` values, resolving
// each element in order and short-circuiting on the first error.
macro_rules! impl_dependencies {
  ($($dep:ident),+) => {
    impl<$($dep: $crate::dependencies::Dependency),+> $crate::dependencies::Dependencies for ($($dep,)+) {
      type Output = ($(<$dep as $crate::dependencies::Dependency>::Output,)+);

      #[allow(non_snake_case)]
      fn resolve_all(&self, resolver: &$crate::resolver::Resolver<'_>) -> $crate::error::Result<Self::Output> {
        let ($($dep,)+) = self;
        Ok(($($dep.resolve(resolver)?,)+))
      }
    }
  };
}
