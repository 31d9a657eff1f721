//! Error types for registration, resolution and event delivery.

use thiserror::Error;

use crate::identifier::IdentifierValue;
use crate::scope::ScopePath;

/// The error type for registration and resolution.
///
/// Every error surfaces synchronously to the caller. A failed resolution never
/// populates the provider's cache, so retrying after fixing the registration
/// succeeds.
#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("Service {identifier} not found in container")]
  ServiceNotFound { identifier: IdentifierValue },

  #[error(
    "Missing dependency {target} in creating service {from}.\n{}",
    format_stack(.stack)
  )]
  MissingDependency {
    from: IdentifierValue,
    target: IdentifierValue,
    stack: Vec<IdentifierValue>,
  },

  #[error("A circular dependency was detected.\n{}", format_stack(.stack))]
  CircularDependency { stack: Vec<IdentifierValue> },

  #[error("Dynamic resolve recursion limit reached while resolving {identifier}")]
  RecursionLimit { identifier: IdentifierValue },

  #[error("Service {identifier} already exists")]
  DuplicateServiceDefinition { identifier: IdentifierValue },

  #[error("Component must be created in the context of a provider")]
  NoConstructionContext,

  #[error("Entity must be created through create_entity or create_scope")]
  NoEntityContext,

  #[error("Entity props are not of the expected type {expected}")]
  PropsMismatch { expected: &'static str },

  #[error("Component {identifier} is not of the expected type {expected}")]
  TypeMismatch {
    identifier: IdentifierValue,
    expected: &'static str,
  },

  #[error("Component {identifier} is an entity and must be created, not resolved")]
  EntityResolution { identifier: IdentifierValue },

  #[error("Event {event} carries a payload of a different type than {expected}")]
  EventPayloadMismatch {
    event: IdentifierValue,
    expected: &'static str,
  },

  #[error("Provider for scope {scope} has been disposed")]
  Disposed { scope: ScopePath },
}

impl Error {
  /// `true` for the not-found outcome that `get_optional` turns into `None`.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::ServiceNotFound { .. })
  }

  /// The dependency chain carried by the error, if any.
  pub fn dependency_stack(&self) -> Option<&[IdentifierValue]> {
    match self {
      Error::MissingDependency { stack, .. } | Error::CircularDependency { stack } => Some(stack),
      _ => None,
    }
  }
}

fn format_stack(stack: &[IdentifierValue]) -> String {
  stack
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" -> ")
}

/// A specialized `Result` type for framework operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
