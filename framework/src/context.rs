//! The ambient construction context.
//!
//! Component bases are built without explicit parameters; they read the
//! provider (and, for entities, the id and props) from a thread-local slot
//! that is pushed around every factory invocation and popped on every exit
//! path, including errors and unwinding.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use crate::provider::Provider;

pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

thread_local! {
  static CONSTRUCTOR_CONTEXT: RefCell<ConstructionContext> = RefCell::new(ConstructionContext::default());
}

/// What a component base can learn about the provider constructing it.
#[derive(Clone, Default)]
pub(crate) struct ConstructionContext {
  pub(crate) provider: Option<Provider>,
  pub(crate) entity_id: Option<Arc<str>>,
  pub(crate) props: Option<AnyArc>,
}

impl ConstructionContext {
  pub(crate) fn provider(provider: Provider) -> Self {
    Self {
      provider: Some(provider),
      ..Self::default()
    }
  }

  pub(crate) fn entity(id: Arc<str>, props: AnyArc) -> Self {
    Self {
      provider: None,
      entity_id: Some(id),
      props: Some(props),
    }
  }

  /// Fields set on `partial` win; the rest carry over from `self`.
  fn merged(&self, partial: ConstructionContext) -> Self {
    Self {
      provider: partial.provider.or_else(|| self.provider.clone()),
      entity_id: partial.entity_id.or_else(|| self.entity_id.clone()),
      props: partial.props.or_else(|| self.props.clone()),
    }
  }
}

/// Restores the previous context when dropped.
struct ContextGuard {
  previous: Option<ConstructionContext>,
}

impl ContextGuard {
  fn enter(partial: ConstructionContext) -> Self {
    let previous = CONSTRUCTOR_CONTEXT.with(|slot| {
      let mut slot = slot.borrow_mut();
      let next = slot.merged(partial);
      std::mem::replace(&mut *slot, next)
    });
    Self {
      previous: Some(previous),
    }
  }
}

impl Drop for ContextGuard {
  fn drop(&mut self) {
    if let Some(previous) = self.previous.take() {
      // `try_with` so a guard dropped during thread teardown does not panic.
      let _ = CONSTRUCTOR_CONTEXT.try_with(|slot| *slot.borrow_mut() = previous);
    }
  }
}

/// Runs `f` with `partial` merged onto the active context.
pub(crate) fn with_context<R>(partial: ConstructionContext, f: impl FnOnce() -> R) -> R {
  let _guard = ContextGuard::enter(partial);
  f()
}

/// A snapshot of the active context.
pub(crate) fn current() -> ConstructionContext {
  CONSTRUCTOR_CONTEXT.with(|slot| slot.borrow().clone())
}
