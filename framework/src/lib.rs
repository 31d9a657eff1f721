//! # Fibre Framework
//!
//! A scoped, lazily-resolving dependency injection framework for Rust.
//!
//! Components are registered against typed [`Identifier`]s in a [`Framework`].
//! A [`Provider`] built from it instantiates them on first use, caches the
//! result, and resolves their dependencies recursively, rejecting cycles and
//! runaway chains along the way.
//!
//! ## Core Concepts
//!
//! - **Framework**: the registry, mapping `(scope, identifier, variant)` to a factory.
//! - **Identifier**: a typed name with an optional variant. An identifier for a
//!   `dyn Trait` with several variants models a pluggable capability.
//! - **Provider**: a container rooted at one scope, with its own cache and an
//!   optional parent to fall back to.
//! - **Entities and scopes**: components with an externally assigned id and props,
//!   built uncached via `create_entity`; scope roots additionally get their own
//!   child provider via `create_scope`.
//! - **Events**: typed [`Event`]s emitted on a provider's [`EventBus`] bubble up
//!   to its ancestors; components declare handlers with `on_event`.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_framework::{Framework, Identifier};
//! use std::sync::Arc;
//!
//! trait Usb: Send + Sync {
//!   fn speed(&self) -> u32;
//! }
//!
//! struct TypeA;
//! impl Usb for TypeA {
//!   fn speed(&self) -> u32 { 100 }
//! }
//!
//! struct TypeC;
//! impl Usb for TypeC {
//!   fn speed(&self) -> u32 { 300 }
//! }
//!
//! struct Pc {
//!   primary: Arc<dyn Usb>,
//!   ports: Vec<Arc<dyn Usb>>,
//! }
//!
//! const USB: Identifier<dyn Usb> = Identifier::new("USB");
//!
//! # fn main() -> fibre_framework::Result<()> {
//! let framework = Framework::new();
//! framework
//!   .edit()
//!   .implement(&USB.variant("A"), (), |()| Ok(Arc::new(TypeA) as Arc<dyn Usb>))?
//!   .implement(&USB.variant("C"), (), |()| Ok(Arc::new(TypeC) as Arc<dyn Usb>))?
//!   .service((USB.variant("A"), USB.all()), |(primary, ports)| Ok(Pc { primary, ports }))?;
//!
//! let provider = framework.provider();
//! let pc = provider.get(&Identifier::<Pc>::of())?;
//! assert_eq!(pc.primary.speed(), 100);
//! assert_eq!(pc.ports.len(), 2);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

mod collection;
mod components;
mod context;
mod dependencies;
mod error;
mod events;
mod global;
mod identifier;
mod provider;
mod resolver;
mod scope;

pub use collection::{ComponentFactory, ComponentKind, Framework, FrameworkEditor, RegisterOptions};
pub use components::{Component, Entity, LayerRoot};
pub use dependencies::{Dependencies, Dependency};
pub use error::{Error, Result};
pub use events::{Event, EventBus, Subscription};
pub use global::global;
pub use identifier::{All, Identifier, IdentifierValue, Optional, DEFAULT_VARIANT};
pub use provider::{Provider, ScopeHandle, WeakProvider, PROVIDER};
pub use resolver::{ResolveOptions, Resolver, RECURSION_LIMIT};
pub use scope::{create_scope, ScopePath};
