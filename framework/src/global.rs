//! The process-wide framework instance.

use crate::collection::Framework;
use once_cell::sync::Lazy;

// Created on first access, in a thread-safe manner.
static GLOBAL_FRAMEWORK: Lazy<Framework> = Lazy::new(Framework::default);

/// Provides a reference to the global framework.
///
/// Feature modules can register their components here at bootstrap without
/// having a collection threaded through to them; the application then builds
/// its root provider from it.
///
/// # Examples
///
/// ```
/// use fibre_framework::{global, Identifier};
///
/// struct BuildInfo { version: &'static str }
///
/// fn register_build_info() -> fibre_framework::Result<()> {
///   global().edit().service_value(BuildInfo { version: "1.0.0" })?;
///   Ok(())
/// }
///
/// register_build_info().unwrap();
/// let provider = global().provider();
/// assert_eq!(provider.get(&Identifier::<BuildInfo>::of()).unwrap().version, "1.0.0");
/// ```
pub fn global() -> &'static Framework {
  &GLOBAL_FRAMEWORK
}
