//! Hierarchical lookup namespaces.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered list of namespace segments, e.g. `["workspace", "doc"]`.
///
/// The empty path is the root scope. Two paths are equal when their joined
/// representation matches.
#[derive(Clone, Default)]
pub struct ScopePath {
  segments: Vec<Cow<'static, str>>,
  key: String,
}

impl ScopePath {
  pub fn root() -> Self {
    Self::default()
  }

  pub fn from_segments<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<Cow<'static, str>>,
  {
    segments
      .into_iter()
      .fold(Self::root(), |path, segment| path.child(segment))
  }

  /// Returns this path extended by one segment.
  pub fn child(&self, segment: impl Into<Cow<'static, str>>) -> Self {
    let segment = segment.into();
    let mut key = self.key.clone();
    if !self.segments.is_empty() {
      key.push('/');
    }
    key.push_str(&segment);

    let mut segments = self.segments.clone();
    segments.push(segment);
    Self { segments, key }
  }

  pub fn parent(&self) -> Option<Self> {
    let (_, init) = self.segments.split_last()?;
    Some(Self::from_segments(init.iter().cloned()))
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn segments(&self) -> &[Cow<'static, str>] {
    &self.segments
  }

  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  /// The joined representation used as the registry key.
  pub fn key(&self) -> &str {
    &self.key
  }
}

/// Appends `name` to `base`.
pub fn create_scope(name: impl Into<Cow<'static, str>>, base: &ScopePath) -> ScopePath {
  base.child(name)
}

impl PartialEq for ScopePath {
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key
  }
}

impl Eq for ScopePath {}

impl Hash for ScopePath {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.key.hash(state);
  }
}

impl fmt::Display for ScopePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      f.write_str("<root>")
    } else {
      f.write_str(&self.key)
    }
  }
}

impl fmt::Debug for ScopePath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ScopePath({})", self)
  }
}
