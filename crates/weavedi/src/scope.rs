//! Scope kinds and live scope instances.
//!
//! A scope kind is a namespace for cache partitioning. At most one instance
//! of each kind is current at a time; it owns the cache that scoped bindings
//! of that kind populate.

use std::borrow::Cow;
use std::fmt;
use std::time::Instant;

use crate::cache::{populated, SlotMap};

/// Category of scope used to partition cached instances
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Screen,
    Session,
    Request,
    Custom(Cow<'static, str>),
}

impl ScopeKind {
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        ScopeKind::Custom(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            ScopeKind::Screen => "screen",
            ScopeKind::Session => "session",
            ScopeKind::Request => "request",
            ScopeKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A live activation of a scope kind, holding its own instance cache
pub(crate) struct ScopeInstance {
    kind: ScopeKind,
    id: String,
    activated_at: Instant,
    pub(crate) cache: SlotMap,
}

impl ScopeInstance {
    pub(crate) fn new(kind: ScopeKind, id: String) -> Self {
        Self {
            kind,
            id,
            activated_at: Instant::now(),
            cache: SlotMap::new(),
        }
    }

    pub(crate) fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn age(&self) -> std::time::Duration {
        self.activated_at.elapsed()
    }

    pub(crate) fn cached_instances(&self) -> usize {
        populated(&self.cache)
    }
}
