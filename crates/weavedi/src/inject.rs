//! Explicit injection handles.
//!
//! [`Injected`] resolves on first access and keeps the result in the owning
//! object. [`Provided`] resolves on every access, so the binding's lifecycle
//! alone decides whether a new instance is built.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::DiResult;
use crate::key::Key;
use crate::registry::Registry;

/// Lazily resolved dependency owned by a consumer.
///
/// Failed resolutions are not remembered; the next access tries again.
pub struct Injected<T> {
    registry: Registry,
    key: Key<T>,
    cell: OnceCell<Arc<T>>,
}

impl<T: Send + Sync + 'static> Injected<T> {
    pub fn new(registry: &Registry, key: Key<T>) -> Self {
        Self {
            registry: registry.clone(),
            key,
            cell: OnceCell::new(),
        }
    }

    /// Bind to the process-wide registry
    pub fn global(key: Key<T>) -> Self {
        Self::new(Registry::global(), key)
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.get_required().ok()
    }

    pub fn get_required(&self) -> DiResult<Arc<T>> {
        self.cell
            .get_or_try_init(|| self.registry.resolve_required(&self.key))
            .cloned()
    }

    pub async fn get_async(&self) -> DiResult<Arc<T>> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }
        let value = self.registry.resolve_required_async(&self.key).await?;
        Ok(self.cell.get_or_init(|| value).clone())
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Forget the held instance so the next access resolves again
    pub fn reset(&mut self) {
        self.cell.take();
    }
}

impl<T> std::fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injected")
            .field("key", &self.key)
            .field("resolved", &self.cell.get().is_some())
            .finish()
    }
}

/// Dependency resolved afresh on every access
pub struct Provided<T> {
    registry: Registry,
    key: Key<T>,
}

impl<T: Send + Sync + 'static> Provided<T> {
    pub fn new(registry: &Registry, key: Key<T>) -> Self {
        Self {
            registry: registry.clone(),
            key,
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.registry.resolve(&self.key)
    }

    pub fn get_required(&self) -> DiResult<Arc<T>> {
        self.registry.resolve_required(&self.key)
    }
}

impl<T> Clone for Provided<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            key: self.key.clone(),
        }
    }
}
