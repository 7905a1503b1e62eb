//! Bindings: what the registry knows about each key.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::cache::AnyArc;
use crate::key::TypeKey;
use crate::resolver::Resolver;
use crate::scope::ScopeKind;

/// Instance reuse policy of a binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Constructed once, reused until released or re-registered
    Singleton,
    /// Constructed once per active scope of the given kind
    Scoped(ScopeKind),
    /// Constructed on every resolution
    Transient,
}

impl Lifecycle {
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifecycle::Transient)
    }

    pub fn scope_kind(&self) -> Option<&ScopeKind> {
        match self {
            Lifecycle::Scoped(kind) => Some(kind),
            _ => None,
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Singleton => f.write_str("singleton"),
            Lifecycle::Scoped(kind) => write!(f, "scoped({kind})"),
            Lifecycle::Transient => f.write_str("transient"),
        }
    }
}

pub(crate) type SyncFactory = Arc<dyn Fn(&Resolver) -> anyhow::Result<AnyArc> + Send + Sync>;

pub(crate) type AsyncFactory =
    Arc<dyn Fn(Resolver) -> BoxFuture<'static, anyhow::Result<AnyArc>> + Send + Sync>;

/// Type-erased constructor
#[derive(Clone)]
pub(crate) enum Factory {
    Sync(SyncFactory),
    Async(AsyncFactory),
}

impl Factory {
    pub(crate) fn is_async(&self) -> bool {
        matches!(self, Factory::Async(_))
    }
}

pub(crate) fn erase_sync<T, F>(factory: F) -> SyncFactory
where
    T: Send + Sync + 'static,
    F: Fn(&Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Arc::new(move |resolver: &Resolver| factory(resolver).map(|value| Arc::new(value) as AnyArc))
}

pub(crate) fn erase_async<T, F, Fut>(factory: F) -> AsyncFactory
where
    T: Send + Sync + 'static,
    F: Fn(Resolver) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move |resolver: Resolver| -> BoxFuture<'static, anyhow::Result<AnyArc>> {
        let future = factory(resolver);
        Box::pin(async move { future.await.map(|value| Arc::new(value) as AnyArc) })
    })
}

pub(crate) fn erase_instance<T: Send + Sync + 'static>(instance: Arc<T>) -> SyncFactory {
    Arc::new(move |_: &Resolver| Ok(instance.clone() as AnyArc))
}

/// Active registration for one key
pub(crate) struct Binding {
    pub(crate) key: TypeKey,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) factory: Factory,
    pub(crate) fallback: Option<SyncFactory>,
    pub(crate) generation: u64,
}

impl Binding {
    pub(crate) fn info(&self) -> BindingInfo {
        BindingInfo {
            key: self.key.clone(),
            lifecycle: self.lifecycle.clone(),
            is_async: self.factory.is_async(),
            has_fallback: self.fallback.is_some(),
            generation: self.generation,
        }
    }
}

/// Description of a stored binding, returned by every registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub key: TypeKey,
    pub lifecycle: Lifecycle,
    pub is_async: bool,
    pub has_fallback: bool,
    /// Increases with every registration; a re-registration always has a larger value
    pub generation: u64,
}
