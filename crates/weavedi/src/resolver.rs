//! Resolution engine.
//!
//! Both the blocking and the async path follow the same steps: record the
//! request, reject cycles and runaway depth, look up the binding in the
//! current snapshot, then apply its lifecycle. Factories receive a
//! [`Resolver`] that remembers the chain of keys under construction, which is
//! how a resolution detects that it asked for itself. Cycles split across
//! threads are caught through the registry's live edges before a resolution
//! waits on a cell someone else is filling.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};
use weavedi_config::DiLogLevel;

use crate::binding::{Binding, Factory, Lifecycle};
use crate::cache::{cached, slot_for, AnyArc, Slot, SlotMap};
use crate::error::{DiError, DiResult};
use crate::key::{Key, TypeKey};
use crate::registry::{Registry, RegistryInner};

/// Handle passed to factories for resolving their own dependencies.
///
/// Resolutions made through it are part of the enclosing chain, so a factory
/// that (indirectly) asks for the key it is building gets a
/// [`DiError::CircularDependency`] instead of recursing forever.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<RegistryInner>,
    chain: Vec<TypeKey>,
}

impl Resolver {
    pub(crate) fn new(inner: Arc<RegistryInner>, chain: Vec<TypeKey>) -> Self {
        Self { inner, chain }
    }

    /// Resolve a dependency, failing if it is missing or cannot be built
    pub fn resolve<T: Send + Sync + 'static>(&self, key: &Key<T>) -> DiResult<Arc<T>> {
        let value = self.inner.resolve_any(key.erased(), &self.chain)?;
        downcast(key.erased(), value)
    }

    /// Resolve a dependency that may legitimately be absent.
    ///
    /// Only a missing binding maps to `Ok(None)`; every other failure is
    /// returned so the enclosing factory can propagate it.
    pub fn resolve_optional<T: Send + Sync + 'static>(
        &self,
        key: &Key<T>,
    ) -> DiResult<Option<Arc<T>>> {
        match self.resolve(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Resolve a dependency, awaiting its factory if it is asynchronous
    pub async fn resolve_async<T: Send + Sync + 'static>(&self, key: &Key<T>) -> DiResult<Arc<T>> {
        let value = self
            .inner
            .clone()
            .resolve_any_async(key.erased().clone(), self.chain.clone())
            .await?;
        downcast(key.erased(), value)
    }

    /// Keys currently under construction, outermost first
    pub fn chain(&self) -> &[TypeKey] {
        &self.chain
    }

    /// The registry this resolution runs against
    pub fn registry(&self) -> Registry {
        Registry::from_inner(self.inner.clone())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").field("chain", &self.chain).finish()
    }
}

pub(crate) fn downcast<T: Send + Sync + 'static>(key: &TypeKey, value: AnyArc) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        key: key.to_string(),
    })
}

/// Result of running a binding's factories
enum Built {
    /// Produced by the primary factory; may be cached
    Primary(AnyArc),
    /// Produced by the fallback; never cached
    Fallback(AnyArc),
}

impl Built {
    fn into_inner(self) -> AnyArc {
        match self {
            Built::Primary(value) | Built::Fallback(value) => value,
        }
    }
}

/// Why a single-flight cell was left empty
enum Miss {
    Fallback(AnyArc),
    Failed(DiError),
}

/// Only primary values may enter a cell
fn admit(built: DiResult<Built>) -> Result<AnyArc, Miss> {
    match built {
        Ok(Built::Primary(value)) => Ok(value),
        Ok(Built::Fallback(value)) => Err(Miss::Fallback(value)),
        Err(err) => Err(Miss::Failed(err)),
    }
}

fn settle(result: Result<&AnyArc, Miss>) -> DiResult<AnyArc> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(Miss::Fallback(value)) => Ok(value),
        Err(Miss::Failed(err)) => Err(err),
    }
}

impl RegistryInner {
    pub(crate) fn resolve_any(self: &Arc<Self>, key: &TypeKey, chain: &[TypeKey]) -> DiResult<AnyArc> {
        let result = self.prepare(key, chain).and_then(|binding| {
            let _pending = self.pending.enter(chain.last(), key);
            match &binding.lifecycle {
                Lifecycle::Transient => self.construct(&binding, chain).map(Built::into_inner),
                Lifecycle::Singleton => self.resolve_cached(&binding, &self.singletons, chain),
                Lifecycle::Scoped(kind) => match self.coordinator.scope(kind) {
                    Some(scope) => self.resolve_cached(&binding, &scope.cache, chain),
                    None => self.construct(&binding, chain).map(Built::into_inner),
                },
            }
        });
        self.finish(key, result)
    }

    pub(crate) fn resolve_any_async(
        self: Arc<Self>,
        key: TypeKey,
        chain: Vec<TypeKey>,
    ) -> BoxFuture<'static, DiResult<AnyArc>> {
        Box::pin(async move {
            let result = match self.prepare(&key, &chain) {
                Err(err) => Err(err),
                Ok(binding) => {
                    let _pending = self.pending.enter(chain.last(), &key);
                    match &binding.lifecycle {
                        Lifecycle::Transient => self
                            .construct_async(&binding, &chain)
                            .await
                            .map(Built::into_inner),
                        Lifecycle::Singleton => {
                            self.resolve_cached_async(&binding, &self.singletons, &chain)
                                .await
                        }
                        Lifecycle::Scoped(kind) => match self.coordinator.scope(kind) {
                            Some(scope) => {
                                self.resolve_cached_async(&binding, &scope.cache, &chain)
                                    .await
                            }
                            None => self
                                .construct_async(&binding, &chain)
                                .await
                                .map(Built::into_inner),
                        },
                    }
                }
            };
            self.finish(&key, result)
        })
    }

    /// Bookkeeping shared by every resolution, ending in a binding lookup
    fn prepare(&self, key: &TypeKey, chain: &[TypeKey]) -> DiResult<Arc<Binding>> {
        self.stats.resolution();

        if let Some(parent) = chain.last() {
            self.edges.insert((parent.clone(), key.clone()));
        }

        if chain.contains(key) {
            self.stats.cycle();
            let err = DiError::circular(chain, key);
            if self.logs(DiLogLevel::Errors) {
                error!(key = %key, error = %err, "Circular dependency detected");
            }
            return Err(err);
        }

        let depth = self.config.max_resolution_depth;
        if chain.len() >= depth {
            if self.logs(DiLogLevel::Errors) {
                error!(key = %key, depth, "Resolution depth exceeded");
            }
            return Err(DiError::DepthExceeded {
                key: key.to_string(),
                depth,
            });
        }

        self.coordinator.binding(key).ok_or_else(|| {
            self.stats.not_found();
            DiError::not_found(key)
        })
    }

    /// Refuse to wait on a cell whose builder is, through running edges,
    /// waiting on a key this resolution holds
    fn check_pending(&self, key: &TypeKey, chain: &[TypeKey]) -> DiResult<()> {
        if chain.is_empty() {
            return Ok(());
        }
        let Some(held) = self.pending.reaches(key, chain) else {
            return Ok(());
        };

        self.stats.cycle();
        let mut path = chain.to_vec();
        path.push(key.clone());
        let err = DiError::circular(&path, &held);
        if self.logs(DiLogLevel::Errors) {
            error!(key = %key, error = %err, "Circular dependency detected across resolutions");
        }
        Err(err)
    }

    fn finish(&self, key: &TypeKey, result: DiResult<AnyArc>) -> DiResult<AnyArc> {
        match &result {
            Ok(_) => {
                if self.logs(DiLogLevel::All) {
                    debug!(key = %key, "Resolved dependency");
                }
            }
            Err(err) if err.is_not_found() => {
                if self.logs(DiLogLevel::All) {
                    debug!(key = %key, "Dependency not registered");
                }
            }
            Err(err) => {
                self.stats.failure();
                if !err.is_fatal() && self.logs(DiLogLevel::Errors) {
                    warn!(key = %key, error = %err, "Dependency resolution failed");
                }
            }
        }
        result
    }

    fn cache_hit(&self, binding: &Binding) {
        self.stats.cache_hit();
        if self.logs(DiLogLevel::Optimization) {
            debug!(key = %binding.key, lifecycle = %binding.lifecycle, "Served from cache");
        }
    }

    fn child_resolver(self: &Arc<Self>, binding: &Binding, chain: &[TypeKey]) -> Resolver {
        let mut child = Vec::with_capacity(chain.len() + 1);
        child.extend_from_slice(chain);
        child.push(binding.key.clone());
        Resolver::new(self.clone(), child)
    }

    fn construct(self: &Arc<Self>, binding: &Binding, chain: &[TypeKey]) -> DiResult<Built> {
        let factory = match &binding.factory {
            Factory::Sync(factory) => factory,
            Factory::Async(_) => {
                return Err(DiError::AsyncFactoryRequired {
                    key: binding.key.to_string(),
                })
            }
        };

        let resolver = self.child_resolver(binding, chain);
        match factory(&resolver) {
            Ok(value) => {
                self.stats.construction();
                Ok(Built::Primary(value))
            }
            Err(err) => self.recover(binding, &resolver, DiError::from_factory(&binding.key, err)),
        }
    }

    async fn construct_async(self: &Arc<Self>, binding: &Binding, chain: &[TypeKey]) -> DiResult<Built> {
        let resolver = self.child_resolver(binding, chain);
        let outcome = match &binding.factory {
            Factory::Sync(factory) => factory(&resolver),
            Factory::Async(factory) => factory(resolver.clone()).await,
        };

        match outcome {
            Ok(value) => {
                self.stats.construction();
                Ok(Built::Primary(value))
            }
            Err(err) => self.recover(binding, &resolver, DiError::from_factory(&binding.key, err)),
        }
    }

    /// Run the fallback after the primary factory failed
    fn recover(&self, binding: &Binding, resolver: &Resolver, failure: DiError) -> DiResult<Built> {
        if failure.is_fatal() {
            return Err(failure);
        }
        let Some(fallback) = &binding.fallback else {
            return Err(failure);
        };

        match fallback(resolver) {
            Ok(value) => {
                self.stats.fallback();
                if self.logs(DiLogLevel::Errors) {
                    warn!(key = %binding.key, error = %failure, "Primary factory failed, using fallback");
                }
                Ok(Built::Fallback(value))
            }
            Err(err) => {
                let fallback_failure = DiError::from_factory(&binding.key, err);
                if fallback_failure.is_fatal() {
                    return Err(fallback_failure);
                }
                if self.logs(DiLogLevel::Errors) {
                    warn!(key = %binding.key, error = %fallback_failure, "Fallback factory failed");
                }
                Err(failure)
            }
        }
    }

    fn resolve_cached(
        self: &Arc<Self>,
        binding: &Binding,
        cache: &SlotMap,
        chain: &[TypeKey],
    ) -> DiResult<AnyArc> {
        if let Some(value) = cached(cache, &binding.key, binding.generation) {
            self.cache_hit(binding);
            return Ok(value);
        }
        if binding.factory.is_async() {
            return Err(DiError::AsyncFactoryRequired {
                key: binding.key.to_string(),
            });
        }

        let slot = slot_for(cache, &binding.key, binding.generation);
        self.fill_sync(binding, &slot, chain)
    }

    /// Populate the blocking cell of `slot` from a sync factory
    fn fill_sync(self: &Arc<Self>, binding: &Binding, slot: &Slot, chain: &[TypeKey]) -> DiResult<AnyArc> {
        if !self.config.single_flight {
            return match self.construct(binding, chain)? {
                Built::Primary(value) => Ok(slot.sync_cell().get_or_init(|| value).clone()),
                Built::Fallback(value) => Ok(value),
            };
        }

        if slot.get().is_none() {
            self.check_pending(&binding.key, chain)?;
        }
        settle(
            slot.sync_cell()
                .get_or_try_init(|| admit(self.construct(binding, chain))),
        )
    }

    async fn resolve_cached_async(
        self: &Arc<Self>,
        binding: &Binding,
        cache: &SlotMap,
        chain: &[TypeKey],
    ) -> DiResult<AnyArc> {
        if let Some(value) = cached(cache, &binding.key, binding.generation) {
            self.cache_hit(binding);
            return Ok(value);
        }

        let slot = slot_for(cache, &binding.key, binding.generation);
        if !binding.factory.is_async() {
            return self.fill_sync(binding, &slot, chain);
        }

        if !self.config.single_flight {
            return match self.construct_async(binding, chain).await? {
                Built::Primary(value) => match slot.async_cell().set(value.clone()) {
                    Ok(()) => Ok(value),
                    Err(_) => Ok(slot.get().unwrap_or(value)),
                },
                Built::Fallback(value) => Ok(value),
            };
        }

        if slot.get().is_none() {
            self.check_pending(&binding.key, chain)?;
        }
        settle(
            slot.async_cell()
                .get_or_try_init(move || async move { admit(self.construct_async(binding, chain).await) })
                .await,
        )
    }
}
