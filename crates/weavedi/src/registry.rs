//! The registry: registration table, scope manager and resolution entry points.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};
use weavedi_config::{ConfigManager, ConfigStore, DiLogLevel, RegistryConfig};

use crate::binding::{erase_async, erase_instance, erase_sync, Binding, BindingInfo, Factory, Lifecycle, SyncFactory};
use crate::cache::{populated, SlotMap};
use crate::coordinator::{Coordinator, ScopeTable};
use crate::error::DiResult;
use crate::key::{Key, TypeKey};
use crate::pending::PendingEdges;
use crate::resolver::{downcast, Resolver};
use crate::scope::{ScopeInstance, ScopeKind};
use crate::stats::{RegistryStats, StatsCollector};

static GLOBAL: Lazy<Registry> = Lazy::new(|| Registry::with_config(load_global_config()));

fn load_global_config() -> RegistryConfig {
    let mut manager = ConfigManager::new();
    match manager.load_config() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load registry configuration, using defaults");
            RegistryConfig::default()
        }
    }
}

/// State shared by every handle to one registry
pub(crate) struct RegistryInner {
    pub(crate) config: RegistryConfig,
    log_level: AtomicU8,
    pub(crate) coordinator: Coordinator,
    pub(crate) singletons: SlotMap,
    /// Observed (dependent, dependency) pairs
    pub(crate) edges: DashSet<(TypeKey, TypeKey)>,
    /// Edges of resolutions still in progress
    pub(crate) pending: PendingEdges,
    pub(crate) stats: StatsCollector,
    generation: AtomicU64,
}

impl RegistryInner {
    fn new(config: RegistryConfig) -> Self {
        Self {
            log_level: AtomicU8::new(config.log_level as u8),
            config,
            coordinator: Coordinator::new(),
            singletons: SlotMap::new(),
            edges: DashSet::new(),
            pending: PendingEdges::new(),
            stats: StatsCollector::default(),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn log_level(&self) -> DiLogLevel {
        match self.log_level.load(Ordering::Relaxed) {
            0 => DiLogLevel::Off,
            1 => DiLogLevel::Errors,
            2 => DiLogLevel::Registration,
            3 => DiLogLevel::Optimization,
            _ => DiLogLevel::All,
        }
    }

    /// Whether events of `category` should be emitted
    pub(crate) fn logs(&self, category: DiLogLevel) -> bool {
        self.log_level().allows(category)
    }

    /// Drop every cached instance of `key`
    fn invalidate(&self, key: &TypeKey, scopes: &ScopeTable) {
        self.singletons.remove(key);
        for scope in scopes.values() {
            scope.cache.remove(key);
        }
    }
}

/// Thread-safe dependency registry.
///
/// Cloning is cheap and every clone refers to the same registrations, caches
/// and scopes.
///
/// ```rust
/// use weavedi::{Key, Lifecycle, Registry};
///
/// struct Greeter(&'static str);
///
/// let registry = Registry::new();
/// let greeter = Key::<Greeter>::new();
/// registry.register(&greeter, Lifecycle::Singleton, |_| Ok(Greeter("hello")));
///
/// assert_eq!(registry.resolve(&greeter).unwrap().0, "hello");
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner::new(config)),
        }
    }

    /// Process-wide registry, configured from the user config file and
    /// `WEAVEDI__*` environment variables on first use
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<RegistryInner> {
        &self.inner
    }

    /// Configuration in effect, including the current log level
    pub fn config(&self) -> RegistryConfig {
        self.inner.config.clone().with_log_level(self.log_level())
    }

    pub fn log_level(&self) -> DiLogLevel {
        self.inner.log_level()
    }

    /// Change diagnostic verbosity at runtime
    pub fn set_log_level(&self, level: DiLogLevel) {
        self.inner.log_level.store(level as u8, Ordering::Relaxed);
    }

    // ----- registration -------------------------------------------------

    /// Register a synchronous factory, replacing any existing binding for `key`
    pub fn register<T, F>(&self, key: &Key<T>, lifecycle: Lifecycle, factory: F) -> BindingInfo
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.install(key.erased(), lifecycle, Factory::Sync(erase_sync(factory)), None)
    }

    /// Register a factory together with a fallback used when it fails.
    ///
    /// Values produced by the fallback are returned but never cached, so the
    /// primary factory is retried on the next resolution.
    pub fn register_with_fallback<T, F, G>(
        &self,
        key: &Key<T>,
        lifecycle: Lifecycle,
        factory: F,
        fallback: G,
    ) -> BindingInfo
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
        G: Fn(&Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.install(
            key.erased(),
            lifecycle,
            Factory::Sync(erase_sync(factory)),
            Some(erase_sync(fallback)),
        )
    }

    /// Register an asynchronous factory.
    ///
    /// Cached lifecycles must be resolved through the async API until the
    /// first instance exists.
    pub fn register_async<T, F, Fut>(&self, key: &Key<T>, lifecycle: Lifecycle, factory: F) -> BindingInfo
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.install(key.erased(), lifecycle, Factory::Async(erase_async(factory)), None)
    }

    pub fn register_async_with_fallback<T, F, Fut, G>(
        &self,
        key: &Key<T>,
        lifecycle: Lifecycle,
        factory: F,
        fallback: G,
    ) -> BindingInfo
    where
        T: Send + Sync + 'static,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        G: Fn(&Resolver) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.install(
            key.erased(),
            lifecycle,
            Factory::Async(erase_async(factory)),
            Some(erase_sync(fallback)),
        )
    }

    /// Register an existing value as a singleton
    pub fn register_instance<T: Send + Sync + 'static>(&self, key: &Key<T>, instance: T) -> BindingInfo {
        self.register_arc(key, Arc::new(instance))
    }

    /// Register a shared value as a singleton; resolutions return this exact `Arc`
    pub fn register_arc<T: Send + Sync + 'static>(&self, key: &Key<T>, instance: Arc<T>) -> BindingInfo {
        self.install(
            key.erased(),
            Lifecycle::Singleton,
            Factory::Sync(erase_instance(instance)),
            None,
        )
    }

    fn install(
        &self,
        key: &TypeKey,
        lifecycle: Lifecycle,
        factory: Factory,
        fallback: Option<SyncFactory>,
    ) -> BindingInfo {
        let write = self.inner.coordinator.write();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let binding = Arc::new(Binding {
            key: key.clone(),
            lifecycle,
            factory,
            fallback,
            generation,
        });
        let info = binding.info();

        let mut table = write.bindings();
        let replaced = table.insert(key.clone(), binding).is_some();
        write.publish_bindings(table);
        self.inner.invalidate(key, &write.current_scopes());
        drop(write);

        if self.inner.logs(DiLogLevel::Registration) {
            info!(
                key = %key,
                lifecycle = %info.lifecycle,
                is_async = info.is_async,
                replaced,
                "Registered dependency"
            );
        }
        info
    }

    /// Remove the binding for `key` and drop its cached instances
    pub fn unregister<T>(&self, key: &Key<T>) -> bool {
        let key = key.erased();
        let write = self.inner.coordinator.write();
        let mut table = write.bindings();
        let removed = table.remove(key).is_some();
        if removed {
            write.publish_bindings(table);
            self.inner.invalidate(key, &write.current_scopes());
        }
        drop(write);

        if removed && self.inner.logs(DiLogLevel::Registration) {
            info!(key = %key, "Unregistered dependency");
        }
        removed
    }

    pub fn is_registered<T>(&self, key: &Key<T>) -> bool {
        self.inner.coordinator.binding(key.erased()).is_some()
    }

    pub fn binding_info<T>(&self, key: &Key<T>) -> Option<BindingInfo> {
        self.inner
            .coordinator
            .binding(key.erased())
            .map(|binding| binding.info())
    }

    /// Every registered key, sorted by display name
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.inner.coordinator.bindings().keys().cloned().collect();
        keys.sort_by_cached_key(ToString::to_string);
        keys
    }

    /// Number of registered bindings
    pub fn len(&self) -> usize {
        self.inner.coordinator.bindings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ----- resolution ---------------------------------------------------

    /// Resolve `key`, returning `None` when it is absent or cannot be built.
    ///
    /// Use [`Registry::resolve_required`] to tell those cases apart.
    pub fn resolve<T: Send + Sync + 'static>(&self, key: &Key<T>) -> Option<Arc<T>> {
        self.resolve_required(key).ok()
    }

    pub fn resolve_required<T: Send + Sync + 'static>(&self, key: &Key<T>) -> DiResult<Arc<T>> {
        let value = self.inner.resolve_any(key.erased(), &[])?;
        downcast(key.erased(), value)
    }

    pub async fn resolve_async<T: Send + Sync + 'static>(&self, key: &Key<T>) -> Option<Arc<T>> {
        self.resolve_required_async(key).await.ok()
    }

    pub async fn resolve_required_async<T: Send + Sync + 'static>(&self, key: &Key<T>) -> DiResult<Arc<T>> {
        let value = self
            .inner
            .clone()
            .resolve_any_async(key.erased().clone(), Vec::new())
            .await?;
        downcast(key.erased(), value)
    }

    /// Resolver with an empty chain, for code that is generic over factories
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.inner.clone(), Vec::new())
    }

    // ----- cache --------------------------------------------------------

    /// Drop the cached singleton for `key`; the next resolution rebuilds it
    pub fn release<T>(&self, key: &Key<T>) -> bool {
        let released = self
            .inner
            .singletons
            .remove(key.erased())
            .map(|(_, slot)| slot.get().is_some())
            .unwrap_or(false);
        if released && self.inner.logs(DiLogLevel::Optimization) {
            debug!(key = %key.erased(), "Released singleton");
        }
        released
    }

    /// Drop every cached singleton, returning how many instances were held
    pub fn release_all(&self) -> usize {
        let released = populated(&self.inner.singletons);
        self.inner.singletons.clear();
        if self.inner.logs(DiLogLevel::Optimization) {
            debug!(released, "Released all singletons");
        }
        released
    }

    // ----- scopes -------------------------------------------------------

    /// Make `id` the current scope of `kind`.
    ///
    /// Activating the id that is already current keeps its cache. Any other id
    /// starts with an empty cache, including one that was active earlier.
    pub fn activate_scope(&self, kind: ScopeKind, id: impl Into<String>) {
        let id = id.into();
        let write = self.inner.coordinator.write();
        if let Some(current) = write.current_scopes().get(&kind) {
            if current.id() == id {
                return;
            }
        }

        let mut table = write.scopes();
        let previous = table.insert(kind.clone(), Arc::new(ScopeInstance::new(kind.clone(), id.clone())));
        write.publish_scopes(table);
        drop(write);

        if self.inner.logs(DiLogLevel::Registration) {
            info!(
                scope = %kind,
                id = %id,
                previous = ?previous.as_ref().map(|scope| scope.id()),
                "Activated scope"
            );
        }
    }

    /// Drop the cache of the current `kind` scope and leave no scope of that kind active
    pub fn clear_scope(&self, kind: &ScopeKind) -> bool {
        let write = self.inner.coordinator.write();
        let mut table = write.scopes();
        let removed = table.remove(kind);
        if removed.is_some() {
            write.publish_scopes(table);
        }
        drop(write);

        let Some(scope) = removed else {
            return false;
        };
        let dropped = scope.cached_instances();
        scope.cache.clear();
        if self.inner.logs(DiLogLevel::Registration) {
            info!(scope = %kind, id = %scope.id(), dropped, "Cleared scope");
        }
        true
    }

    pub fn current_scope_id(&self, kind: &ScopeKind) -> Option<String> {
        self.inner
            .coordinator
            .scope(kind)
            .map(|scope| scope.id().to_string())
    }

    /// Current scope of every kind, sorted by kind name
    pub fn active_scopes(&self) -> Vec<(ScopeKind, String)> {
        let mut scopes: Vec<(ScopeKind, String)> = self
            .inner
            .coordinator
            .scopes()
            .values()
            .map(|scope| (scope.kind().clone(), scope.id().to_string()))
            .collect();
        scopes.sort_by(|a, b| a.0.name().cmp(b.0.name()));
        scopes
    }

    // ----- diagnostics --------------------------------------------------

    pub fn stats(&self) -> RegistryStats {
        self.inner.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.len())
            .field("active_scopes", &self.active_scopes())
            .field("log_level", &self.log_level())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[test]
    fn test_log_level_round_trips_through_atomic() {
        let registry = Registry::new();
        for level in [
            DiLogLevel::Off,
            DiLogLevel::Errors,
            DiLogLevel::Registration,
            DiLogLevel::Optimization,
            DiLogLevel::All,
        ] {
            registry.set_log_level(level);
            assert_eq!(registry.log_level(), level);
            assert_eq!(registry.config().log_level, level);
        }
    }

    #[test]
    fn test_generation_increases_on_reregistration() {
        let registry = Registry::new();
        let key = Key::<Counter>::new();
        let first = registry.register(&key, Lifecycle::Singleton, |_| Ok(Counter(1)));
        let second = registry.register(&key, Lifecycle::Transient, |_| Ok(Counter(2)));

        assert!(second.generation > first.generation);
        assert_eq!(registry.binding_info(&key), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_drops_cached_singleton() {
        let registry = Registry::new();
        let key = Key::<Counter>::new();
        registry.register(&key, Lifecycle::Singleton, |_| Ok(Counter(1)));
        assert_eq!(registry.resolve(&key).unwrap().0, 1);
        assert!(registry.inner().singletons.contains_key(key.erased()));

        registry.register(&key, Lifecycle::Singleton, |_| Ok(Counter(2)));
        assert!(!registry.inner().singletons.contains_key(key.erased()));
        assert_eq!(registry.resolve(&key).unwrap().0, 2);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = Registry::new();
        let clone = registry.clone();
        let key = Key::<Counter>::new();
        clone.register_instance(&key, Counter(7));

        assert!(registry.is_registered(&key));
        assert_eq!(registry.resolve(&key).unwrap().0, 7);
    }

    #[test]
    fn test_root_resolver_builds_async_binding() {
        let registry = Registry::new();
        let key = Key::<Counter>::new();
        registry.register_async(&key, Lifecycle::Transient, |_| async { anyhow::Ok(Counter(4)) });

        let resolver = registry.resolver();
        assert!(resolver.chain().is_empty());
        let counter = tokio_test::block_on(resolver.resolve_async(&key)).unwrap();
        assert_eq!(counter.0, 4);
    }

    #[test]
    fn test_active_scopes_sorted() {
        let registry = Registry::new();
        registry.activate_scope(ScopeKind::Session, "s");
        registry.activate_scope(ScopeKind::Request, "r");
        registry.activate_scope(ScopeKind::custom("job"), "j");

        let names: Vec<String> = registry
            .active_scopes()
            .into_iter()
            .map(|(kind, _)| kind.to_string())
            .collect();
        assert_eq!(names, vec!["job", "request", "session"]);
    }
}
