//! Dependency modules
//!
//! A module groups related registrations so an application can assemble its
//! registry from independent parts:
//!
//! ```rust
//! use weavedi::{DependencyModule, DiResult, Key, Lifecycle, ModuleRegistry, Registry};
//!
//! struct Storage;
//! struct StorageModule;
//!
//! impl DependencyModule for StorageModule {
//!     fn name(&self) -> &'static str {
//!         "storage"
//!     }
//!
//!     fn register(&self, registry: &Registry) -> DiResult<()> {
//!         registry.register(&Key::<Storage>::new(), Lifecycle::Singleton, |_| Ok(Storage));
//!         Ok(())
//!     }
//! }
//!
//! let mut modules = ModuleRegistry::new();
//! modules.add(StorageModule);
//!
//! let registry = Registry::new();
//! modules.register_all(&registry).unwrap();
//! assert!(registry.is_registered(&Key::<Storage>::new()));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use weavedi_config::DiLogLevel;

use crate::error::{DiError, DiResult};
use crate::registry::Registry;

/// A unit of registrations.
#[async_trait]
pub trait DependencyModule: Send + Sync {
    /// Name used in logs and by other modules' [`dependencies`](Self::dependencies)
    fn name(&self) -> &'static str;

    /// Lower values register first among modules whose dependencies are met.
    /// Default is 100.
    fn priority(&self) -> u32 {
        100
    }

    /// Modules that must register before this one
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn register(&self, registry: &Registry) -> DiResult<()>;

    /// Registrations that need async setup, run after every module's `register`
    #[allow(unused_variables)]
    async fn register_async(&self, registry: &Registry) -> DiResult<()> {
        Ok(())
    }

    /// Check that what this module needs is registered.
    ///
    /// Called once all modules have registered.
    #[allow(unused_variables)]
    fn validate(&self, registry: &Registry) -> DiResult<()> {
        Ok(())
    }
}

/// Ordered collection of modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn DependencyModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: DependencyModule + 'static>(&mut self, module: M) -> &mut Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn add_arc(&mut self, module: Arc<dyn DependencyModule>) -> &mut Self {
        self.modules.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module names in insertion order
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Registration order: dependencies first, then by priority, then by insertion
    pub fn registration_order(&self) -> DiResult<Vec<&'static str>> {
        Ok(self.ordered()?.into_iter().map(|m| m.name()).collect())
    }

    fn ordered(&self) -> DiResult<Vec<&Arc<dyn DependencyModule>>> {
        let known: HashSet<&'static str> = self.modules.iter().map(|m| m.name()).collect();
        for module in &self.modules {
            if let Some(unknown) = module.dependencies().iter().find(|d| !known.contains(*d)) {
                return Err(DiError::InvalidModule {
                    module: module.name().to_string(),
                    reason: format!("depends on unknown module '{unknown}'"),
                });
            }
        }

        let mut pending: Vec<&Arc<dyn DependencyModule>> = self.modules.iter().collect();
        pending.sort_by_key(|m| m.priority());

        let mut done: HashSet<&'static str> = HashSet::new();
        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|m| m.dependencies().iter().all(|d| done.contains(d)));
            let Some(index) = ready else {
                let stuck: Vec<&str> = pending.iter().map(|m| m.name()).collect();
                return Err(DiError::InvalidModule {
                    module: stuck[0].to_string(),
                    reason: format!("circular module dependencies among {}", stuck.join(", ")),
                });
            };
            let module = pending.remove(index);
            done.insert(module.name());
            order.push(module);
        }
        Ok(order)
    }

    /// Register every module, then validate them all
    pub fn register_all(&self, registry: &Registry) -> DiResult<()> {
        let ordered = self.ordered()?;
        let verbose = registry.log_level().allows(DiLogLevel::Registration);

        if verbose {
            info!("Registering {} dependency modules", ordered.len());
        }
        for module in &ordered {
            if verbose {
                debug!(module = module.name(), priority = module.priority(), "Registering module");
            }
            module.register(registry)?;
        }

        for module in &ordered {
            module.validate(registry)?;
        }
        Ok(())
    }

    /// [`register_all`](Self::register_all) followed by every module's async registration
    pub async fn register_all_async(&self, registry: &Registry) -> DiResult<()> {
        self.register_all(registry)?;
        for module in self.ordered()? {
            module.register_async(registry).await?;
        }
        Ok(())
    }
}
