//! WeaveDI: a thread-safe dependency registry
//!
//! Components are registered under typed [`Key`]s together with a factory and
//! a [`Lifecycle`]. Resolution builds instances on demand, caches them as the
//! lifecycle dictates and detects circular dependencies.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use weavedi::{Key, Lifecycle, Registry, ScopeKind};
//!
//! struct Config { url: String }
//! struct Client { config: Arc<Config> }
//! struct Session { user: String }
//!
//! let registry = Registry::new();
//! let config = Key::<Config>::new();
//! let client = Key::<Client>::new();
//! let session = Key::<Session>::new();
//!
//! registry.register_instance(&config, Config { url: "db://local".into() });
//! registry.register(&client, Lifecycle::Singleton, |r| {
//!     Ok(Client { config: r.resolve(&Key::<Config>::new())? })
//! });
//! registry.register(&session, Lifecycle::Scoped(ScopeKind::Session), |_| {
//!     Ok(Session { user: "ada".into() })
//! });
//!
//! let a = registry.resolve(&client).unwrap();
//! let b = registry.resolve(&client).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(a.config.url, "db://local");
//!
//! registry.activate_scope(ScopeKind::Session, "user-1");
//! assert_eq!(registry.resolve(&session).unwrap().user, "ada");
//! ```
//!
//! ## Lifecycles
//!
//! - [`Lifecycle::Singleton`]: one instance until released or re-registered
//! - [`Lifecycle::Scoped`]: one instance per active scope of a kind; with no
//!   scope active the binding behaves as transient
//! - [`Lifecycle::Transient`]: a new instance on every resolution
//!
//! ## Async factories
//!
//! Bindings registered with [`Registry::register_async`] are built by
//! [`Registry::resolve_async`]. Concurrent first resolutions of a cached
//! binding share one factory call.

pub mod binding;
mod cache;
mod coordinator;
pub mod error;
pub mod health;
pub mod inject;
pub mod key;
pub mod module;
mod pending;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod stats;

pub use binding::{BindingInfo, Lifecycle};
pub use error::{DiError, DiResult};
pub use health::{ActiveScope, HealthReport, HealthStatus, MissingDependency};
pub use inject::{Injected, Provided};
pub use key::{Key, TypeKey};
pub use module::{DependencyModule, ModuleRegistry};
pub use registry::Registry;
pub use resolver::Resolver;
pub use scope::ScopeKind;
pub use stats::RegistryStats;
pub use weavedi_config::{DiLogLevel, HealthConfig, RegistryConfig};
