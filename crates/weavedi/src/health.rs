//! Registry health checks.
//!
//! A check inspects the dependency edges observed during resolution and the
//! cache slots currently held, and optionally prunes what no longer matches a
//! registration.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use weavedi_config::DiLogLevel;

use crate::cache::{populated, SlotMap};
use crate::coordinator::BindingTable;
use crate::key::TypeKey;
use crate::registry::Registry;

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A registered binding that asked for a key nothing provides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub dependent: String,
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveScope {
    pub kind: String,
    pub id: String,
    /// Instances held by the scope's cache
    pub cached: usize,
    pub age_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub registered: usize,
    pub cached_singletons: usize,
    pub active_scopes: Vec<ActiveScope>,
    pub missing_dependencies: Vec<MissingDependency>,
    /// Cache slots with no binding or one left by a replaced binding
    pub orphaned_slots: usize,
    /// Dependency edges whose dependent is no longer registered
    pub stale_edges: usize,
    /// Orphaned slots and stale edges removed by this check
    pub fixed: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Keys of slots in `cache` that do not belong to the current binding
fn orphans(cache: &SlotMap, bindings: &BindingTable) -> Vec<TypeKey> {
    cache
        .iter()
        .filter(|entry| {
            bindings
                .get(entry.key())
                .map_or(true, |binding| binding.generation != entry.value().generation())
        })
        .map(|entry| entry.key().clone())
        .collect()
}

impl Registry {
    /// Inspect the registry, pruning problems when `health.auto_fix` is set
    pub fn health_check(&self) -> HealthReport {
        let inner = self.inner();
        let settings = &inner.config.health;
        let bindings = inner.coordinator.bindings();
        let scopes = inner.coordinator.scopes();

        let mut stale = Vec::new();
        let mut dangling = Vec::new();
        let mut missing = Vec::new();
        for edge in inner.edges.iter() {
            let (dependent, dependency) = &*edge;
            if !bindings.contains_key(dependent) {
                stale.push((dependent.clone(), dependency.clone()));
            } else if !bindings.contains_key(dependency) {
                dangling.push((dependent.clone(), dependency.clone()));
                missing.push(MissingDependency {
                    dependent: dependent.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
        missing.sort_by(|a, b| (&a.dependent, &a.dependency).cmp(&(&b.dependent, &b.dependency)));

        let singleton_orphans = orphans(&inner.singletons, &bindings);
        let scope_orphans: Vec<_> = scopes
            .values()
            .map(|scope| (scope.clone(), orphans(&scope.cache, &bindings)))
            .collect();
        let orphaned_slots =
            singleton_orphans.len() + scope_orphans.iter().map(|(_, keys)| keys.len()).sum::<usize>();

        let mut fixed = 0;
        if settings.auto_fix {
            // missing dependencies stay in this report and come back on the next request
            for edge in stale.iter().chain(&dangling) {
                if inner.edges.remove(edge).is_some() {
                    fixed += 1;
                }
            }
            for key in &singleton_orphans {
                if inner.singletons.remove(key).is_some() {
                    fixed += 1;
                }
            }
            for (scope, keys) in &scope_orphans {
                for key in keys {
                    if scope.cache.remove(key).is_some() {
                        fixed += 1;
                    }
                }
            }
            if fixed > 0 && inner.logs(DiLogLevel::Optimization) {
                info!(fixed, "Health check pruned stale registry state");
            }
        }

        let mut active_scopes: Vec<ActiveScope> = scopes
            .values()
            .map(|scope| ActiveScope {
                kind: scope.kind().to_string(),
                id: scope.id().to_string(),
                cached: scope.cached_instances(),
                age_ms: scope.age().as_millis() as u64,
            })
            .collect();
        active_scopes.sort_by(|a, b| a.kind.cmp(&b.kind));

        let unresolved = if settings.auto_fix {
            0
        } else {
            orphaned_slots + stale.len()
        };
        let status = if !missing.is_empty() && settings.fail_on_missing {
            HealthStatus::Unhealthy
        } else if !missing.is_empty() || unresolved > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        if status != HealthStatus::Healthy && inner.logs(DiLogLevel::Errors) {
            warn!(
                status = ?status,
                missing = missing.len(),
                orphaned_slots,
                stale_edges = stale.len(),
                "Registry health check found problems"
            );
        }

        HealthReport {
            status,
            registered: bindings.len(),
            cached_singletons: populated(&inner.singletons),
            active_scopes,
            missing_dependencies: missing,
            orphaned_slots,
            stale_edges: stale.len(),
            fixed,
        }
    }
}
