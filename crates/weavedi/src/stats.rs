//! Resolution statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the registry counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Resolve calls, nested ones included
    pub resolutions: u64,
    /// Resolutions answered from a singleton or scope cache
    pub cache_hits: u64,
    /// Primary factory invocations that succeeded
    pub constructions: u64,
    /// Resolutions answered by a fallback factory
    pub fallbacks: u64,
    /// Resolutions that failed for any reason other than a missing binding
    pub failures: u64,
    /// Resolutions of keys with no binding
    pub not_found: u64,
    /// Circular chains detected
    pub cycles: u64,
}

impl RegistryStats {
    /// Share of resolutions served from cache, as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.resolutions == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / self.resolutions as f64) * 100.0
        }
    }
}

#[derive(Default)]
pub(crate) struct StatsCollector {
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    constructions: AtomicU64,
    fallbacks: AtomicU64,
    failures: AtomicU64,
    not_found: AtomicU64,
    cycles: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn construction(&self) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.resolutions,
            &self.cache_hits,
            &self.constructions,
            &self.fallbacks,
            &self.failures,
            &self.not_found,
            &self.cycles,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
