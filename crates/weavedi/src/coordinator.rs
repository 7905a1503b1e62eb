//! Copy-on-write tables shared between readers and a single writer.
//!
//! Readers take a read lock only long enough to clone an `Arc` or look up one
//! entry, so they always observe a complete table: the one before a write or
//! the one after it. Writers hold the writer mutex for their whole
//! read-modify-publish sequence, which serializes every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::binding::Binding;
use crate::key::TypeKey;
use crate::scope::{ScopeInstance, ScopeKind};

pub(crate) type BindingTable = HashMap<TypeKey, Arc<Binding>>;
pub(crate) type ScopeTable = HashMap<ScopeKind, Arc<ScopeInstance>>;

#[derive(Default)]
pub(crate) struct Coordinator {
    writer: Mutex<()>,
    bindings: RwLock<Arc<BindingTable>>,
    scopes: RwLock<Arc<ScopeTable>>,
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn binding(&self, key: &TypeKey) -> Option<Arc<Binding>> {
        self.bindings.read().get(key).cloned()
    }

    pub(crate) fn bindings(&self) -> Arc<BindingTable> {
        self.bindings.read().clone()
    }

    pub(crate) fn scope(&self, kind: &ScopeKind) -> Option<Arc<ScopeInstance>> {
        self.scopes.read().get(kind).cloned()
    }

    pub(crate) fn scopes(&self) -> Arc<ScopeTable> {
        self.scopes.read().clone()
    }

    /// Begin a serialized write
    pub(crate) fn write(&self) -> WriteGuard<'_> {
        WriteGuard {
            coordinator: self,
            _lock: self.writer.lock(),
        }
    }
}

/// Exclusive write access; dropping it lets the next writer in
pub(crate) struct WriteGuard<'a> {
    coordinator: &'a Coordinator,
    _lock: MutexGuard<'a, ()>,
}

impl WriteGuard<'_> {
    /// Private copy of the current binding table to modify and publish
    pub(crate) fn bindings(&self) -> BindingTable {
        BindingTable::clone(&self.coordinator.bindings.read())
    }

    pub(crate) fn publish_bindings(&self, table: BindingTable) {
        *self.coordinator.bindings.write() = Arc::new(table);
    }

    /// Private copy of the current scope table to modify and publish
    pub(crate) fn scopes(&self) -> ScopeTable {
        ScopeTable::clone(&self.coordinator.scopes.read())
    }

    /// Current scope table without copying it
    pub(crate) fn current_scopes(&self) -> Arc<ScopeTable> {
        self.coordinator.scopes()
    }

    pub(crate) fn publish_scopes(&self, table: ScopeTable) {
        *self.coordinator.scopes.write() = Arc::new(table);
    }
}
