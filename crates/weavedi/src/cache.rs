//! Memoization slots shared by the singleton cache and scope caches.

use std::any::Any;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::key::TypeKey;

/// Type-erased resolved instance
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Cache keyed by binding identity
pub(crate) type SlotMap = DashMap<TypeKey, Arc<Slot>>;

/// One cache entry.
///
/// The cell used depends on the binding's factory kind, so a sync factory and
/// its async resolution path share one single-flight cell.
pub(crate) struct Slot {
    generation: u64,
    ready: once_cell::sync::OnceCell<AnyArc>,
    pending: tokio::sync::OnceCell<AnyArc>,
}

impl Slot {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            ready: once_cell::sync::OnceCell::new(),
            pending: tokio::sync::OnceCell::new(),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn get(&self) -> Option<AnyArc> {
        self.ready.get().or_else(|| self.pending.get()).cloned()
    }

    /// Cell for bindings with a synchronous factory
    pub(crate) fn sync_cell(&self) -> &once_cell::sync::OnceCell<AnyArc> {
        &self.ready
    }

    /// Cell for bindings with an asynchronous factory
    pub(crate) fn async_cell(&self) -> &tokio::sync::OnceCell<AnyArc> {
        &self.pending
    }
}

/// Cached value for `key`, if one was produced by the binding at `generation`
pub(crate) fn cached(map: &SlotMap, key: &TypeKey, generation: u64) -> Option<AnyArc> {
    let slot = map.get(key).map(|entry| entry.value().clone())?;
    if slot.generation() == generation {
        slot.get()
    } else {
        None
    }
}

/// Slot that a resolution of `key` at `generation` should populate.
///
/// Slots from older generations are replaced. A caller working from an
/// outdated binding snapshot gets a detached slot so it cannot overwrite the
/// newer entry.
pub(crate) fn slot_for(map: &SlotMap, key: &TypeKey, generation: u64) -> Arc<Slot> {
    match map.entry(key.clone()) {
        Entry::Occupied(mut occupied) => {
            let current = occupied.get().generation();
            if current == generation {
                occupied.get().clone()
            } else if current < generation {
                let fresh = Arc::new(Slot::new(generation));
                occupied.insert(fresh.clone());
                fresh
            } else {
                Arc::new(Slot::new(generation))
            }
        }
        Entry::Vacant(vacant) => vacant
            .insert(Arc::new(Slot::new(generation)))
            .value()
            .clone(),
    }
}

/// Number of slots that hold a value
pub(crate) fn populated(map: &SlotMap) -> usize {
    map.iter().filter(|entry| entry.value().get().is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(n: u32) -> AnyArc {
        Arc::new(n)
    }

    #[test]
    fn test_slot_reused_for_same_generation() {
        let map = SlotMap::new();
        let key = TypeKey::of::<u32>();

        let first = slot_for(&map, &key, 1);
        let second = slot_for(&map, &key, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_newer_generation_replaces_slot() {
        let map = SlotMap::new();
        let key = TypeKey::of::<u32>();

        let old = slot_for(&map, &key, 1);
        old.sync_cell().set(value(1)).unwrap();
        assert!(cached(&map, &key, 1).is_some());

        let new = slot_for(&map, &key, 2);
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(cached(&map, &key, 2).is_none());
        assert!(cached(&map, &key, 1).is_none());
    }

    #[test]
    fn test_stale_generation_gets_detached_slot() {
        let map = SlotMap::new();
        let key = TypeKey::of::<u32>();

        let current = slot_for(&map, &key, 5);
        let stale = slot_for(&map, &key, 3);
        stale.sync_cell().set(value(3)).unwrap();

        assert!(!Arc::ptr_eq(&current, &stale));
        assert_eq!(map.get(&key).unwrap().generation(), 5);
        assert!(cached(&map, &key, 5).is_none());
    }

    #[test]
    fn test_populated_counts_filled_slots() {
        let map = SlotMap::new();
        slot_for(&map, &TypeKey::of::<u32>(), 1)
            .sync_cell()
            .set(value(1))
            .unwrap();
        slot_for(&map, &TypeKey::of::<u64>(), 1);
        assert_eq!(populated(&map), 1);
    }
}
