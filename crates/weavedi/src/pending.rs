//! Dependency edges of resolutions that are still running.
//!
//! Every nested resolution records `parent -> child` for as long as it runs.
//! Before a resolution blocks on a cell that another thread may be filling,
//! it walks these edges from the key it wants: reaching a key of its own
//! chain means the other side is (transitively) waiting on it.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::key::TypeKey;

#[derive(Default)]
pub(crate) struct PendingEdges {
    edges: DashMap<TypeKey, Vec<TypeKey>>,
}

impl PendingEdges {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record that `parent` is resolving `child` until the guard drops
    pub(crate) fn enter(&self, parent: Option<&TypeKey>, child: &TypeKey) -> PendingGuard<'_> {
        let edge = parent.map(|parent| {
            self.edges
                .entry(parent.clone())
                .or_default()
                .push(child.clone());
            (parent.clone(), child.clone())
        });
        PendingGuard {
            pending: self,
            edge,
        }
    }

    /// First key of `chain` reachable from `from` over running edges
    pub(crate) fn reaches(&self, from: &TypeKey, chain: &[TypeKey]) -> Option<TypeKey> {
        let mut seen = HashSet::new();
        let mut stack = vec![from.clone()];
        while let Some(key) = stack.pop() {
            if let Some(hit) = chain.iter().find(|k| **k == key) {
                return Some(hit.clone());
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(children) = self.edges.get(&key) {
                stack.extend(children.iter().cloned());
            }
        }
        None
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.edges.iter().map(|entry| entry.value().len()).sum()
    }

    fn leave(&self, parent: &TypeKey, child: &TypeKey) {
        if let Entry::Occupied(mut entry) = self.edges.entry(parent.clone()) {
            let children = entry.get_mut();
            if let Some(pos) = children.iter().position(|k| k == child) {
                children.swap_remove(pos);
            }
            if children.is_empty() {
                entry.remove();
            }
        }
    }
}

/// Removes its edge on drop, whichever way the resolution ends
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingEdges,
    edge: Option<(TypeKey, TypeKey)>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some((parent, child)) = self.edge.take() {
            self.pending.leave(&parent, &child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct C;

    #[test]
    fn test_reaches_follows_running_edges() {
        let pending = PendingEdges::new();
        let (a, b, c) = (TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<C>());

        let _ab = pending.enter(Some(&a), &b);
        let _bc = pending.enter(Some(&b), &c);

        assert_eq!(pending.reaches(&b, &[a.clone()]), None);
        assert_eq!(pending.reaches(&a, &[c.clone()]), Some(c.clone()));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_guard_drop_removes_edge() {
        let pending = PendingEdges::new();
        let (a, b) = (TypeKey::of::<A>(), TypeKey::of::<B>());

        {
            let _first = pending.enter(Some(&a), &b);
            let _second = pending.enter(Some(&a), &b);
            let _root = pending.enter(None, &a);
            assert_eq!(pending.len(), 2);
        }

        assert_eq!(pending.len(), 0);
        assert_eq!(pending.reaches(&a, &[b]), None);
    }
}
