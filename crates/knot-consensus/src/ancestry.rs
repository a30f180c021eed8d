//! Ancestor engine
//!
//! Ancestor sets are bitsets over arena indices. Because every ancestor of
//! an event was admitted before it, the set of event `i` only has bits
//! below `i`. Sets never change after admission, so they are memoized
//! permanently.
//!
//! ```text
//! ancestors(e)      = {sp, op} ∪ ancestors(sp) ∪ ancestors(op)
//! self_ancestors(e) = {sp} ∪ self_ancestors(sp)
//! can_see(a, b)     = a == b || b ∈ ancestors(a)
//! strongly_see(a,b) = can_see(a, b) &&
//!                     |{creator(e) : e ∈ ancestors(a), can_see(e, b)}| >= supermajority(n)
//! ```

use crate::store::EventStore;
use bitvec::vec::BitVec;
use hashbrown::{HashMap, HashSet};
use knot_core::supermajority;

#[derive(Debug, Clone)]
struct AncestorSets {
    full: BitVec,
    own: BitVec,
}

fn has_bit(bits: &BitVec, idx: usize) -> bool {
    idx < bits.len() && bits[idx]
}

fn combine(
    idx: usize,
    sp: usize,
    op: usize,
    sp_sets: &AncestorSets,
    op_sets: &AncestorSets,
) -> AncestorSets {
    let mut full = sp_sets.full.clone();
    full.resize(idx, false);
    for i in op_sets.full.iter_ones() {
        full.set(i, true);
    }
    full.set(sp, true);
    full.set(op, true);

    let mut own = sp_sets.own.clone();
    own.resize(idx, false);
    own.set(sp, true);

    AncestorSets { full, own }
}

/// Memoized reachability over the event DAG
#[derive(Debug, Default)]
pub struct AncestorEngine {
    sets: Vec<Option<AncestorSets>>,
    /// (who, whom) -> strongly sees, valid for `strong_basis` participants
    strong: HashMap<(usize, usize), bool>,
    strong_basis: usize,
}

impl AncestorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self, idx: usize) -> bool {
        matches!(self.sets.get(idx), Some(Some(_)))
    }

    /// Compute and memoize the ancestor sets of `root` and of every
    /// unresolved event below it, using an explicit stack.
    pub fn resolve(&mut self, store: &EventStore, root: usize) {
        if self.sets.len() < store.len() {
            self.sets.resize(store.len(), None);
        }

        let mut stack = vec![root];
        while let Some(&idx) = stack.last() {
            if self.is_resolved(idx) {
                stack.pop();
                continue;
            }

            let Some((sp, op)) = store.parent_indices(idx) else {
                self.sets[idx] = Some(AncestorSets {
                    full: BitVec::new(),
                    own: BitVec::new(),
                });
                stack.pop();
                continue;
            };

            let pending: Vec<usize> = [sp, op]
                .into_iter()
                .filter(|&p| !self.is_resolved(p))
                .collect();
            if !pending.is_empty() {
                stack.extend(pending);
                continue;
            }

            let combined = match (self.sets.get(sp), self.sets.get(op)) {
                (Some(Some(sp_sets)), Some(Some(op_sets))) => {
                    Some(combine(idx, sp, op, sp_sets, op_sets))
                }
                _ => None,
            };
            self.sets[idx] = combined;
            stack.pop();
        }
    }

    /// Drop every memoized set. Only needed if events are ever removed.
    pub fn clear(&mut self) {
        self.sets.clear();
        self.strong.clear();
    }

    /// Whether `whom` is a strict ancestor of `who`
    pub fn is_ancestor(&self, who: usize, whom: usize) -> bool {
        match self.sets.get(who) {
            Some(Some(sets)) => has_bit(&sets.full, whom),
            _ => false,
        }
    }

    pub fn is_self_ancestor(&self, who: usize, whom: usize) -> bool {
        match self.sets.get(who) {
            Some(Some(sets)) => has_bit(&sets.own, whom),
            _ => false,
        }
    }

    pub fn can_see(&self, who: usize, whom: usize) -> bool {
        who == whom || self.is_ancestor(who, whom)
    }

    /// Strict ancestors of `idx`, ascending by admission order
    pub fn ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.sets
            .get(idx)
            .and_then(Option::as_ref)
            .into_iter()
            .flat_map(|sets| sets.full.iter_ones())
    }

    pub fn self_ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.sets
            .get(idx)
            .and_then(Option::as_ref)
            .into_iter()
            .flat_map(|sets| sets.own.iter_ones())
    }

    pub fn ancestor_count(&self, idx: usize) -> usize {
        match self.sets.get(idx) {
            Some(Some(sets)) => sets.full.count_ones(),
            _ => 0,
        }
    }

    /// Strong visibility against a participant set of size `participants`.
    ///
    /// Results are cached until the participant count changes.
    pub fn can_strongly_see(
        &mut self,
        store: &EventStore,
        who: usize,
        whom: usize,
        participants: usize,
    ) -> bool {
        if self.strong_basis != participants {
            self.strong.clear();
            self.strong_basis = participants;
        }
        if let Some(&cached) = self.strong.get(&(who, whom)) {
            return cached;
        }
        let result = self.count_seeing_creators(store, who, whom, participants)
            >= supermajority(participants);
        self.strong.insert((who, whom), result);
        result
    }

    /// Distinct creators among ancestors of `who` that can see `whom`,
    /// stopping early once `enough` is reached.
    fn count_seeing_creators(
        &self,
        store: &EventStore,
        who: usize,
        whom: usize,
        participants: usize,
    ) -> usize {
        if !self.can_see(who, whom) {
            return 0;
        }
        let enough = supermajority(participants);
        let mut creators = HashSet::new();
        for e in self.ancestors(who) {
            if self.can_see(e, whom) {
                creators.insert(store.event_at(e).creator());
                if creators.len() >= enough {
                    break;
                }
            }
        }
        creators.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knot_core::{Event, EventParams};
    use knot_crypto::KeyPair;

    fn push(store: &mut EventStore, event: Event) -> usize {
        store.validate(&event).unwrap();
        store.insert(event)
    }

    #[test]
    fn test_genesis_has_no_ancestors() {
        let mut store = EventStore::new(8);
        let alice = KeyPair::derive("knot.ancestry.test", 1);
        let idx = push(&mut store, Event::create(EventParams::genesis(1), &alice));

        let mut engine = AncestorEngine::new();
        engine.resolve(&store, idx);

        assert_eq!(engine.ancestors(idx).count(), 0);
        assert!(engine.can_see(idx, idx));
    }

    #[test]
    fn test_ancestors_and_self_ancestors() {
        let mut store = EventStore::new(8);
        let alice = KeyPair::derive("knot.ancestry.test", 1);
        let bob = KeyPair::derive("knot.ancestry.test", 2);

        let a1 = Event::create(EventParams::genesis(1), &alice);
        let b1 = Event::create(EventParams::genesis(2), &bob);
        let a2 = Event::create(EventParams::child(a1.id(), b1.id(), 3), &alice);
        let b2 = Event::create(EventParams::child(b1.id(), a2.id(), 4), &bob);

        let ia1 = push(&mut store, a1);
        let ib1 = push(&mut store, b1);
        let ia2 = push(&mut store, a2);
        let ib2 = push(&mut store, b2);

        let mut engine = AncestorEngine::new();
        engine.resolve(&store, ib2);

        let ancestors: Vec<usize> = engine.ancestors(ib2).collect();
        assert_eq!(ancestors, vec![ia1, ib1, ia2]);

        let own: Vec<usize> = engine.self_ancestors(ib2).collect();
        assert_eq!(own, vec![ib1]);

        assert!(engine.can_see(ib2, ia1));
        assert!(!engine.can_see(ia2, ib2));
        assert!(engine.is_self_ancestor(ia2, ia1));
        assert!(!engine.is_self_ancestor(ia2, ib1));
    }

    #[test]
    fn test_long_chain_resolves_without_recursion() {
        let mut store = EventStore::new(8);
        let alice = KeyPair::derive("knot.ancestry.test", 1);
        let bob = KeyPair::derive("knot.ancestry.test", 2);

        let b1 = Event::create(EventParams::genesis(0), &bob);
        let b1_id = b1.id();
        push(&mut store, b1);

        let mut prev = Event::create(EventParams::genesis(1), &alice);
        push(&mut store, prev.clone());
        for ts in 2..5_000u64 {
            let next = Event::create(EventParams::child(prev.id(), b1_id, ts), &alice);
            push(&mut store, next.clone());
            prev = next;
        }

        // nothing memoized yet: the whole chain is walked by the worklist
        let mut engine = AncestorEngine::new();
        let tip = store.len() - 1;
        engine.resolve(&store, tip);

        assert_eq!(engine.ancestor_count(tip), tip);
        assert_eq!(engine.self_ancestors(tip).count(), tip - 1);
    }
}
