//! Consensus ordering
//!
//! When every witness of the lowest unprocessed round is decided, the events
//! that all famous witnesses of that round descend from are received in
//! that round and appended to the consensus log, sorted by
//! `(round_received, consensus_timestamp, tiebreak)`.

use crate::ancestry::AncestorEngine;
use crate::round::{RoundStatus, WitnessTable};
use crate::store::EventStore;
use bitvec::vec::BitVec;
use hashbrown::HashMap;
use knot_core::{CreatorId, Event, EventId, Round, Signature, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// An event with its final position in the consensus order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedEvent {
    pub event: Event,
    pub round_received: Round,
    pub consensus_timestamp: Timestamp,
    /// Signature whitened with the famous witnesses of the receiving round
    pub tiebreak: Signature,
    /// Index in the consensus log
    pub position: u64,
}

/// Incremental total-order computation
#[derive(Debug)]
pub struct ConsensusOrderer {
    /// Per event: earliest descendant (or itself) of each creator
    first_seen: Vec<HashMap<CreatorId, usize>>,
    ordered: BitVec,
    next_round: Round,
    log: Vec<OrderedEvent>,
    pending: Vec<OrderedEvent>,
}

impl Default for ConsensusOrderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusOrderer {
    pub fn new() -> Self {
        Self {
            first_seen: Vec::new(),
            ordered: BitVec::new(),
            next_round: 1,
            log: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Record the new event at `idx` as the first event of its creator to
    /// know about each of its ancestors that the creator had not seen yet.
    ///
    /// Ancestors of the self-parent already have an entry for this creator,
    /// so only the difference is walked.
    pub fn observe(&mut self, store: &EventStore, ancestry: &AncestorEngine, idx: usize) {
        if self.first_seen.len() <= idx {
            self.first_seen.resize_with(idx + 1, HashMap::new);
        }
        let creator = store.event_at(idx).creator();
        self.first_seen[idx].insert(creator, idx);

        let self_parent = store.parent_indices(idx).map(|(sp, _)| sp);
        for a in ancestry.ancestors(idx) {
            if let Some(sp) = self_parent {
                if a == sp || ancestry.is_ancestor(sp, a) {
                    continue;
                }
            }
            self.first_seen[a].entry(creator).or_insert(idx);
        }
    }

    /// Process every round that has become fully decided, in order.
    ///
    /// Returns the number of newly ordered events.
    pub fn advance(
        &mut self,
        store: &EventStore,
        ancestry: &AncestorEngine,
        witnesses: &WitnessTable,
    ) -> usize {
        let mut emitted = 0;
        loop {
            let round = self.next_round;
            let famous = match witnesses.status(round) {
                RoundStatus::Decided(famous) => famous,
                RoundStatus::Pending | RoundStatus::Unknown => break,
            };
            self.next_round += 1;

            if famous.is_empty() {
                debug!(round, "round decided without famous witnesses");
                continue;
            }
            emitted += self.receive_round(store, ancestry, round, &famous);
        }
        emitted
    }

    fn receive_round(
        &mut self,
        store: &EventStore,
        ancestry: &AncestorEngine,
        round: Round,
        famous: &[usize],
    ) -> usize {
        let Some((&first, rest)) = famous.split_first() else {
            return 0;
        };

        let whitener = famous
            .iter()
            .fold(Signature::ZERO, |acc, &f| acc.xor(store.event_at(f).signature()));

        let mut batch: Vec<(Timestamp, Signature, EventId, usize)> = ancestry
            .ancestors(first)
            .filter(|&e| !self.is_ordered(e))
            .filter(|&e| rest.iter().all(|&f| ancestry.is_ancestor(f, e)))
            .map(|e| {
                let event = store.event_at(e);
                (
                    self.median_timestamp(store, ancestry, e, famous),
                    event.signature().xor(&whitener),
                    event.id(),
                    e,
                )
            })
            .collect();
        batch.sort_unstable();

        let count = batch.len();
        for (consensus_timestamp, tiebreak, _, e) in batch {
            self.mark_ordered(e);
            let record = OrderedEvent {
                event: store.event_at(e).clone(),
                round_received: round,
                consensus_timestamp,
                tiebreak,
                position: self.log.len() as u64,
            };
            self.log.push(record.clone());
            self.pending.push(record);
        }

        info!(
            round,
            famous = famous.len(),
            events = count,
            total = self.log.len(),
            "round received"
        );
        count
    }

    /// Median (upper for even counts) timestamp of the first descendants
    /// of `e` that every famous witness can see.
    fn median_timestamp(
        &self,
        store: &EventStore,
        ancestry: &AncestorEngine,
        e: usize,
        famous: &[usize],
    ) -> Timestamp {
        let mut stamps: Vec<Timestamp> = self
            .first_seen
            .get(e)
            .into_iter()
            .flat_map(|by_creator| by_creator.values())
            .filter(|&&d| famous.iter().all(|&f| ancestry.can_see(f, d)))
            .map(|&d| store.event_at(d).timestamp())
            .collect();
        stamps.sort_unstable();
        stamps
            .get(stamps.len() / 2)
            .copied()
            .unwrap_or_else(|| store.event_at(e).timestamp())
    }

    fn mark_ordered(&mut self, idx: usize) {
        if self.ordered.len() <= idx {
            self.ordered.resize(idx + 1, false);
        }
        self.ordered.set(idx, true);
    }

    pub fn is_ordered(&self, idx: usize) -> bool {
        idx < self.ordered.len() && self.ordered[idx]
    }

    /// Lowest round whose witnesses are not all decided yet
    pub fn next_round(&self) -> Round {
        self.next_round
    }

    /// Cumulative consensus log
    pub fn log(&self) -> &[OrderedEvent] {
        &self.log
    }

    /// Events ordered since the previous call
    pub fn take_pending(&mut self) -> Vec<OrderedEvent> {
        std::mem::take(&mut self.pending)
    }

    /// First-to-know event of each creator for `idx`
    pub fn first_descendants(&self, idx: usize) -> Vec<(CreatorId, usize)> {
        let mut entries: Vec<(CreatorId, usize)> = self
            .first_seen
            .get(idx)
            .map(|m| m.iter().map(|(&c, &d)| (c, d)).collect())
            .unwrap_or_default();
        entries.sort_unstable();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_orderer() {
        let mut orderer = ConsensusOrderer::new();
        let store = EventStore::new(4);
        let ancestry = AncestorEngine::new();
        let witnesses = WitnessTable::new();

        assert_eq!(orderer.advance(&store, &ancestry, &witnesses), 0);
        assert_eq!(orderer.next_round(), 1);
        assert!(orderer.log().is_empty());
        assert!(orderer.take_pending().is_empty());
        assert!(orderer.first_descendants(0).is_empty());
        assert!(!orderer.is_ordered(3));
    }
}
