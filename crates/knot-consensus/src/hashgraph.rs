//! The consensus engine facade
//!
//! `Hashgraph` owns every component and serializes all mutation through
//! `&mut self`. Hosts that share it between tasks wrap it in a single
//! owner (mutex or actor).
//!
//! ```text
//! submit_event ─► validate ─► store ─► ancestry ─► classify
//!                    │                               │ witness?
//!                    ▼                               ▼
//!                 orphans ◄── drain_orphans      fame decider ─► orderer ─► log
//! ```

use crate::ancestry::AncestorEngine;
use crate::config::ConsensusConfig;
use crate::error::{Admission, Rejection, SubmitResult};
use crate::fame::FameDecider;
use crate::order::{ConsensusOrderer, OrderedEvent};
use crate::round::{classify, Fame, WitnessTable};
use crate::store::EventStore;
use hashbrown::{HashMap, HashSet};
use knot_core::{CreatorId, Event, EventId, EventShape, Round, SignatureVerifier};
use knot_crypto::Ed25519Verifier;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Snapshot of engine state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsensusStats {
    pub events: usize,
    pub orphans: usize,
    pub participants: usize,
    pub max_round: Round,
    pub witnesses: usize,
    pub famous: usize,
    pub not_famous: usize,
    pub undecided: usize,
    pub ordered: usize,
    /// Lowest round not yet received
    pub pending_round: Round,
    /// Rejection counts by reason
    pub rejections: BTreeMap<&'static str, u64>,
}

/// Hashgraph consensus engine
pub struct Hashgraph<V: SignatureVerifier = Ed25519Verifier> {
    config: ConsensusConfig,
    verifier: V,
    store: EventStore,
    ancestry: AncestorEngine,
    witnesses: WitnessTable,
    fame: FameDecider,
    orderer: ConsensusOrderer,
    rejections: BTreeMap<&'static str, u64>,
}

impl Hashgraph<Ed25519Verifier> {
    /// Engine verifying Ed25519 signatures
    pub fn new(config: ConsensusConfig) -> Self {
        Self::with_verifier(config, Ed25519Verifier)
    }
}

impl<V: SignatureVerifier> Hashgraph<V> {
    pub fn with_verifier(config: ConsensusConfig, verifier: V) -> Self {
        Self {
            store: EventStore::new(config.max_orphans),
            ancestry: AncestorEngine::new(),
            witnesses: WitnessTable::new(),
            fame: FameDecider::new(config.coin_round_frequency),
            orderer: ConsensusOrderer::new(),
            rejections: BTreeMap::new(),
            config,
            verifier,
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Size of the participant set used for quorum thresholds
    pub fn participant_count(&self) -> usize {
        self.store
            .participant_count()
            .max(self.config.expected_participants)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Validate and admit an event.
    ///
    /// Events with unknown parents are held and rejected with
    /// `MissingParents`; call [`drain_orphans`](Self::drain_orphans) after
    /// admitting new events to resolve them.
    pub fn submit_event(&mut self, event: Event) -> SubmitResult {
        let result = self.try_admit(event, true);
        if let Err(rejection) = &result {
            *self.rejections.entry(rejection.reason()).or_insert(0) += 1;
        }
        result
    }

    fn try_admit(&mut self, event: Event, check_signature: bool) -> SubmitResult {
        let id = event.id();
        if self.store.contains(&id) {
            return Err(Rejection::Duplicate(id));
        }
        if event.shape() == EventShape::Malformed {
            return Err(Rejection::Malformed(id));
        }
        if check_signature && self.config.verify_signatures && !event.verify(&self.verifier) {
            warn!(event = %id, creator = %event.creator(), security = true, "rejected event with invalid signature");
            return Err(Rejection::SignatureInvalid(id));
        }

        match self.store.validate(&event) {
            Ok(()) => Ok(self.admit(event)),
            Err(Rejection::MissingParents(_)) => {
                self.store.hold_orphan(event)?;
                debug!(event = %id, orphans = self.store.orphan_count(), "holding orphan");
                Err(Rejection::MissingParents(id))
            }
            Err(rejection) => {
                if rejection.is_security_relevant() {
                    warn!(event = %id, creator = %event.creator(), security = true, "{rejection}");
                }
                Err(rejection)
            }
        }
    }

    fn admit(&mut self, event: Event) -> Admission {
        let id = event.id();
        let creator = event.creator();

        let idx = self.store.insert(event);
        self.ancestry.resolve(&self.store, idx);

        let participants = self.participant_count();
        let class = classify(&self.store, &mut self.ancestry, &self.witnesses, idx, participants);
        self.store.classify(idx, class);
        self.orderer.observe(&self.store, &self.ancestry, idx);

        debug!(
            event = %id,
            creator = %creator,
            round = class.round,
            witness = class.is_witness,
            "admitted event"
        );

        if class.is_witness {
            self.witnesses.register(idx, class.round);
            let decisions = self.fame.run(
                &self.store,
                &mut self.ancestry,
                &mut self.witnesses,
                participants,
            );
            for decision in &decisions {
                info!(
                    witness = %self.store.event_at(decision.witness).id(),
                    round = decision.round,
                    famous = decision.famous,
                    decided_by = %self.store.event_at(decision.decided_by).id(),
                    "witness fame decided"
                );
            }
            if !decisions.is_empty() {
                self.orderer.advance(&self.store, &self.ancestry, &self.witnesses);
            }
        }

        Admission {
            id,
            round: class.round,
            is_witness: class.is_witness,
        }
    }

    /// One pass over the orphan pool. Returns whether any orphan was admitted.
    pub fn retry_orphans(&mut self) -> bool {
        self.retry_pass() > 0
    }

    /// Retry orphans until no further progress; returns how many were admitted.
    pub fn drain_orphans(&mut self) -> usize {
        let mut resolved = 0;
        loop {
            let admitted = self.retry_pass();
            if admitted == 0 {
                break;
            }
            resolved += admitted;
        }
        if resolved > 0 {
            debug!(resolved, remaining = self.store.orphan_count(), "drained orphans");
        }
        resolved
    }

    fn retry_pass(&mut self) -> usize {
        let mut admitted = 0;
        for id in self.store.orphan_ids() {
            let Some(event) = self.store.take_orphan(&id) else {
                continue;
            };
            match self.try_admit(event, false) {
                Ok(_) => admitted += 1,
                Err(Rejection::MissingParents(_)) => {}
                Err(rejection) => {
                    *self.rejections.entry(rejection.reason()).or_insert(0) += 1;
                    warn!(event = %id, reason = rejection.reason(), "dropped orphan");
                }
            }
        }
        admitted
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Events ordered since the previous call, in consensus order
    pub fn newly_ordered_events(&mut self) -> Vec<OrderedEvent> {
        self.orderer.take_pending()
    }

    /// Every event ordered so far
    pub fn consensus_events(&self) -> &[OrderedEvent] {
        self.orderer.log()
    }

    pub fn participant_heads(&self) -> HashMap<CreatorId, EventId> {
        self.store.heads().clone()
    }

    /// Events admitted after `id`, for peer catch-up
    pub fn events_since(&self, id: &EventId) -> Vec<Event> {
        self.store.events_since(id)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.store.get(id)
    }

    pub fn head_of(&self, creator: &CreatorId) -> Option<EventId> {
        self.store.head_of(creator)
    }

    pub fn events_in_add_order(&self) -> impl Iterator<Item = &Event> + '_ {
        self.store.events_in_add_order()
    }

    pub fn events_in_round(&self, round: Round) -> Vec<&Event> {
        self.store.events_in_round(round)
    }

    pub fn events_in_round_range(&self, from: Round, to: Round) -> Vec<&Event> {
        self.store.events_in_round_range(from, to)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn orphan_count(&self) -> usize {
        self.store.orphan_count()
    }

    pub fn round_of(&self, id: &EventId) -> Option<Round> {
        self.store.round_of(id)
    }

    pub fn is_witness(&self, id: &EventId) -> Option<bool> {
        self.store.is_witness(id)
    }

    /// Fame of a witness; `None` for unknown events and non-witnesses
    pub fn fame_of(&self, id: &EventId) -> Option<Fame> {
        self.store
            .index_of(id)
            .and_then(|idx| self.witnesses.fame(idx))
    }

    pub fn witnesses_in_round(&self, round: Round) -> Vec<EventId> {
        self.witnesses
            .in_round(round)
            .iter()
            .map(|&idx| self.store.event_at(idx).id())
            .collect()
    }

    pub fn famous_witnesses(&self, round: Round) -> Vec<EventId> {
        self.witnesses
            .in_round(round)
            .iter()
            .filter(|&&idx| self.witnesses.fame(idx) == Some(Fame::Famous))
            .map(|&idx| self.store.event_at(idx).id())
            .collect()
    }

    pub fn ancestors_of(&self, id: &EventId) -> Option<HashSet<EventId>> {
        let idx = self.store.index_of(id)?;
        Some(
            self.ancestry
                .ancestors(idx)
                .map(|a| self.store.event_at(a).id())
                .collect(),
        )
    }

    pub fn self_ancestors_of(&self, id: &EventId) -> Option<HashSet<EventId>> {
        let idx = self.store.index_of(id)?;
        Some(
            self.ancestry
                .self_ancestors(idx)
                .map(|a| self.store.event_at(a).id())
                .collect(),
        )
    }

    pub fn can_see(&self, who: &EventId, whom: &EventId) -> bool {
        match (self.store.index_of(who), self.store.index_of(whom)) {
            (Some(a), Some(b)) => self.ancestry.can_see(a, b),
            _ => false,
        }
    }

    pub fn can_strongly_see(&mut self, who: &EventId, whom: &EventId) -> bool {
        let participants = self.participant_count();
        match (self.store.index_of(who), self.store.index_of(whom)) {
            (Some(a), Some(b)) => self
                .ancestry
                .can_strongly_see(&self.store, a, b, participants),
            _ => false,
        }
    }

    /// Whether the event has received its consensus position
    pub fn is_ordered(&self, id: &EventId) -> bool {
        self.store
            .index_of(id)
            .map_or(false, |idx| self.orderer.is_ordered(idx))
    }

    /// First event of each creator to know about `id`
    pub fn first_descendants(&self, id: &EventId) -> Vec<(CreatorId, EventId)> {
        let Some(idx) = self.store.index_of(id) else {
            return Vec::new();
        };
        self.orderer
            .first_descendants(idx)
            .into_iter()
            .map(|(creator, d)| (creator, self.store.event_at(d).id()))
            .collect()
    }

    pub fn stats(&self) -> ConsensusStats {
        ConsensusStats {
            events: self.store.len(),
            orphans: self.store.orphan_count(),
            participants: self.participant_count(),
            max_round: self.store.max_round(),
            witnesses: self.witnesses.len(),
            famous: self.witnesses.count(Fame::Famous),
            not_famous: self.witnesses.count(Fame::NotFamous),
            undecided: self.witnesses.count(Fame::Undecided),
            ordered: self.orderer.log().len(),
            pending_round: self.orderer.next_round(),
            rejections: self.rejections.clone(),
        }
    }
}
