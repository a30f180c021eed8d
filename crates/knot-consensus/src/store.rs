//! Append-only event store
//!
//! Admitted events live in an arena indexed by admission order. Every other
//! component refers to events by that index (or by [`EventId`]) and reads
//! them back through the store.

use crate::error::Rejection;
use hashbrown::HashMap;
use indexmap::IndexMap;
use knot_core::{CreatorId, Event, EventId, EventShape, Round};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round and witness flag assigned at admission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub round: Round,
    pub is_witness: bool,
}

#[derive(Debug)]
struct Slot {
    event: Event,
    parents: Option<(usize, usize)>,
    class: Option<Classification>,
}

/// Content-addressed store of admitted events plus the orphan pool
#[derive(Debug)]
pub struct EventStore {
    slots: Vec<Slot>,
    index: HashMap<EventId, usize>,
    heads: HashMap<CreatorId, EventId>,
    by_round: BTreeMap<Round, Vec<usize>>,
    orphans: IndexMap<EventId, Event>,
    max_orphans: usize,
}

impl EventStore {
    pub fn new(max_orphans: usize) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            heads: HashMap::new(),
            by_round: BTreeMap::new(),
            orphans: IndexMap::new(),
            max_orphans,
        }
    }

    /// Check whether `event` can be admitted now.
    ///
    /// `MissingParents` is transient; every other rejection is final.
    pub fn validate(&self, event: &Event) -> Result<(), Rejection> {
        let id = event.id();
        if self.index.contains_key(&id) {
            return Err(Rejection::Duplicate(id));
        }

        let creator = event.creator();
        let head = self.heads.get(&creator);
        match event.shape() {
            EventShape::Malformed => Err(Rejection::Malformed(id)),
            EventShape::Genesis => match head {
                Some(_) => Err(Rejection::InvalidGenesis { event: id, creator }),
                None => Ok(()),
            },
            EventShape::Child => {
                let (self_parent, other_parent) = match event.parents() {
                    Some(parents) => parents,
                    None => return Err(Rejection::Malformed(id)),
                };
                if !self.index.contains_key(&self_parent) || !self.index.contains_key(&other_parent) {
                    return Err(Rejection::MissingParents(id));
                }
                if head != Some(&self_parent) {
                    return Err(Rejection::ForkDetected { event: id, creator });
                }
                Ok(())
            }
        }
    }

    /// Append a validated event; returns its arena index.
    pub(crate) fn insert(&mut self, event: Event) -> usize {
        let id = event.id();
        let parents = event
            .parents()
            .and_then(|(sp, op)| Some((*self.index.get(&sp)?, *self.index.get(&op)?)));
        debug_assert!(
            event.is_genesis() || parents.is_some(),
            "inserted event {id} before its parents"
        );

        let idx = self.slots.len();
        self.heads.insert(event.creator(), id);
        self.index.insert(id, idx);
        self.orphans.shift_remove(&id);
        self.slots.push(Slot {
            event,
            parents,
            class: None,
        });
        idx
    }

    /// Record the round and witness flag of an admitted event.
    pub(crate) fn classify(&mut self, idx: usize, class: Classification) {
        let slot = &mut self.slots[idx];
        assert!(slot.class.is_none(), "event {} classified twice", slot.event.id());
        slot.class = Some(class);
        self.by_round.entry(class.round).or_default().push(idx);
    }

    // ------------------------------------------------------------------
    // Orphans
    // ------------------------------------------------------------------

    /// Hold an event until its parents arrive.
    ///
    /// Holding the same event twice is a no-op.
    pub fn hold_orphan(&mut self, event: Event) -> Result<(), Rejection> {
        let id = event.id();
        if self.orphans.contains_key(&id) {
            return Ok(());
        }
        if self.orphans.len() >= self.max_orphans {
            return Err(Rejection::OrphanPoolFull {
                event: id,
                limit: self.max_orphans,
            });
        }
        self.orphans.insert(id, event);
        Ok(())
    }

    /// Remove an orphan so it can be re-submitted
    pub fn take_orphan(&mut self, id: &EventId) -> Option<Event> {
        self.orphans.shift_remove(id)
    }

    /// Orphan ids in the order they were first held
    pub fn orphan_ids(&self) -> Vec<EventId> {
        self.orphans.keys().copied().collect()
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_orphan(&self, id: &EventId) -> bool {
        self.orphans.contains_key(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.index.contains_key(id)
    }

    pub fn index_of(&self, id: &EventId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.index_of(id).map(|idx| &self.slots[idx].event)
    }

    /// Event at an arena index. Panics on an index the store never issued.
    pub fn event_at(&self, idx: usize) -> &Event {
        &self.slots[idx].event
    }

    /// Arena indices of (self-parent, other-parent)
    pub fn parent_indices(&self, idx: usize) -> Option<(usize, usize)> {
        self.slots[idx].parents
    }

    pub fn classification_at(&self, idx: usize) -> Option<Classification> {
        self.slots[idx].class
    }

    /// Round of an admitted event; 0 only while it is being classified
    pub fn round_at(&self, idx: usize) -> Round {
        self.slots[idx].class.map_or(0, |c| c.round)
    }

    pub fn round_of(&self, id: &EventId) -> Option<Round> {
        self.index_of(id).map(|idx| self.round_at(idx))
    }

    pub fn is_witness(&self, id: &EventId) -> Option<bool> {
        self.index_of(id)
            .and_then(|idx| self.slots[idx].class)
            .map(|c| c.is_witness)
    }

    pub fn head_of(&self, creator: &CreatorId) -> Option<EventId> {
        self.heads.get(creator).copied()
    }

    /// Latest event of every known creator
    pub fn heads(&self) -> &HashMap<CreatorId, EventId> {
        &self.heads
    }

    pub fn participant_count(&self) -> usize {
        self.heads.len()
    }

    pub fn events_in_add_order(&self) -> impl Iterator<Item = &Event> + '_ {
        self.slots.iter().map(|slot| &slot.event)
    }

    pub fn events_in_round(&self, round: Round) -> Vec<&Event> {
        self.by_round
            .get(&round)
            .map(|indices| indices.iter().map(|&idx| &self.slots[idx].event).collect())
            .unwrap_or_default()
    }

    /// Events with `from <= round <= to`, by round then admission order
    pub fn events_in_round_range(&self, from: Round, to: Round) -> Vec<&Event> {
        if from > to {
            return Vec::new();
        }
        self.by_round
            .range(from..=to)
            .flat_map(|(_, indices)| indices.iter().map(|&idx| &self.slots[idx].event))
            .collect()
    }

    /// Events admitted after `id`; empty when `id` is unknown
    pub fn events_since(&self, id: &EventId) -> Vec<Event> {
        match self.index_of(id) {
            Some(idx) => self.slots[idx + 1..]
                .iter()
                .map(|slot| slot.event.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Highest round assigned so far
    pub fn max_round(&self) -> Round {
        self.by_round.keys().next_back().copied().unwrap_or(0)
    }
}
