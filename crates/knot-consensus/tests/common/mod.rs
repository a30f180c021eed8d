//! Shared fixtures for consensus integration tests

#![allow(dead_code)]

use hashbrown::HashMap;
use knot_consensus::{ConsensusConfig, Hashgraph, OrderedEvent, Rejection};
use knot_core::{Event, EventId, EventParams};
use knot_crypto::KeyPair;

pub fn participant(index: u64) -> KeyPair {
    KeyPair::derive("knot.consensus.it", index)
}

/// Engine with a fixed roster of four participants
pub fn four_party_graph() -> Hashgraph {
    Hashgraph::new(ConsensusConfig::with_participants(4))
}

/// Submit, tolerating orphaning, then drain the orphan pool.
pub fn deliver(hg: &mut Hashgraph, event: Event) {
    match hg.submit_event(event) {
        Ok(_) | Err(Rejection::MissingParents(_)) => {}
        Err(other) => panic!("unexpected rejection: {other}"),
    }
    hg.drain_orphans();
}

pub fn ordered_ids(log: &[OrderedEvent]) -> Vec<EventId> {
    log.iter().map(|o| o.event.id()).collect()
}

/// (name, self-parent, other-parent) in creation order, after the four
/// genesis events A1 B1 C1 D1.
const PAPER_CHILDREN: &[(&str, &str, &str)] = &[
    ("D11", "D1", "B1"),
    ("B11", "B1", "D11"),
    ("D12", "D11", "B11"),
    ("B12", "B11", "C1"),
    ("A11", "A1", "B11"),
    ("D13", "D12", "B12"),
    ("C11", "C1", "B12"),
    ("B13", "B12", "D13"),
    ("D2", "D13", "A11"),
    ("A2", "A11", "D2"),
    ("B2", "B13", "D2"),
    ("A21", "A2", "C11"),
    ("C2", "C11", "A21"),
    ("D21", "D2", "B2"),
    ("A22", "A21", "B2"),
    ("B21", "B2", "A22"),
    ("D22", "D21", "A22"),
    ("B3", "B21", "D22"),
    ("A3", "A22", "B3"),
    ("D3", "D22", "B3"),
    ("D31", "D3", "C2"),
    ("C3", "C2", "D31"),
    ("B31", "B3", "A3"),
    ("B32", "B31", "A3"),
    ("A31", "A3", "B32"),
    ("B33", "B32", "D31"),
    ("A32", "A31", "B33"),
    ("B34", "B33", "A32"),
    ("D32", "D31", "B33"),
    ("D4", "D32", "C3"),
    ("B4", "B34", "D4"),
];

/// The four-member example gossip graph from the Swirlds hashgraph
/// paper. Event `i` in creation order carries timestamp `10 * i`.
pub struct PaperGraph {
    events: HashMap<&'static str, Event>,
    order: Vec<&'static str>,
}

impl PaperGraph {
    pub fn build() -> Self {
        let keys: HashMap<char, KeyPair> = ['A', 'B', 'C', 'D']
            .into_iter()
            .zip(1u64..)
            .map(|(name, i)| (name, participant(i)))
            .collect();
        let creator = |name: &str| {
            let first = name.chars().next().unwrap();
            &keys[&first]
        };

        let mut events = HashMap::new();
        let mut order = Vec::new();
        let mut timestamp = 0u64;

        for name in ["A1", "B1", "C1", "D1"] {
            events.insert(name, Event::create(EventParams::genesis(timestamp), creator(name)));
            order.push(name);
            timestamp += 10;
        }
        for &(name, sp, op) in PAPER_CHILDREN {
            let params = EventParams::child(events[sp].id(), events[op].id(), timestamp);
            events.insert(name, Event::create(params, creator(name)));
            order.push(name);
            timestamp += 10;
        }

        Self { events, order }
    }

    pub fn event(&self, name: &str) -> &Event {
        &self.events[name]
    }

    pub fn id(&self, name: &str) -> EventId {
        self.events[name].id()
    }

    pub fn ids(&self, names: &[&str]) -> Vec<EventId> {
        names.iter().map(|name| self.id(name)).collect()
    }

    /// Events in creation order
    pub fn in_creation_order(&self) -> Vec<Event> {
        self.order.iter().map(|name| self.events[name].clone()).collect()
    }

    /// The round-3 tail first, then everything else in creation order
    pub fn tail_first(&self) -> Vec<Event> {
        let split = self
            .order
            .iter()
            .position(|&name| name == "D3")
            .unwrap();
        self.order[split..]
            .iter()
            .chain(&self.order[..split])
            .map(|name| self.events[name].clone())
            .collect()
    }
}
