//! Gossip sync protocol
//!
//! A sync carries every event the sender has admitted since the last sync
//! it sent to the same peer, in the sender's admission order, so parents
//! always travel ahead of their children.
//!
//! ```text
//! sender                                  receiver
//!   │ events_since(cursor[peer])             │
//!   │──────── SyncMessage { sender, events } ─►│ submit all, drain orphans
//!   │                                        │ create event(self = own head,
//!   │                                        │              other = sender head)
//! ```

use crate::error::Result;
use hashbrown::HashMap;
use knot_core::{CreatorId, Event, EventId};
use serde::{Deserialize, Serialize};

/// Events pushed from one participant to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub sender: CreatorId,
    pub events: Vec<Event>,
}

impl SyncMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Last event sent to each peer
#[derive(Debug, Default)]
pub struct PeerCursors {
    sent: HashMap<CreatorId, EventId>,
}

impl PeerCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sent(&self, peer: &CreatorId) -> Option<EventId> {
        self.sent.get(peer).copied()
    }

    pub fn advance(&mut self, peer: CreatorId, last: EventId) {
        self.sent.insert(peer, last);
    }

    pub fn reset(&mut self, peer: &CreatorId) {
        self.sent.remove(peer);
    }
}

/// Round-robin peer choice: the smallest known id after `previous`,
/// wrapping around. `own` is never chosen.
pub fn next_peer<I>(own: &CreatorId, known: I, previous: Option<&CreatorId>) -> Option<CreatorId>
where
    I: IntoIterator<Item = CreatorId>,
{
    let mut peers: Vec<CreatorId> = known.into_iter().filter(|p| p != own).collect();
    peers.sort_unstable();
    peers.dedup();

    let after = previous.and_then(|prev| peers.iter().find(|&p| p > prev));
    after.or_else(|| peers.first()).copied()
}
