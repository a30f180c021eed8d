//! Consensus service
//!
//! Single owner of a node's [`Hashgraph`]. Every mutation goes through one
//! mutex, newly ordered events are published on a broadcast channel in
//! consensus order, and the node's own events are created here.

use crate::config::NodeConfig;
use crate::error::Result;
use crate::metrics::ConsensusMetrics;
use crate::sync::{next_peer, PeerCursors, SyncMessage};
use knot_consensus::{Admission, ConsensusStats, Hashgraph, OrderedEvent, SubmitResult};
use knot_core::{CreatorId, Event, EventId, EventParams, Timestamp};
use knot_crypto::KeyPair;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Per-event listing entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: EventId,
    pub self_parent: Option<EventId>,
    pub other_parent: Option<EventId>,
    pub consensus_reached: bool,
}

struct ServiceState {
    graph: Hashgraph,
    cursors: PeerCursors,
    peers: BTreeSet<CreatorId>,
    last_peer: Option<CreatorId>,
    last_timestamp: Timestamp,
}

/// Mutex-guarded consensus engine plus the node identity
pub struct ConsensusService {
    name: String,
    keys: KeyPair,
    creator: CreatorId,
    max_sync_events: usize,
    state: Mutex<ServiceState>,
    sink: broadcast::Sender<OrderedEvent>,
    metrics: Option<ConsensusMetrics>,
}

impl ConsensusService {
    /// Create the service and admit the node's genesis event.
    pub fn new(config: &NodeConfig, keys: KeyPair) -> Result<Self> {
        config.consensus.validate()?;
        let (sink, _) = broadcast::channel(config.sync.broadcast_capacity.max(1));
        let metrics = if config.metrics.enabled {
            Some(ConsensusMetrics::new(&config.metrics.namespace)?)
        } else {
            None
        };

        let service = Self {
            name: config.node.name.clone(),
            creator: keys.creator_id(),
            keys,
            max_sync_events: config.sync.max_events.max(1),
            state: Mutex::new(ServiceState {
                graph: Hashgraph::new(config.consensus.clone()),
                cursors: PeerCursors::new(),
                peers: BTreeSet::new(),
                last_peer: None,
                last_timestamp: 0,
            }),
            sink,
            metrics,
        };

        let genesis = service.create_event(None)?;
        info!(node = %service.name, creator = %service.creator, genesis = %genesis.id, "consensus service started");
        Ok(service)
    }

    /// Build from a config whose `node.secret_key` may be unset
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let keys = match &config.node.secret_key {
            Some(secret) => KeyPair::from_secret_hex(secret)?,
            None => KeyPair::generate(),
        };
        Self::new(config, keys)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creator_id(&self) -> CreatorId {
        self.creator
    }

    /// Ordered events, published in consensus order
    pub fn subscribe(&self) -> broadcast::Receiver<OrderedEvent> {
        self.sink.subscribe()
    }

    pub fn metrics(&self) -> Option<&ConsensusMetrics> {
        self.metrics.as_ref()
    }

    /// Make a participant eligible for sync before any of its events is known
    pub fn add_peer(&self, peer: CreatorId) {
        if peer != self.creator {
            self.state.lock().peers.insert(peer);
        }
    }

    /// Submit a single event received from outside and drain orphans.
    pub fn submit(&self, event: Event) -> SubmitResult {
        let mut state = self.state.lock();
        let result = self.submit_locked(&mut state, event);
        self.settle(&mut state);
        result
    }

    fn submit_locked(&self, state: &mut ServiceState, event: Event) -> SubmitResult {
        let result = state.graph.submit_event(event);
        match &result {
            Ok(_) => self.count_admitted(1),
            Err(rejection) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(rejection);
                }
                if rejection.is_security_relevant() {
                    warn!(node = %self.name, code = rejection.code(), security = true, "{rejection}");
                } else if !rejection.is_benign() {
                    debug!(node = %self.name, reason = rejection.reason(), "{rejection}");
                }
            }
        }
        result
    }

    /// Resolve orphans and publish whatever became ordered
    fn settle(&self, state: &mut ServiceState) {
        let resolved = state.graph.drain_orphans();
        if resolved > 0 {
            self.count_admitted(resolved as u64);
        }

        let ordered = state.graph.newly_ordered_events();
        if !ordered.is_empty() {
            debug!(node = %self.name, count = ordered.len(), "publishing ordered events");
            if let Some(metrics) = &self.metrics {
                metrics.record_ordered(ordered.len());
            }
            for event in ordered {
                // no subscribers is fine
                let _ = self.sink.send(event);
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe(&state.graph.stats());
        }
    }

    fn count_admitted(&self, count: u64) {
        if let Some(metrics) = &self.metrics {
            metrics.record_admitted(count);
        }
    }

    /// Sign and admit a new event on top of this node's head.
    fn create_event(&self, other_parent: Option<EventId>) -> Result<Admission> {
        let mut state = self.state.lock();
        let timestamp = next_timestamp(&mut state.last_timestamp);
        let params = match (state.graph.head_of(&self.creator), other_parent) {
            (Some(head), Some(other)) => EventParams::child(head, other, timestamp),
            _ => EventParams::genesis(timestamp),
        };

        let event = Event::create(params, &self.keys);
        let result = self.submit_locked(&mut state, event);
        self.settle(&mut state);
        Ok(result?)
    }

    /// Next peer to sync with, round robin over every known participant
    pub fn next_peer(&self) -> Option<CreatorId> {
        let mut state = self.state.lock();
        let known: Vec<CreatorId> = state
            .peers
            .iter()
            .copied()
            .chain(state.graph.participant_heads().into_keys())
            .collect();
        let peer = next_peer(&self.creator, known, state.last_peer.as_ref())?;
        state.last_peer = Some(peer);
        Some(peer)
    }

    /// Events `peer` has not been sent yet, up to the sync limit.
    pub fn prepare_sync(&self, peer: &CreatorId) -> SyncMessage {
        let mut state = self.state.lock();
        let mut events: Vec<Event> = match state.cursors.last_sent(peer) {
            Some(last) => state.graph.events_since(&last),
            None => state.graph.events_in_add_order().cloned().collect(),
        };
        events.truncate(self.max_sync_events);

        if let Some(last) = events.last() {
            state.cursors.advance(*peer, last.id());
        }
        debug!(node = %self.name, peer = %peer, events = events.len(), "prepared sync");

        SyncMessage {
            sender: self.creator,
            events,
        }
    }

    /// Apply a sync from a peer, then record it with a new local event
    /// whose other-parent is the sender's head.
    ///
    /// Returns `None` for an empty sync, which carries nothing worth
    /// recording, and when the sender's head is still unknown.
    pub fn receive_sync(&self, message: SyncMessage) -> Result<Option<Admission>> {
        let sender = message.sender;
        let received = message.events.len();
        if message.is_empty() {
            debug!(node = %self.name, peer = %sender, "empty sync");
            return Ok(None);
        }
        {
            let mut state = self.state.lock();
            if sender != self.creator {
                state.peers.insert(sender);
            }
            // rejections are counted and logged by submit_locked
            for event in message.events {
                let _ = self.submit_locked(&mut state, event);
            }
            self.settle(&mut state);
        }

        let sender_head = self.state.lock().graph.head_of(&sender);
        let Some(sender_head) = sender_head else {
            warn!(node = %self.name, peer = %sender, received, "sync did not reveal the sender's head");
            return Ok(None);
        };

        let admission = self.create_event(Some(sender_head))?;
        debug!(
            node = %self.name,
            peer = %sender,
            received,
            event = %admission.id,
            round = admission.round,
            "synced"
        );
        Ok(Some(admission))
    }

    /// Every event with its parents and ordering status, optionally only
    /// those admitted after `since`.
    pub fn event_infos(&self, since: Option<&EventId>) -> Vec<EventInfo> {
        let state = self.state.lock();
        let events: Vec<Event> = match since {
            Some(id) => state.graph.events_since(id),
            None => state.graph.events_in_add_order().cloned().collect(),
        };
        events
            .iter()
            .map(|event| EventInfo {
                id: event.id(),
                self_parent: event.self_parent(),
                other_parent: event.other_parent(),
                consensus_reached: state.graph.is_ordered(&event.id()),
            })
            .collect()
    }

    pub fn consensus_log(&self) -> Vec<OrderedEvent> {
        self.state.lock().graph.consensus_events().to_vec()
    }

    pub fn head(&self) -> Option<EventId> {
        self.state.lock().graph.head_of(&self.creator)
    }

    pub fn stats(&self) -> ConsensusStats {
        self.state.lock().graph.stats()
    }
}

/// Wall-clock milliseconds, kept strictly above the previous value
fn next_timestamp(last: &mut Timestamp) -> Timestamp {
    let now = chrono::Utc::now().timestamp_millis().max(0) as Timestamp;
    let next = now.max(last.saturating_add(1));
    *last = next;
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(index: u64) -> ConsensusService {
        let mut config = NodeConfig::default();
        config.consensus.expected_participants = 2;
        ConsensusService::new(&config, KeyPair::derive("knot.service.test", index)).unwrap()
    }

    #[test]
    fn test_bootstraps_genesis() {
        let node = service(1);
        let infos = node.event_infos(None);

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].self_parent, None);
        assert!(!infos[0].consensus_reached);
        assert_eq!(node.head(), Some(infos[0].id));
        assert_eq!(node.metrics().map(|m| m.admitted()), Some(1));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut last = u64::MAX - 1;
        assert_eq!(next_timestamp(&mut last), u64::MAX);

        let mut last = 0;
        let first = next_timestamp(&mut last);
        let second = next_timestamp(&mut last);
        assert!(second > first);
    }

    #[test]
    fn test_sync_creates_event_on_sender_head() {
        let alice = service(1);
        let bob = service(2);

        let message = alice.prepare_sync(&bob.creator_id());
        assert_eq!(message.len(), 1);
        assert!(alice.prepare_sync(&bob.creator_id()).is_empty());

        let admission = bob.receive_sync(message).unwrap().unwrap();
        let created = bob.event_infos(None).pop().unwrap();
        assert_eq!(created.id, admission.id);
        assert_eq!(created.other_parent, alice.head());
        assert_eq!(bob.stats().participants, 2);
    }

    #[test]
    fn test_empty_sync_creates_nothing() {
        let alice = service(1);
        let bob = service(2);

        bob.receive_sync(alice.prepare_sync(&bob.creator_id())).unwrap();
        let before = bob.event_infos(None).len();

        let empty = alice.prepare_sync(&bob.creator_id());
        assert!(empty.is_empty());
        assert_eq!(bob.receive_sync(empty).unwrap(), None);
        assert_eq!(bob.event_infos(None).len(), before);
    }

    #[test]
    fn test_duplicate_sync_is_benign() {
        let alice = service(1);
        let bob = service(2);

        let message = alice.prepare_sync(&bob.creator_id());
        bob.receive_sync(message.clone()).unwrap();
        bob.receive_sync(message).unwrap();

        assert_eq!(bob.stats().rejections.get("duplicate"), Some(&1));
        assert_eq!(bob.metrics().map(|m| m.rejected("duplicate")), Some(1));
    }

    #[test]
    fn test_round_robin_over_added_peers() {
        let alice = service(1);
        let (b, c) = (service(2).creator_id(), service(3).creator_id());
        alice.add_peer(b);
        alice.add_peer(c);
        alice.add_peer(alice.creator_id());

        let first = alice.next_peer().unwrap();
        let second = alice.next_peer().unwrap();
        assert_ne!(first, second);
        assert_eq!(alice.next_peer(), Some(first));
    }
}
