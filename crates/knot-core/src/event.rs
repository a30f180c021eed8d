//! Gossip events
//!
//! An event records one creator's observation: its own previous event
//! (self-parent) plus the latest event it received from a peer
//! (other-parent). Genesis events have neither parent.
//!
//! ## Byte layout
//!
//! ```text
//! signing_bytes = opt(self_parent) || opt(other_parent) || creator || timestamp_be
//! opt(None)     = 0x00
//! opt(Some(id)) = 0x01 || id
//! event_id      = BLAKE3-derive("knot.event.id", signing_bytes || signature)
//! ```

use crate::error::Result;
use crate::types::{CreatorId, EventId, Signature, Timestamp};
use serde::{Deserialize, Serialize};

const EVENT_ID_CONTEXT: &str = "knot.event.id";

/// Produces signatures on behalf of one creator.
pub trait EventSigner {
    fn creator_id(&self) -> CreatorId;

    fn sign(&self, message: &[u8]) -> Signature;
}

/// Checks an event signature against its creator id.
pub trait SignatureVerifier {
    fn verify(&self, creator: &CreatorId, message: &[u8], signature: &Signature) -> bool;
}

/// Structural class of an event, derived from which parents are present
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventShape {
    Genesis,
    Child,
    /// Exactly one parent present
    Malformed,
}

/// Immutable parameters for building a new event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventParams {
    pub self_parent: Option<EventId>,
    pub other_parent: Option<EventId>,
    pub timestamp: Timestamp,
}

impl EventParams {
    pub fn genesis(timestamp: Timestamp) -> Self {
        Self {
            self_parent: None,
            other_parent: None,
            timestamp,
        }
    }

    pub fn child(self_parent: EventId, other_parent: EventId, timestamp: Timestamp) -> Self {
        Self {
            self_parent: Some(self_parent),
            other_parent: Some(other_parent),
            timestamp,
        }
    }
}

/// Wire form of an event. The id is never transmitted; it is recomputed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBody {
    pub self_parent: Option<EventId>,
    pub other_parent: Option<EventId>,
    pub creator: CreatorId,
    pub signature: Signature,
    pub timestamp: Timestamp,
}

/// A signed, content-addressed gossip event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EventBody", into = "EventBody")]
pub struct Event {
    id: EventId,
    body: EventBody,
}

impl Event {
    /// Build and sign a new event.
    pub fn create<S: EventSigner + ?Sized>(params: EventParams, signer: &S) -> Self {
        let creator = signer.creator_id();
        let message = signing_bytes(
            params.self_parent.as_ref(),
            params.other_parent.as_ref(),
            &creator,
            params.timestamp,
        );
        let signature = signer.sign(&message);
        Self::from_body(EventBody {
            self_parent: params.self_parent,
            other_parent: params.other_parent,
            creator,
            signature,
            timestamp: params.timestamp,
        })
    }

    /// Assemble an event from received fields, computing its id.
    pub fn from_body(body: EventBody) -> Self {
        let id = compute_id(&body);
        Self { id, body }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn creator(&self) -> CreatorId {
        self.body.creator
    }

    pub fn self_parent(&self) -> Option<EventId> {
        self.body.self_parent
    }

    pub fn other_parent(&self) -> Option<EventId> {
        self.body.other_parent
    }

    pub fn signature(&self) -> &Signature {
        &self.body.signature
    }

    pub fn timestamp(&self) -> Timestamp {
        self.body.timestamp
    }

    pub fn body(&self) -> &EventBody {
        &self.body
    }

    pub fn shape(&self) -> EventShape {
        match (self.body.self_parent, self.body.other_parent) {
            (None, None) => EventShape::Genesis,
            (Some(_), Some(_)) => EventShape::Child,
            _ => EventShape::Malformed,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.shape() == EventShape::Genesis
    }

    /// Both parents, when the event is a well-formed child
    pub fn parents(&self) -> Option<(EventId, EventId)> {
        match (self.body.self_parent, self.body.other_parent) {
            (Some(sp), Some(op)) => Some((sp, op)),
            _ => None,
        }
    }

    /// Bytes covered by the creator's signature
    pub fn signing_bytes(&self) -> Vec<u8> {
        signing_bytes(
            self.body.self_parent.as_ref(),
            self.body.other_parent.as_ref(),
            &self.body.creator,
            self.body.timestamp,
        )
    }

    pub fn verify<V: SignatureVerifier + ?Sized>(&self, verifier: &V) -> bool {
        verifier.verify(&self.body.creator, &self.signing_bytes(), &self.body.signature)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl From<EventBody> for Event {
    fn from(body: EventBody) -> Self {
        Event::from_body(body)
    }
}

impl From<Event> for EventBody {
    fn from(event: Event) -> Self {
        event.body
    }
}

fn push_optional(buf: &mut Vec<u8>, id: Option<&EventId>) {
    match id {
        Some(id) => {
            buf.push(1);
            buf.extend_from_slice(id.as_bytes());
        }
        None => buf.push(0),
    }
}

fn signing_bytes(
    self_parent: Option<&EventId>,
    other_parent: Option<&EventId>,
    creator: &CreatorId,
    timestamp: Timestamp,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 * 33 + 32 + 8);
    push_optional(&mut buf, self_parent);
    push_optional(&mut buf, other_parent);
    buf.extend_from_slice(creator.as_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf
}

fn compute_id(body: &EventBody) -> EventId {
    let mut hasher = blake3::Hasher::new_derive_key(EVENT_ID_CONTEXT);
    hasher.update(&signing_bytes(
        body.self_parent.as_ref(),
        body.other_parent.as_ref(),
        &body.creator,
        body.timestamp,
    ));
    hasher.update(body.signature.as_bytes());
    EventId::new(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic signer: the "signature" is the message hash repeated
    struct HashSigner(CreatorId);

    impl EventSigner for HashSigner {
        fn creator_id(&self) -> CreatorId {
            self.0
        }

        fn sign(&self, message: &[u8]) -> Signature {
            let h = blake3::hash(message);
            let mut bytes = [0u8; 64];
            bytes[..32].copy_from_slice(h.as_bytes());
            bytes[32..].copy_from_slice(h.as_bytes());
            Signature::new(bytes)
        }
    }

    impl SignatureVerifier for HashSigner {
        fn verify(&self, creator: &CreatorId, message: &[u8], signature: &Signature) -> bool {
            *creator == self.0 && self.sign(message) == *signature
        }
    }

    #[test]
    fn test_genesis_shape() {
        let signer = HashSigner(CreatorId::new([1u8; 32]));
        let event = Event::create(EventParams::genesis(10), &signer);

        assert!(event.is_genesis());
        assert_eq!(event.shape(), EventShape::Genesis);
        assert_eq!(event.parents(), None);
        assert!(event.verify(&signer));
    }

    #[test]
    fn test_single_parent_is_malformed() {
        let signer = HashSigner(CreatorId::new([1u8; 32]));
        let params = EventParams {
            self_parent: Some(EventId::new([2u8; 32])),
            other_parent: None,
            timestamp: 5,
        };
        let event = Event::create(params, &signer);
        assert_eq!(event.shape(), EventShape::Malformed);
    }

    #[test]
    fn test_id_depends_on_timestamp() {
        let signer = HashSigner(CreatorId::new([1u8; 32]));
        let a = Event::create(EventParams::genesis(1), &signer);
        let b = Event::create(EventParams::genesis(2), &signer);
        assert_ne!(a.id(), b.id());

        let again = Event::create(EventParams::genesis(1), &signer);
        assert_eq!(a.id(), again.id());
    }

    #[test]
    fn test_decoded_event_recomputes_id() {
        let signer = HashSigner(CreatorId::new([3u8; 32]));
        let parent = EventId::new([4u8; 32]);
        let event = Event::create(EventParams::child(parent, parent, 99), &signer);

        let bytes = event.to_bytes().unwrap();
        let decoded = Event::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.id(), event.id());
        assert_eq!(decoded.self_parent(), Some(parent));
    }

    #[test]
    fn test_tampered_timestamp_fails_verification() {
        let signer = HashSigner(CreatorId::new([3u8; 32]));
        let event = Event::create(EventParams::genesis(7), &signer);

        let mut body = event.body().clone();
        body.timestamp = 8;
        let tampered = Event::from_body(body);

        assert_ne!(tampered.id(), event.id());
        assert!(!tampered.verify(&signer));
    }
}
