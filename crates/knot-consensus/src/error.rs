//! Submission outcomes and consensus errors

use knot_core::{CreatorId, EventId, Round};
use serde::Serialize;
use thiserror::Error;

/// Result type for configuration and engine errors
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Outcome of [`Hashgraph::submit_event`](crate::Hashgraph::submit_event)
pub type SubmitResult = std::result::Result<Admission, Rejection>;

/// Classification of a freshly admitted event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub id: EventId,
    pub round: Round,
    pub is_witness: bool,
}

/// Why an event was not admitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Already admitted; resubmission is a no-op
    #[error("Duplicate event: {0}")]
    Duplicate(EventId),

    /// Parents unknown; the event is held as an orphan
    #[error("Missing parents for event: {0}")]
    MissingParents(EventId),

    /// Self-parent is not the creator's head
    #[error("Fork detected: event {event} by {creator} does not extend the creator's head")]
    ForkDetected { event: EventId, creator: CreatorId },

    /// Second genesis from the same creator
    #[error("Invalid genesis: creator {creator} already has a head (event {event})")]
    InvalidGenesis { event: EventId, creator: CreatorId },

    #[error("Invalid signature on event: {0}")]
    SignatureInvalid(EventId),

    /// Exactly one parent present
    #[error("Malformed event: {0} declares exactly one parent")]
    Malformed(EventId),

    #[error("Orphan pool full ({limit} events), cannot hold {event}")]
    OrphanPoolFull { event: EventId, limit: usize },
}

impl Rejection {
    /// Id of the rejected event
    pub fn event_id(&self) -> EventId {
        match self {
            Rejection::Duplicate(id)
            | Rejection::MissingParents(id)
            | Rejection::SignatureInvalid(id)
            | Rejection::Malformed(id) => *id,
            Rejection::ForkDetected { event, .. }
            | Rejection::InvalidGenesis { event, .. }
            | Rejection::OrphanPoolFull { event, .. } => *event,
        }
    }

    /// Short label, used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Duplicate(_) => "duplicate",
            Rejection::MissingParents(_) => "missing_parents",
            Rejection::ForkDetected { .. } => "fork",
            Rejection::InvalidGenesis { .. } => "invalid_genesis",
            Rejection::SignatureInvalid(_) => "signature",
            Rejection::Malformed(_) => "malformed",
            Rejection::OrphanPoolFull { .. } => "orphan_pool_full",
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Rejection::Duplicate(_) => 2001,
            Rejection::MissingParents(_) => 2002,
            Rejection::ForkDetected { .. } => 2003,
            Rejection::InvalidGenesis { .. } => 2004,
            Rejection::SignatureInvalid(_) => 2005,
            Rejection::Malformed(_) => 2006,
            Rejection::OrphanPoolFull { .. } => 2007,
        }
    }

    /// Informational outcomes that need no operator attention
    pub fn is_benign(&self) -> bool {
        matches!(self, Rejection::Duplicate(_) | Rejection::MissingParents(_))
    }

    /// Evidence of byzantine behaviour
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            Rejection::ForkDetected { .. } | Rejection::SignatureInvalid(_)
        )
    }

    /// Permanent rejections are never retried
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Rejection::MissingParents(_))
    }
}

/// Engine-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Invalid consensus configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        let id = EventId::new([1u8; 32]);
        let creator = CreatorId::new([2u8; 32]);

        assert!(Rejection::Duplicate(id).is_benign());
        assert!(Rejection::MissingParents(id).is_benign());
        assert!(!Rejection::MissingParents(id).is_permanent());

        let fork = Rejection::ForkDetected { event: id, creator };
        assert!(fork.is_security_relevant());
        assert!(fork.is_permanent());
        assert!(!fork.is_benign());
        assert_eq!(fork.event_id(), id);

        assert!(Rejection::SignatureInvalid(id).is_security_relevant());
        assert!(!Rejection::InvalidGenesis { event: id, creator }.is_security_relevant());
    }

    #[test]
    fn test_rejection_codes_are_distinct() {
        let id = EventId::new([1u8; 32]);
        let creator = CreatorId::new([2u8; 32]);
        let all = [
            Rejection::Duplicate(id),
            Rejection::MissingParents(id),
            Rejection::ForkDetected { event: id, creator },
            Rejection::InvalidGenesis { event: id, creator },
            Rejection::SignatureInvalid(id),
            Rejection::Malformed(id),
            Rejection::OrphanPoolFull { event: id, limit: 1 },
        ];
        let mut codes: Vec<u32> = all.iter().map(Rejection::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
