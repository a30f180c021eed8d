//! # Knot Consensus
//!
//! Hashgraph-style asynchronous BFT consensus over a gossip DAG.
//!
//! ## Pipeline
//!
//! 1. **Store** - content-addressed, append-only; fork and replay checks,
//!    orphan pool for events whose parents have not arrived
//! 2. **Ancestry** - memoized ancestor bitsets, `can_see` and
//!    `can_strongly_see`
//! 3. **Rounds** - round number and witness flag, fixed at admission
//! 4. **Fame** - virtual voting with periodic coin rounds
//! 5. **Order** - round received, median timestamp, whitened tiebreak
//!
//! ## Usage
//!
//! ```ignore
//! let mut hg = Hashgraph::new(ConsensusConfig::with_participants(4));
//! hg.submit_event(event)?;
//! hg.drain_orphans();
//! for ordered in hg.newly_ordered_events() {
//!     apply(ordered.event);
//! }
//! ```

pub mod ancestry;
pub mod config;
pub mod error;
pub mod fame;
pub mod hashgraph;
pub mod order;
pub mod round;
pub mod store;

pub use ancestry::AncestorEngine;
pub use config::ConsensusConfig;
pub use error::{Admission, ConsensusError, Rejection, Result, SubmitResult};
pub use fame::{Decision, FameDecider};
pub use hashgraph::{ConsensusStats, Hashgraph};
pub use order::{ConsensusOrderer, OrderedEvent};
pub use round::{classify, Fame, RoundStatus, WitnessTable};
pub use store::{Classification, EventStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ConsensusConfig;
    pub use crate::error::{Admission, Rejection, SubmitResult};
    pub use crate::hashgraph::{ConsensusStats, Hashgraph};
    pub use crate::order::OrderedEvent;
    pub use crate::round::Fame;
}
