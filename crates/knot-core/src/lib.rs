//! # Knot Core
//!
//! Data model for the Knot consensus engine.
//!
//! - `Event` - signed, content-addressed node of the gossip DAG
//! - `EventId` / `CreatorId` / `Signature` - fixed-width identifiers
//! - `supermajority` - quorum arithmetic shared by every component
//!
//! ```text
//!   A1 ──► A2 ──► A3        self-parent edges (vertical history)
//!          ▲      ▲
//!   B1 ──► B2 ──► B3        other-parent edges (gossip)
//! ```

pub mod error;
pub mod event;
pub mod quorum;
pub mod types;

pub use error::*;
pub use event::*;
pub use quorum::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{CoreError, Result};
    pub use crate::event::{Event, EventParams, EventShape, EventSigner, SignatureVerifier};
    pub use crate::quorum::{supermajority, COIN_ROUND_FREQUENCY};
    pub use crate::types::*;
}
