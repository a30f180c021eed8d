//! # Knot Node
//!
//! Hosts the consensus engine for one participant.
//!
//! - `ConsensusService` - single owner of the `Hashgraph`, publishes the
//!   consensus order on a broadcast channel
//! - `sync` - gossip message, per-peer cursors, round-robin peer choice
//! - `simulate` - an in-process ring of services driven by tokio tasks
//! - `config` / `logging` / `metrics` - node plumbing

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod simulate;
pub mod sync;

pub use config::{LoggingConfig, MetricsConfig, NodeConfig, NodeSettings, SyncConfig};
pub use error::{NodeError, Result};
pub use logging::init_logging;
pub use metrics::ConsensusMetrics;
pub use service::{ConsensusService, EventInfo};
pub use simulate::{run_simulation, NodeReport, SimulationConfig, SimulationReport};
pub use sync::{next_peer, PeerCursors, SyncMessage};
