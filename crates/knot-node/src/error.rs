//! Node error types

use knot_consensus::{ConsensusError, Rejection};
use knot_crypto::CryptoError;
use thiserror::Error;

/// Node result type
pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Config serialization error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Sync codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Event rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Simulation error: {0}")]
    Simulation(String),
}
