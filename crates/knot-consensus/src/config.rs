//! Consensus engine configuration

use crate::error::{ConsensusError, Result};
use knot_core::COIN_ROUND_FREQUENCY;
use serde::{Deserialize, Serialize};

/// Parameters of a [`Hashgraph`](crate::Hashgraph) instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Lower bound for the participant count used in quorum arithmetic.
    ///
    /// With 0 the participant set is exactly the creators seen so far.
    /// Setting it to the roster size makes thresholds independent of how
    /// quickly genesis events arrive.
    #[serde(default)]
    pub expected_participants: usize,

    /// Period of coin rounds in fame voting
    #[serde(default = "default_coin_round_frequency")]
    pub coin_round_frequency: u64,

    /// Maximum number of events held while waiting for parents
    #[serde(default = "default_max_orphans")]
    pub max_orphans: usize,

    /// Check creator signatures on submitted events
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
}

fn default_coin_round_frequency() -> u64 {
    COIN_ROUND_FREQUENCY
}

fn default_max_orphans() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            expected_participants: 0,
            coin_round_frequency: default_coin_round_frequency(),
            max_orphans: default_max_orphans(),
            verify_signatures: true,
        }
    }
}

impl ConsensusConfig {
    /// Config for a fixed roster of `n` participants
    pub fn with_participants(n: usize) -> Self {
        Self {
            expected_participants: n,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.coin_round_frequency < 2 {
            return Err(ConsensusError::InvalidConfig(format!(
                "coin_round_frequency must be at least 2, got {}",
                self.coin_round_frequency
            )));
        }
        if self.max_orphans == 0 {
            return Err(ConsensusError::InvalidConfig(
                "max_orphans must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConsensusConfig::default();
        assert_eq!(config.coin_round_frequency, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_coin_frequency() {
        let config = ConsensusConfig {
            coin_round_frequency: 1,
            ..ConsensusConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
