//! Round assignment and witness bookkeeping

use crate::ancestry::AncestorEngine;
use crate::store::{Classification, EventStore};
use hashbrown::HashMap;
use knot_core::{supermajority, Round};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fame of a witness. `Famous` and `NotFamous` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fame {
    Undecided,
    Famous,
    NotFamous,
}

impl Fame {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Fame::Undecided)
    }
}

/// Decision state of a whole round
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// No witness known for the round
    Unknown,
    /// At least one witness is undecided
    Pending,
    /// Every known witness is decided; holds the famous ones
    Decided(Vec<usize>),
}

/// Witnesses per round and their fame
#[derive(Debug, Default)]
pub struct WitnessTable {
    by_round: BTreeMap<Round, Vec<usize>>,
    fame: HashMap<usize, Fame>,
}

impl WitnessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new undecided witness.
    ///
    /// # Panics
    /// If the event is already registered.
    pub fn register(&mut self, idx: usize, round: Round) {
        let previous = self.fame.insert(idx, Fame::Undecided);
        assert!(
            previous.is_none(),
            "event #{idx} registered as a witness twice"
        );
        self.by_round.entry(round).or_default().push(idx);
    }

    /// Fix the fame of an undecided witness.
    ///
    /// # Panics
    /// If the witness is unknown or already decided.
    pub fn decide(&mut self, idx: usize, famous: bool) {
        match self.fame.get_mut(&idx) {
            Some(fame) if *fame == Fame::Undecided => {
                *fame = if famous { Fame::Famous } else { Fame::NotFamous };
            }
            other => panic!("cannot decide witness #{idx} in state {other:?}"),
        }
    }

    pub fn fame(&self, idx: usize) -> Option<Fame> {
        self.fame.get(&idx).copied()
    }

    pub fn in_round(&self, round: Round) -> &[usize] {
        self.by_round.get(&round).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn undecided(&self) -> impl Iterator<Item = usize> + '_ {
        self.fame
            .iter()
            .filter(|(_, fame)| !fame.is_decided())
            .map(|(&idx, _)| idx)
    }

    pub fn max_round(&self) -> Option<Round> {
        self.by_round.keys().next_back().copied()
    }

    pub fn status(&self, round: Round) -> RoundStatus {
        let Some(witnesses) = self.by_round.get(&round) else {
            return RoundStatus::Unknown;
        };
        let mut famous = Vec::new();
        for &w in witnesses {
            match self.fame.get(&w) {
                Some(Fame::Famous) => famous.push(w),
                Some(Fame::NotFamous) => {}
                Some(Fame::Undecided) | None => return RoundStatus::Pending,
            }
        }
        RoundStatus::Decided(famous)
    }

    pub fn len(&self) -> usize {
        self.fame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fame.is_empty()
    }

    pub fn count(&self, fame: Fame) -> usize {
        self.fame.values().filter(|&&f| f == fame).count()
    }
}

/// Assign a round to the freshly admitted event at `idx`.
///
/// The promotion threshold is taken over the participant count. A round
/// holds at most one witness per creator, so `|W| <= n`, and the two agree
/// once every participant has a witness in the round; counting against `n`
/// keeps the result independent of which witnesses happened to arrive first.
pub fn classify(
    store: &EventStore,
    ancestry: &mut AncestorEngine,
    witnesses: &WitnessTable,
    idx: usize,
    participants: usize,
) -> Classification {
    let Some((sp, op)) = store.parent_indices(idx) else {
        return Classification {
            round: 1,
            is_witness: true,
        };
    };

    let self_parent_round = store.round_at(sp);
    let base = self_parent_round.max(store.round_at(op));

    let strongly_seen = witnesses
        .in_round(base)
        .iter()
        .filter(|&&w| ancestry.can_strongly_see(store, idx, w, participants))
        .count();

    let round = if strongly_seen >= supermajority(participants) {
        base + 1
    } else {
        base
    };

    Classification {
        round,
        is_witness: round > self_parent_round,
    }
}
