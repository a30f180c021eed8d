//! Virtual voting on witness fame
//!
//! Every witness `y` votes on every undecided witness `x` of an earlier
//! round. Votes are never sent over the wire; each participant derives them
//! from its own copy of the DAG.
//!
//! ```text
//! d = round(y) - round(x)
//!
//! d == 1          vote = can_see(y, x)
//! d  > 1          S    = votes of round(y)-1 witnesses that y strongly sees
//!                 maj  = yes(S) >= supermajority(|S|)
//!                 cnt  = |{v ∈ S : v == maj}|
//!                 if cnt > supermajority(|S|): decide famous(x) = maj
//!                 vote = maj, except in coin rounds (d % freq == 0)
//!                        without a decisive count, where vote = coin(y)
//! ```
//!
//! A vote depends only on the ancestry of the voter, so the pass can be
//! re-run at any time: already cast votes are reused, missing ones are
//! filled in, and late witnesses get the votes they would have received.

use crate::ancestry::AncestorEngine;
use crate::round::WitnessTable;
use crate::store::EventStore;
use hashbrown::HashMap;
use knot_core::{supermajority, CreatorId, EventId, Round};
use std::collections::BTreeMap;

/// Votes cast on one witness: voting round -> voter creator -> vote
#[derive(Debug, Default)]
struct Election {
    votes: BTreeMap<Round, HashMap<CreatorId, bool>>,
}

impl Election {
    fn vote(&self, round: Round, voter: &CreatorId) -> Option<bool> {
        self.votes.get(&round).and_then(|r| r.get(voter)).copied()
    }

    fn record(&mut self, round: Round, voter: CreatorId, vote: bool) {
        self.votes.entry(round).or_default().insert(voter, vote);
    }
}

/// Outcome of counting the votes a witness strongly sees
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Tally {
    majority: bool,
    decisive: bool,
}

impl Tally {
    fn count(yes: usize, total: usize) -> Self {
        let threshold = supermajority(total);
        let majority = yes >= threshold;
        let majority_count = if majority { yes } else { total - yes };
        Self {
            majority,
            decisive: majority_count > threshold,
        }
    }

    /// The vote to cast. Coin rounds fall back to the voter's coin unless
    /// the count is decisive.
    fn vote(&self, coin_round: bool, coin: bool) -> bool {
        if coin_round && !self.decisive {
            coin
        } else {
            self.majority
        }
    }
}

/// A fame decision reached during a voting pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub witness: usize,
    pub round: Round,
    pub famous: bool,
    /// Witness whose tally settled the election
    pub decided_by: usize,
}

/// Runs elections for all undecided witnesses
#[derive(Debug)]
pub struct FameDecider {
    elections: HashMap<usize, Election>,
    coin_round_frequency: u64,
}

impl FameDecider {
    pub fn new(coin_round_frequency: u64) -> Self {
        Self {
            elections: HashMap::new(),
            coin_round_frequency: coin_round_frequency.max(2),
        }
    }

    /// Number of elections still open
    pub fn open_elections(&self) -> usize {
        self.elections.len()
    }

    /// Vote cast on the open election of `witness` by the round-`round`
    /// witness of `voter`
    pub fn vote(&self, witness: usize, round: Round, voter: &CreatorId) -> Option<bool> {
        self.elections.get(&witness)?.vote(round, voter)
    }

    /// Cast every missing vote and settle whatever can be settled.
    pub fn run(
        &mut self,
        store: &EventStore,
        ancestry: &mut AncestorEngine,
        witnesses: &mut WitnessTable,
        participants: usize,
    ) -> Vec<Decision> {
        let Some(max_round) = witnesses.max_round() else {
            return Vec::new();
        };

        let mut targets: Vec<(Round, EventId, usize)> = witnesses
            .undecided()
            .map(|x| (store.round_at(x), store.event_at(x).id(), x))
            .collect();
        targets.sort_unstable();

        let mut decisions = Vec::new();
        for (round, _, x) in targets {
            if round >= max_round {
                continue;
            }
            if let Some(decision) = self.elect(store, ancestry, witnesses, x, round, max_round, participants) {
                witnesses.decide(x, decision.famous);
                self.elections.remove(&x);
                decisions.push(decision);
            }
        }
        decisions
    }

    #[allow(clippy::too_many_arguments)]
    fn elect(
        &mut self,
        store: &EventStore,
        ancestry: &mut AncestorEngine,
        witnesses: &WitnessTable,
        x: usize,
        x_round: Round,
        max_round: Round,
        participants: usize,
    ) -> Option<Decision> {
        let frequency = self.coin_round_frequency;
        let election = self.elections.entry(x).or_default();

        for y_round in (x_round + 1)..=max_round {
            let mut voters = witnesses.in_round(y_round).to_vec();
            voters.sort_unstable_by_key(|&y| store.event_at(y).id());

            for y in voters {
                let voter = store.event_at(y).creator();
                if election.vote(y_round, &voter).is_some() {
                    continue;
                }

                let distance = y_round - x_round;
                if distance == 1 {
                    election.record(y_round, voter, ancestry.can_see(y, x));
                    continue;
                }

                let (mut yes, mut total) = (0usize, 0usize);
                for &w in witnesses.in_round(y_round - 1) {
                    if !ancestry.can_strongly_see(store, y, w, participants) {
                        continue;
                    }
                    let w_creator = store.event_at(w).creator();
                    if let Some(vote) = election.vote(y_round - 1, &w_creator) {
                        total += 1;
                        if vote {
                            yes += 1;
                        }
                    }
                }

                let coin_round = distance % frequency == 0;
                let tally = Tally::count(yes, total);
                election.record(y_round, voter, tally.vote(coin_round, voter.coin_bit()));

                if tally.decisive {
                    return Some(Decision {
                        witness: x,
                        round: x_round,
                        famous: tally.majority,
                        decided_by: y,
                    });
                }
            }
        }
        None
    }
}
