//! The example graph from the Swirlds hashgraph paper, replayed end to end

mod common;

use common::{deliver, four_party_graph, ordered_ids, PaperGraph};
use hashbrown::HashSet;
use knot_consensus::Fame;

fn replayed() -> (PaperGraph, knot_consensus::Hashgraph) {
    let paper = PaperGraph::build();
    let mut hg = four_party_graph();
    for event in paper.in_creation_order() {
        hg.submit_event(event).unwrap();
    }
    (paper, hg)
}

#[test]
fn test_witnesses_and_rounds() {
    let (paper, hg) = replayed();

    let expected: HashSet<_> = paper
        .ids(&[
            "A1", "B1", "C1", "D1", "A2", "B2", "C2", "D2", "A3", "B3", "C3", "D3", "B4", "D4",
        ])
        .into_iter()
        .collect();
    let witnesses: HashSet<_> = (1..=4).flat_map(|r| hg.witnesses_in_round(r)).collect();
    assert_eq!(witnesses, expected);

    for name in ["D13", "B13", "C11"] {
        assert_eq!(hg.round_of(&paper.id(name)), Some(1), "{name}");
    }
    for name in ["D2", "A2", "B2", "C2", "A21", "D22"] {
        assert_eq!(hg.round_of(&paper.id(name)), Some(2), "{name}");
    }
    for name in ["B3", "A3", "D3", "C3", "D32", "B34"] {
        assert_eq!(hg.round_of(&paper.id(name)), Some(3), "{name}");
    }
    assert_eq!(hg.round_of(&paper.id("D4")), Some(4));
    assert_eq!(hg.round_of(&paper.id("B4")), Some(4));
    assert_eq!(hg.is_witness(&paper.id("A21")), Some(false));
}

#[test]
fn test_fame_decisions() {
    let (paper, hg) = replayed();

    for name in ["A1", "B1", "C1", "D1", "A2", "B2", "D2"] {
        assert_eq!(hg.fame_of(&paper.id(name)), Some(Fame::Famous), "{name}");
    }
    assert_eq!(hg.fame_of(&paper.id("C2")), Some(Fame::NotFamous));
    for name in ["A3", "B3", "C3", "D3", "B4", "D4"] {
        assert_eq!(hg.fame_of(&paper.id(name)), Some(Fame::Undecided), "{name}");
    }
    assert_eq!(hg.fame_of(&paper.id("A21")), None);

    let stats = hg.stats();
    assert_eq!(stats.witnesses, 14);
    assert_eq!(stats.famous, 7);
    assert_eq!(stats.not_famous, 1);
    assert_eq!(stats.undecided, 6);
    assert_eq!(stats.pending_round, 3);
}

#[test]
fn test_round_two_ordering() {
    let (paper, mut hg) = replayed();

    let log = hg.newly_ordered_events();
    assert_eq!(log.len(), 10);
    assert!(hg.newly_ordered_events().is_empty());

    let received: HashSet<_> = ordered_ids(&log).into_iter().collect();
    let expected: HashSet<_> = paper
        .ids(&["A1", "B1", "C1", "D1", "D11", "B11", "D12", "B12", "A11", "D13"])
        .into_iter()
        .collect();
    assert_eq!(received, expected);
    assert!(log.iter().all(|o| o.round_received == 2));

    let timestamp_of = |name: &str| {
        log.iter()
            .find(|o| o.event.id() == paper.id(name))
            .map(|o| o.consensus_timestamp)
    };
    assert_eq!(timestamp_of("B1"), Some(40));
    assert_eq!(timestamp_of("D1"), Some(50));
    assert_eq!(timestamp_of("D11"), Some(50));
    assert_eq!(timestamp_of("B11"), Some(60));
    assert_eq!(timestamp_of("D12"), Some(60));
    assert_eq!(timestamp_of("C1"), Some(70));
    assert_eq!(timestamp_of("B12"), Some(90));
    assert_eq!(timestamp_of("D13"), Some(90));
    assert_eq!(timestamp_of("A1"), Some(120));
    assert_eq!(timestamp_of("A11"), Some(120));

    assert_eq!(log[0].event.id(), paper.id("B1"));
    assert_eq!(log[5].event.id(), paper.id("C1"));
    for (i, ordered) in log.iter().enumerate() {
        assert_eq!(ordered.position, i as u64);
    }
    for pair in log.windows(2) {
        assert!(
            (pair[0].consensus_timestamp, pair[0].tiebreak)
                <= (pair[1].consensus_timestamp, pair[1].tiebreak)
        );
    }

    assert!(hg.is_ordered(&paper.id("D13")));
    assert!(!hg.is_ordered(&paper.id("C11")));
}

#[test]
fn test_delivery_order_does_not_change_consensus() {
    let paper = PaperGraph::build();

    let mut forward = four_party_graph();
    for event in paper.in_creation_order() {
        deliver(&mut forward, event);
    }

    let mut shuffled = four_party_graph();
    for event in paper.tail_first() {
        deliver(&mut shuffled, event);
    }

    assert_eq!(shuffled.orphan_count(), 0);
    assert_eq!(shuffled.len(), forward.len());
    assert_eq!(shuffled.consensus_events(), forward.consensus_events());
}

#[test]
fn test_ancestry_queries() {
    let (paper, mut hg) = replayed();

    let ancestors = hg.ancestors_of(&paper.id("B11")).unwrap();
    let expected: HashSet<_> = paper.ids(&["B1", "D1", "D11"]).into_iter().collect();
    assert_eq!(ancestors, expected);

    let own = hg.self_ancestors_of(&paper.id("D12")).unwrap();
    let expected: HashSet<_> = paper.ids(&["D1", "D11"]).into_iter().collect();
    assert_eq!(own, expected);

    assert!(hg.can_see(&paper.id("D2"), &paper.id("A1")));
    assert!(!hg.can_see(&paper.id("D2"), &paper.id("C11")));
    assert!(hg.can_strongly_see(&paper.id("D2"), &paper.id("B1")));
    assert!(!hg.can_strongly_see(&paper.id("D2"), &paper.id("A1")));
}

#[test]
fn test_first_descendants() {
    let (paper, hg) = replayed();

    let firsts: HashSet<_> = hg
        .first_descendants(&paper.id("B1"))
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    let expected: HashSet<_> = paper.ids(&["B1", "D11", "A11", "C11"]).into_iter().collect();
    assert_eq!(firsts, expected);
}
