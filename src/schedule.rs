//! Round-robin pairing schedule.
//!
//! Fixed-rotation circle method: player 1 stays put, the rest rotate one seat
//! per round. Every player meets every other exactly once across the
//! schedule; with an odd player count, one player sits out each round.

use crate::protocol::AgentId;

/// One round of disjoint pairings.
pub type RoundPairings = Vec<(AgentId, AgentId)>;

/// Builds the full schedule for `players`, one entry per round.
///
/// Returns an empty schedule for fewer than two players. Given `n` players,
/// the schedule has `n - 1` rounds (`n` when `n` is odd) of `n / 2` matches.
pub fn round_robin_schedule(players: &[AgentId]) -> Vec<RoundPairings> {
    if players.len() < 2 {
        return vec![];
    }

    // Odd player count: pad with a phantom seat, pairings against it are byes.
    let mut seats: Vec<Option<&AgentId>> = players.iter().map(Some).collect();
    if seats.len() % 2 == 1 {
        seats.push(None);
    }

    let rounds = seats.len() - 1;
    let half = seats.len() / 2;
    let mut schedule = Vec::with_capacity(rounds);

    for _ in 0..rounds {
        let mut pairings = Vec::with_capacity(half);
        for i in 0..half {
            let a = seats[i];
            let b = seats[seats.len() - 1 - i];
            if let (Some(a), Some(b)) = (a, b) {
                pairings.push((a.clone(), b.clone()));
            }
        }
        schedule.push(pairings);
        // rotate everything but the first seat
        seats[1..].rotate_right(1);
    }

    schedule
}

/// Number of match slots in each round of a league with `num_players`.
pub fn matches_per_round(num_players: usize) -> usize {
    num_players / 2
}

#[cfg(test)]
mod schedule_tests {
    use std::collections::HashSet;

    use super::*;

    fn players(n: usize) -> Vec<AgentId> {
        (1..=n).map(|i| format!("player_{i}")).collect()
    }

    #[test]
    fn every_pair_meets_exactly_once() {
        for n in [2, 3, 4, 5, 6, 9] {
            let players = players(n);
            let schedule = round_robin_schedule(&players);
            let mut seen = HashSet::new();
            for round in &schedule {
                for (a, b) in round {
                    let key = if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                    assert!(seen.insert(key), "pair {a}/{b} scheduled twice ({n} players)");
                }
            }
            assert_eq!(seen.len(), n * (n - 1) / 2, "{n} players");
        }
    }

    #[test]
    fn rounds_have_disjoint_players() {
        let players = players(6);
        for round in round_robin_schedule(&players) {
            let mut busy = HashSet::new();
            for (a, b) in &round {
                assert!(busy.insert(a.clone()));
                assert!(busy.insert(b.clone()));
            }
            assert_eq!(round.len(), matches_per_round(6));
        }
    }

    #[test]
    fn odd_count_gets_a_bye_per_round() {
        let players = players(5);
        let schedule = round_robin_schedule(&players);
        assert_eq!(schedule.len(), 5);
        for round in &schedule {
            assert_eq!(round.len(), 2); // one of five sits out
        }
    }

    #[test]
    fn degenerate_inputs() {
        assert!(round_robin_schedule(&[]).is_empty());
        assert!(round_robin_schedule(&players(1)).is_empty());
        assert_eq!(round_robin_schedule(&players(2)).len(), 1);
    }

    #[test]
    fn schedule_is_deterministic() {
        let players = players(7);
        assert_eq!(round_robin_schedule(&players), round_robin_schedule(&players));
    }
}
