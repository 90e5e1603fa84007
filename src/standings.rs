//! Standings aggregation.
//!
//! A pure function over the full record set: standings are recomputed from
//! scratch on every request, never mutated incrementally, so two computations
//! over the same records are always identical regardless of the order the
//! records arrived in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{AgentId, MatchRecord, Outcome};

/// Points awarded per match outcome.
pub mod points {
    /// Points for a win.
    pub const WIN: u32 = 3;
    /// Points for a draw.
    pub const DRAW: u32 = 1;
    /// Points for a loss.
    pub const LOSS: u32 = 0;
}

/// One player's line in the standings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsEntry {
    /// The player.
    pub agent_id: AgentId,
    /// Matches won.
    pub wins: u32,
    /// Matches drawn.
    pub draws: u32,
    /// Matches lost.
    pub losses: u32,
    /// `3 * wins + 1 * draws`.
    pub points: u32,
}

/// Computes the standings table from the full set of records.
///
/// Errored slots contribute nothing. Ordering is deterministic:
/// points descending, then wins descending, then agent id ascending.
pub fn compute_standings(records: &[MatchRecord]) -> Vec<StandingsEntry> {
    // BTreeMap keeps agents in id order before the final sort, so equal
    // scores already tie-break deterministically.
    let mut tally: BTreeMap<AgentId, (u32, u32, u32)> = BTreeMap::new();

    for record in records {
        let MatchRecord::Completed(result) = record else {
            continue;
        };
        let (a, b) = (result.player_a.clone(), result.player_b.clone());
        let (wins_a, draws_a, wins_b, draws_b) = match result.winner {
            Outcome::PlayerA => (1, 0, 0, 0),
            Outcome::PlayerB => (0, 0, 1, 0),
            Outcome::Draw => (0, 1, 0, 1),
        };
        let entry_a = tally.entry(a).or_default();
        entry_a.0 += wins_a;
        entry_a.1 += draws_a;
        entry_a.2 += u32::from(wins_b == 1);
        let entry_b = tally.entry(b).or_default();
        entry_b.0 += wins_b;
        entry_b.1 += draws_b;
        entry_b.2 += u32::from(wins_a == 1);
    }

    let mut standings: Vec<StandingsEntry> = tally
        .into_iter()
        .map(|(agent_id, (wins, draws, losses))| StandingsEntry {
            agent_id,
            wins,
            draws,
            losses,
            points: points::WIN * wins + points::DRAW * draws + points::LOSS * losses,
        })
        .collect();

    standings.sort_by(|x, y| {
        y.points
            .cmp(&x.points)
            .then(y.wins.cmp(&x.wins))
            .then(x.agent_id.cmp(&y.agent_id))
    });
    standings
}

#[cfg(test)]
mod standings_tests {
    use super::*;
    use crate::protocol::{MatchResult, Parity};

    fn completed(match_id: &str, a: &str, b: &str, winner: Outcome) -> MatchRecord {
        MatchRecord::Completed(MatchResult {
            match_id: match_id.to_string(),
            round_num: 1,
            player_a: a.to_string(),
            player_b: b.to_string(),
            winner,
            player_a_choice: Some(Parity::Even),
            player_b_choice: Some(Parity::Even),
            drawn_value: Some(2),
        })
    }

    #[test]
    fn points_are_three_one_zero() {
        let records = vec![
            completed("M1", "alice", "bob", Outcome::PlayerA),
            completed("M2", "carol", "dave", Outcome::Draw),
        ];
        let standings = compute_standings(&records);
        let by_id = |id: &str| standings.iter().find(|e| e.agent_id == id).unwrap();
        assert_eq!(by_id("alice").points, points::WIN);
        assert_eq!(by_id("bob").points, points::LOSS);
        assert_eq!(by_id("bob").losses, 1);
        assert_eq!(by_id("carol").points, points::DRAW);
        assert_eq!(by_id("dave").points, points::DRAW);
    }

    #[test]
    fn order_independent_and_deterministic() {
        let mut records = vec![
            completed("M1", "alice", "bob", Outcome::PlayerA),
            completed("M2", "bob", "carol", Outcome::Draw),
            completed("M3", "carol", "alice", Outcome::PlayerB),
        ];
        let forward = compute_standings(&records);
        records.reverse();
        let backward = compute_standings(&records);
        assert_eq!(forward, backward);
        assert_eq!(forward, compute_standings(&records));
    }

    #[test]
    fn ties_break_by_points_wins_then_id() {
        let records = vec![
            completed("M1", "zoe", "bob", Outcome::PlayerA),
            completed("M2", "amy", "bob", Outcome::PlayerA),
        ];
        let standings = compute_standings(&records);
        // amy and zoe both 3 points / 1 win: id ascending
        assert_eq!(standings[0].agent_id, "amy");
        assert_eq!(standings[1].agent_id, "zoe");
        assert_eq!(standings[2].agent_id, "bob");
    }

    #[test]
    fn errored_slots_score_nothing() {
        let records = vec![
            completed("M1", "alice", "bob", Outcome::Draw),
            MatchRecord::Errored {
                match_id: "M2".into(),
                round_num: 1,
                reason: "neither player joined".into(),
            },
        ];
        let standings = compute_standings(&records);
        assert_eq!(standings.len(), 2);
        assert!(standings.iter().all(|e| e.points == points::DRAW));
    }
}
