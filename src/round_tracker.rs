//! Per-league round progress tracking.
//!
//! The tracker is the single place that decides when a round, and the whole
//! league, is complete. Completion is measured by counting recorded slots,
//! not by a per-assignment handshake: a Referee may crash and be replaced, as
//! long as exactly one record eventually lands per match slot. Deduplication
//! by `match_id` happens in the orchestrator before anything reaches
//! [`RoundTracker::add_match_result`].

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::LeagueError;
use crate::protocol::MatchRecord;

/// Round bookkeeping owned exclusively by the League Orchestrator.
#[derive(Debug)]
pub struct RoundTracker {
    total_rounds: u32,
    matches_per_round: usize,
    current_round: u32,
    round_records: BTreeMap<u32, Vec<MatchRecord>>,
    rounds_completed: BTreeMap<u32, bool>,
}

impl RoundTracker {
    /// Creates a tracker for a league of `total_rounds` rounds with
    /// `matches_per_round` match slots each.
    pub fn new(total_rounds: u32, matches_per_round: usize) -> Self {
        RoundTracker {
            total_rounds,
            matches_per_round,
            current_round: 0,
            round_records: BTreeMap::new(),
            rounds_completed: BTreeMap::new(),
        }
    }

    /// Starts a round: initializes its empty record list and makes it the
    /// current round.
    ///
    /// Fails without mutating state if `round_num` is outside
    /// `1..=total_rounds` or the round was already started.
    pub fn start_round(&mut self, round_num: u32) -> Result<(), LeagueError> {
        if round_num < 1 || round_num > self.total_rounds {
            return Err(LeagueError::InvalidRound {
                round: round_num,
                total_rounds: self.total_rounds,
            });
        }
        if self.round_records.contains_key(&round_num) {
            return Err(LeagueError::DuplicateRound(round_num));
        }
        trace!(round_num, "round started");
        self.round_records.insert(round_num, vec![]);
        self.rounds_completed.insert(round_num, false);
        self.current_round = round_num;
        Ok(())
    }

    /// Appends a record to a round's list.
    ///
    /// A no-op for unknown rounds: a record delivered after its round was
    /// never started (or for a round number that never existed) is dropped
    /// rather than treated as an error, to tolerate late delivery.
    pub fn add_match_result(&mut self, round_num: u32, record: MatchRecord) {
        match self.round_records.get_mut(&round_num) {
            Some(records) => records.push(record),
            None => trace!(round_num, match_id = %record.match_id(), "record for unknown round dropped"),
        }
    }

    /// True iff the round's recorded slot count reached `matches_per_round`.
    /// Pure query, no side effect.
    pub fn check_round_complete(&self, round_num: u32) -> bool {
        self.round_records
            .get(&round_num)
            .is_some_and(|records| records.len() >= self.matches_per_round)
    }

    /// Flags a round as observed complete by the orchestrator.
    pub fn mark_round_complete(&mut self, round_num: u32) {
        if let Some(done) = self.rounds_completed.get_mut(&round_num) {
            *done = true;
        }
    }

    /// True once every round has been started and observed complete.
    pub fn is_league_complete(&self) -> bool {
        self.rounds_completed.len() == self.total_rounds as usize
            && self.rounds_completed.values().all(|done| *done)
    }

    /// The round currently being played, `0` before the first round starts.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Configured number of rounds.
    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    /// Configured number of match slots per round.
    pub fn matches_per_round(&self) -> usize {
        self.matches_per_round
    }

    /// All records of all rounds, in round order then insertion order.
    /// Standings are recomputed from this, never kept incrementally.
    pub fn all_records(&self) -> Vec<MatchRecord> {
        self.round_records.values().flatten().cloned().collect()
    }

    /// Records of a single round, empty if the round was never started.
    pub fn round_records(&self, round_num: u32) -> &[MatchRecord] {
        self.round_records
            .get(&round_num)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
