//! Named observability events.
//!
//! Every sink is fire-and-forget: emission must never block or fail core
//! orchestration, so [`EventSink::emit`] takes a reference and returns
//! nothing. The default sink forwards to `tracing`.

use serde::Serialize;
use tracing::{info, warn};

use crate::protocol::{AgentId, MatchId, Outcome, TimeoutKey};
use crate::standings::StandingsEntry;

/// Events the orchestration core announces to whoever is listening.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeagueEvent {
    /// A match coordinator started driving a match.
    MatchStart {
        /// Match being started.
        match_id: MatchId,
        /// Round it belongs to.
        round_num: u32,
    },
    /// A match produced its record.
    MatchComplete {
        /// Match that finished.
        match_id: MatchId,
        /// Its resolution, `None` when the slot errored.
        winner: Option<Outcome>,
    },
    /// A bounded wait expired.
    Timeout {
        /// Which timeout class expired.
        key: TimeoutKey,
        /// Match affected, if any.
        match_id: Option<MatchId>,
    },
    /// A request failed and was absorbed by forfeit/retry policy.
    RequestError {
        /// What went wrong.
        reason: String,
        /// Match affected, if any.
        match_id: Option<MatchId>,
    },
    /// An agent tried to register an id already taken.
    DuplicateRegistration {
        /// Offending agent id.
        agent_id: AgentId,
    },
    /// All slots of a round are accounted for.
    RoundCompleted {
        /// The completed round.
        round_num: u32,
    },
    /// Every round is complete.
    LeagueCompleted,
    /// Fresh standings snapshot.
    StandingsUpdate {
        /// The recomputed table.
        standings: Vec<StandingsEntry>,
    },
}

/// Where events go. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// Consumes one event. Failures stay inside the sink.
    fn emit(&self, event: &LeagueEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LeagueEvent) {
        match event {
            LeagueEvent::Timeout { .. }
            | LeagueEvent::RequestError { .. }
            | LeagueEvent::DuplicateRegistration { .. } => warn!(?event),
            _ => info!(?event),
        }
    }
}

/// Swallows everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LeagueEvent) {}
}
