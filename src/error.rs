//! Error taxonomy for league orchestration.
//!
//! Transient protocol trouble (timeouts, duplicate deliveries) is absorbed
//! where it is detected and never surfaces through this type; what remains
//! here are the failures a caller of the orchestration API can actually see.

use thiserror::Error;

use crate::protocol::{AgentId, MatchId, MessageType};

/// Failures surfaced by the orchestration API.
#[derive(Error, Debug)]
pub enum LeagueError {
    /// Round number outside `1..=total_rounds`.
    #[error("invalid round {round}: league has rounds 1..={total_rounds}")]
    InvalidRound {
        /// Requested round.
        round: u32,
        /// Configured round count.
        total_rounds: u32,
    },

    /// A round may only be started once.
    #[error("round {0} was already started")]
    DuplicateRound(u32),

    /// An agent id may only register once per league.
    #[error("agent {0} is already registered")]
    DuplicateRegistration(AgentId),

    /// The league is not in a phase where this operation makes sense.
    #[error("operation not allowed while league is {0}")]
    WrongPhase(&'static str),

    /// The league is missing participants it cannot start without.
    #[error("league cannot start: {0}")]
    NotReady(&'static str),

    /// A message type the receiver has no handler for.
    #[error("unhandled message type {0:?}")]
    UnexpectedMessage(MessageType),

    /// Result reporting gave up after the configured number of attempts.
    #[error("no MATCH_RESULT_ACK for match {match_id} after {attempts} attempts")]
    RetryExhausted {
        /// Match whose report went unacknowledged.
        match_id: MatchId,
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Payload could not be (de)serialized.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Endpoint-level failure while exchanging messages.
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}
