//! Wire contract shared by the League Manager, Referees, and Players.
//!
//! Every exchange between agents is a [`Message`] envelope: a closed
//! [`MessageType`], the sender's identity, a correlation id tying a response
//! to its request, and a message-specific JSON payload. The enumerations here
//! are the whole protocol vocabulary; an agent receiving a message type it
//! does not handle must answer with an error status rather than dropping it
//! (see [`Message::error_reply`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a participant (League Manager, Referee, or Player).
pub type AgentId = String;
/// Opaque identifier of a competition instance.
pub type LeagueId = String;
/// Opaque identifier of the game type a league runs.
pub type GameId = String;
/// Opaque identifier of a single match.
pub type MatchId = String;

/// Every message type an agent may send or receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A Referee asks the LM to join the league staff.
    RefereeRegisterRequest,
    /// LM's answer to [`MessageType::RefereeRegisterRequest`].
    RefereeRegisterResponse,
    /// A Player asks the LM to join the league.
    LeagueRegisterRequest,
    /// LM's answer to [`MessageType::LeagueRegisterRequest`].
    LeagueRegisterResponse,
    /// Kick off the competition once every participant is registered.
    StartLeague,
    /// Snapshot of the league phase, pushed by the LM.
    LeagueStatus,
    /// A new round is starting.
    RoundAnnouncement,
    /// All match slots of a round are accounted for.
    RoundCompleted,
    /// Every round is complete; the league is finished.
    LeagueCompleted,
    /// Standings snapshot pushed after each completed round.
    LeagueStandingsUpdate,
    /// LM hands a match assignment to a Referee.
    RunMatch,
    /// Referee acknowledges a match assignment.
    RunMatchAck,
    /// Referee invites a Player into a match.
    GameInvitation,
    /// Player accepts or rejects an invitation.
    GameJoinAck,
    /// Referee asks a Player for its parity choice.
    ChooseParityCall,
    /// Player's parity choice.
    ChooseParityResponse,
    /// Informational end-of-game notice to the players.
    GameOver,
    /// Referee reports a match outcome to the LM.
    MatchResultReport,
    /// LM acknowledges a result report (idempotent on retry).
    MatchResultAck,
    /// Read-only query of league phase and standings.
    LeagueQuery,
    /// Answer to [`MessageType::LeagueQuery`].
    LeagueQueryResponse,
    /// Orderly-shutdown request.
    ShutdownCommand,
    /// Shutdown acknowledgement.
    ShutdownAck,
    /// League-level failure notice.
    LeagueError,
    /// Match-level failure notice.
    GameError,
}

/// Status codes carried inside payloads.
///
/// Wire spellings are uneven (`ok` but `ACCEPTED`); the serde renames pin the
/// exact strings so the envelope stays wire-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Generic success.
    #[serde(rename = "ok")]
    Ok,
    /// Registration or invitation accepted.
    #[serde(rename = "ACCEPTED")]
    Accepted,
    /// Registration or invitation refused.
    #[serde(rename = "REJECTED")]
    Rejected,
    /// Result stored for the first time.
    #[serde(rename = "recorded")]
    Recorded,
    /// Duplicate report recognized and re-acknowledged.
    #[serde(rename = "acknowledged")]
    Acknowledged,
    /// The request could not be handled.
    #[serde(rename = "error")]
    Error,
    /// Operation completed.
    #[serde(rename = "success")]
    Success,
    /// Operation did not complete.
    #[serde(rename = "failure")]
    Failure,
}

/// Named timeout classes. Each key resolves to a duration through
/// [`LeagueConfig`](crate::configuration::LeagueConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeoutKey {
    /// Waiting for a player's [`MessageType::GameJoinAck`].
    GameJoinAck,
    /// Waiting for a player's [`MessageType::ChooseParityResponse`].
    ParityChoice,
    /// Waiting for a registration response.
    LeagueRegister,
    /// Generic request/response exchange.
    HttpRequest,
    /// Waiting for an agent to come up at all.
    AgentStartup,
}

/// The message envelope exchanged between agents. Immutable once sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message type.
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    /// Identity of the sending agent.
    pub sender: AgentId,
    /// Ties a response to its request, and a retry to the original.
    pub correlation_id: Uuid,
    /// Message-specific mapping.
    pub payload: serde_json::Value,
}

impl Message {
    /// Builds a fresh request (or push) message with a new correlation id.
    pub fn request(msg_type: MessageType, sender: impl Into<AgentId>, payload: serde_json::Value) -> Self {
        Message {
            msg_type,
            sender: sender.into(),
            correlation_id: Uuid::new_v4(),
            payload,
        }
    }

    /// Builds the response to `self`, reusing its correlation id.
    pub fn reply(&self, msg_type: MessageType, sender: impl Into<AgentId>, payload: serde_json::Value) -> Self {
        Message {
            msg_type,
            sender: sender.into(),
            correlation_id: self.correlation_id,
            payload,
        }
    }

    /// The mandated answer to a message type the receiver does not handle:
    /// an error-status reply, never a silent drop.
    pub fn error_reply(&self, msg_type: MessageType, sender: impl Into<AgentId>, reason: &str) -> Self {
        self.reply(
            msg_type,
            sender,
            serde_json::json!({
                "status": Status::Error,
                "reason": reason,
                "unhandled_type": self.msg_type,
            }),
        )
    }

    /// Deserializes the payload into a typed struct.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Status code inside the payload, if any.
    pub fn status(&self) -> Option<Status> {
        self.payload
            .get("status")
            .and_then(|s| serde_json::from_value(s.clone()).ok())
    }
}

/// A player's parity call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Parity {
    /// The drawn value will be even.
    Even,
    /// The drawn value will be odd.
    Odd,
}

impl Parity {
    /// Parity of a drawn value.
    pub fn of(value: u32) -> Parity {
        if value % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Who won a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// First listed player won.
    PlayerA,
    /// Second listed player won.
    PlayerB,
    /// Both guessed right, or both guessed wrong.
    Draw,
}

/// One scheduled match. Created by the LM at round start, owned by exactly
/// one Referee, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchAssignment {
    /// Unique id of this match slot.
    pub match_id: MatchId,
    /// Round this match belongs to.
    pub round_num: u32,
    /// Game type being played.
    pub game_id: GameId,
    /// First player.
    pub player_a: AgentId,
    /// Second player.
    pub player_b: AgentId,
    /// Referee owning the match.
    pub referee: AgentId,
}

/// Outcome of one match, produced exactly once by the owning Referee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Match this result belongs to.
    pub match_id: MatchId,
    /// Round this result belongs to.
    pub round_num: u32,
    /// First player.
    pub player_a: AgentId,
    /// Second player.
    pub player_b: AgentId,
    /// Resolution of the match.
    pub winner: Outcome,
    /// First player's call, `None` if the player forfeited.
    pub player_a_choice: Option<Parity>,
    /// Second player's call, `None` if the player forfeited.
    pub player_b_choice: Option<Parity>,
    /// The value drawn by the Referee, `None` when resolved by forfeit.
    pub drawn_value: Option<u32>,
}

impl MatchResult {
    /// The winning agent, `None` on a draw.
    pub fn winner_id(&self) -> Option<&AgentId> {
        match self.winner {
            Outcome::PlayerA => Some(&self.player_a),
            Outcome::PlayerB => Some(&self.player_b),
            Outcome::Draw => None,
        }
    }
}

/// How a round slot was accounted for.
///
/// A slot that can never produce a result anymore (retry exhaustion, watchdog
/// expiry, shutdown) is recorded as [`MatchRecord::Errored`] so the round
/// still completes; errored slots never contribute points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRecord {
    /// The match produced a proper result.
    Completed(MatchResult),
    /// The match slot was written off.
    Errored {
        /// Match this record accounts for.
        match_id: MatchId,
        /// Round this record accounts for.
        round_num: u32,
        /// Reason code for observability.
        reason: String,
    },
}

impl MatchRecord {
    /// Match id this record accounts for.
    pub fn match_id(&self) -> &MatchId {
        match self {
            MatchRecord::Completed(result) => &result.match_id,
            MatchRecord::Errored { match_id, .. } => match_id,
        }
    }

    /// Round number this record accounts for.
    pub fn round_num(&self) -> u32 {
        match self {
            MatchRecord::Completed(result) => result.round_num,
            MatchRecord::Errored { round_num, .. } => *round_num,
        }
    }
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn message_types_use_wire_names() {
        let json = serde_json::to_value(MessageType::ChooseParityCall).unwrap();
        assert_eq!(json, serde_json::json!("CHOOSE_PARITY_CALL"));
        let back: MessageType = serde_json::from_value(serde_json::json!("MATCH_RESULT_ACK")).unwrap();
        assert_eq!(back, MessageType::MatchResultAck);
    }

    #[test]
    fn status_spelling_is_uneven_on_purpose() {
        assert_eq!(serde_json::to_value(Status::Ok).unwrap(), serde_json::json!("ok"));
        assert_eq!(
            serde_json::to_value(Status::Accepted).unwrap(),
            serde_json::json!("ACCEPTED")
        );
        assert_eq!(
            serde_json::to_value(Status::Recorded).unwrap(),
            serde_json::json!("recorded")
        );
    }

    #[test]
    fn reply_keeps_correlation_id() {
        let req = Message::request(
            MessageType::LeagueQuery,
            "viewer",
            serde_json::json!({}),
        );
        let resp = req.reply(
            MessageType::LeagueQueryResponse,
            "league_manager",
            serde_json::json!({"status": Status::Ok}),
        );
        assert_eq!(req.correlation_id, resp.correlation_id);
        assert_eq!(resp.status(), Some(Status::Ok));
    }

    #[test]
    fn error_reply_names_the_unhandled_type() {
        let stray = Message::request(
            MessageType::GameInvitation,
            "referee_1",
            serde_json::json!({}),
        );
        let err = stray.error_reply(MessageType::LeagueError, "league_manager", "not handled here");
        assert_eq!(err.status(), Some(Status::Error));
        assert_eq!(
            err.payload["unhandled_type"],
            serde_json::json!("GAME_INVITATION")
        );
    }

    #[test]
    fn parity_of_drawn_value() {
        assert_eq!(Parity::of(42), Parity::Even);
        assert_eq!(Parity::of(7), Parity::Odd);
    }

    #[test]
    fn match_assignment_round_trips() {
        let assignment = MatchAssignment {
            match_id: "R1M1".into(),
            round_num: 1,
            game_id: "parity_guess".into(),
            player_a: "alice".into(),
            player_b: "bob".into(),
            referee: "referee_1".into(),
        };
        let value = serde_json::to_value(&assignment).unwrap();
        assert_eq!(serde_json::from_value::<MatchAssignment>(value).unwrap(), assignment);
    }
}
