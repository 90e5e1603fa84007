//! Per-match lifecycle driven by a Referee.
//!
//! One [`MatchCoordinator`] instance exists per `match_id`; instances are
//! independent and share nothing mutable, so a Referee can run many matches
//! concurrently (the runner gives each its own thread). The coordinator walks
//! a fixed state machine:
//!
//! `Assigned → Inviting → AwaitingJoin → CollectingChoices → Resolving →
//! Reporting → Done`, with `Errored` absorbing from any non-terminal state.
//!
//! Every wait is bounded by a [`TimeoutKey`] duration; a timeout forfeits the
//! silent player rather than propagating an error, so a match can never hang.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::configuration::LeagueConfig;
use crate::error::LeagueError;
use crate::events::{EventSink, LeagueEvent};
use crate::game::GameRules;
use crate::protocol::{
    MatchAssignment, MatchRecord, MatchResult, Message, MessageType, Outcome, Parity, Status,
    TimeoutKey,
};
use crate::transport::Endpoint;

/// Where a match currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Assignment received, nothing sent yet.
    Assigned,
    /// Invitations going out.
    Inviting,
    /// Waiting for both join acks.
    AwaitingJoin,
    /// Waiting for both parity choices.
    CollectingChoices,
    /// Both choices known, applying the game rules.
    Resolving,
    /// Result known, reporting to the LM.
    Reporting,
    /// Terminal: result acknowledged.
    Done,
    /// Terminal: slot written off.
    Errored,
}

enum JoinOutcome {
    Joined,
    Out(String),
}

/// Drives one match between two player endpoints and reports to the LM.
pub struct MatchCoordinator<P: Endpoint, L: Endpoint> {
    assignment: MatchAssignment,
    config: LeagueConfig,
    rules: Arc<dyn GameRules>,
    player_a: P,
    player_b: P,
    league: L,
    sink: Arc<dyn EventSink>,
    shutdown: Arc<AtomicBool>,
    phase: MatchPhase,
}

impl<P: Endpoint, L: Endpoint> MatchCoordinator<P, L> {
    /// Builds a coordinator for `assignment`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assignment: MatchAssignment,
        config: LeagueConfig,
        rules: Arc<dyn GameRules>,
        player_a: P,
        player_b: P,
        league: L,
        sink: Arc<dyn EventSink>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        MatchCoordinator {
            assignment,
            config,
            rules,
            player_a,
            player_b,
            league,
            sink,
            shutdown,
            phase: MatchPhase::Assigned,
        }
    }

    /// Current state machine phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Runs the match to a terminal phase and returns its record.
    ///
    /// Never panics and never blocks unbounded; any failure path ends in an
    /// errored record that still accounts for the round slot.
    #[instrument(skip(self), fields(match_id = %self.assignment.match_id))]
    pub fn run(mut self) -> MatchRecord {
        self.sink.emit(&LeagueEvent::MatchStart {
            match_id: self.assignment.match_id.clone(),
            round_num: self.assignment.round_num,
        });

        let record = match self.drive() {
            Ok(result) => MatchRecord::Completed(result),
            Err(reason) => {
                self.phase = MatchPhase::Errored;
                warn!(%reason, "match errored");
                self.surface_game_error(&reason);
                MatchRecord::Errored {
                    match_id: self.assignment.match_id.clone(),
                    round_num: self.assignment.round_num,
                    reason,
                }
            }
        };

        let winner = match &record {
            MatchRecord::Completed(result) => Some(result.winner),
            MatchRecord::Errored { .. } => None,
        };
        self.sink.emit(&LeagueEvent::MatchComplete {
            match_id: self.assignment.match_id.clone(),
            winner,
        });
        record
    }

    fn drive(&mut self) -> Result<MatchResult, String> {
        let (join_a, join_b) = self.invite_players()?;
        self.check_shutdown()?;

        let result = match (join_a, join_b) {
            (JoinOutcome::Joined, JoinOutcome::Joined) => {
                self.phase = MatchPhase::CollectingChoices;
                let (choice_a, choice_b) = self.collect_choices()?;
                self.check_shutdown()?;
                self.resolve(choice_a, choice_b)?
            }
            (JoinOutcome::Joined, JoinOutcome::Out(reason)) => {
                debug!(player = %self.assignment.player_b, %reason, "player forfeits at join");
                self.forfeit(Outcome::PlayerA, None, None)
            }
            (JoinOutcome::Out(reason), JoinOutcome::Joined) => {
                debug!(player = %self.assignment.player_a, %reason, "player forfeits at join");
                self.forfeit(Outcome::PlayerB, None, None)
            }
            (JoinOutcome::Out(reason_a), JoinOutcome::Out(reason_b)) => {
                return Err(format!("neither player joined ({reason_a}; {reason_b})"));
            }
        };

        self.phase = MatchPhase::Reporting;
        self.announce_game_over(&result);
        self.report_result(&result).map_err(|e| e.to_string())?;
        self.phase = MatchPhase::Done;
        Ok(result)
    }

    fn invite_players(&mut self) -> Result<(JoinOutcome, JoinOutcome), String> {
        self.check_shutdown()?;
        self.phase = MatchPhase::Inviting;
        let timeout = self.config.timeout(TimeoutKey::GameJoinAck);
        let invitation_a = invitation(&self.assignment, &self.assignment.player_b, "PLAYER_A");
        let invitation_b = invitation(&self.assignment, &self.assignment.player_a, "PLAYER_B");

        self.phase = MatchPhase::AwaitingJoin;
        let join_a = Self::await_join(
            &mut self.player_a,
            invitation_a,
            timeout,
            &self.assignment,
            self.sink.as_ref(),
        );
        let join_b = Self::await_join(
            &mut self.player_b,
            invitation_b,
            timeout,
            &self.assignment,
            self.sink.as_ref(),
        );
        Ok((join_a, join_b))
    }

    fn await_join(
        player: &mut P,
        invitation: Message,
        timeout: std::time::Duration,
        assignment: &MatchAssignment,
        sink: &dyn EventSink,
    ) -> JoinOutcome {
        match player.request(invitation, timeout) {
            Ok(ack) if ack.msg_type == MessageType::GameJoinAck && ack.status() == Some(Status::Accepted) => {
                JoinOutcome::Joined
            }
            Ok(ack) => {
                sink.emit(&LeagueEvent::RequestError {
                    reason: format!("join rejected ({:?})", ack.status()),
                    match_id: Some(assignment.match_id.clone()),
                });
                JoinOutcome::Out("join rejected".into())
            }
            Err(e) => {
                sink.emit(&LeagueEvent::Timeout {
                    key: TimeoutKey::GameJoinAck,
                    match_id: Some(assignment.match_id.clone()),
                });
                JoinOutcome::Out(format!("no join ack: {e}"))
            }
        }
    }

    fn collect_choices(&mut self) -> Result<(Option<Parity>, Option<Parity>), String> {
        let timeout = self.config.timeout(TimeoutKey::ParityChoice);
        let match_id = self.assignment.match_id.clone();

        let mut ask = |player: &mut P, sink: &dyn EventSink| -> Option<Parity> {
            let call = Message::request(
                MessageType::ChooseParityCall,
                self.assignment.referee.clone(),
                json!({"match_id": match_id, "game_id": self.assignment.game_id}),
            );
            match player.request(call, timeout) {
                Ok(response) if response.msg_type == MessageType::ChooseParityResponse => response
                    .payload
                    .get("choice")
                    .and_then(|c| serde_json::from_value(c.clone()).ok()),
                Ok(_) | Err(_) => {
                    sink.emit(&LeagueEvent::Timeout {
                        key: TimeoutKey::ParityChoice,
                        match_id: Some(match_id.clone()),
                    });
                    None
                }
            }
        };

        let choice_a = ask(&mut self.player_a, self.sink.as_ref());
        let choice_b = ask(&mut self.player_b, self.sink.as_ref());
        if choice_a.is_none() && choice_b.is_none() {
            return Err("neither player sent a parity choice".into());
        }
        Ok((choice_a, choice_b))
    }

    fn resolve(
        &mut self,
        choice_a: Option<Parity>,
        choice_b: Option<Parity>,
    ) -> Result<MatchResult, String> {
        self.phase = MatchPhase::Resolving;
        let result = match (choice_a, choice_b) {
            (Some(a), Some(b)) => {
                let resolution = self.rules.resolve(a, b);
                debug!(?resolution, "match resolved");
                self.build_result(resolution.winner, Some(a), Some(b), resolution.drawn_value)
            }
            // a silent player forfeits to the responder
            (Some(a), None) => self.forfeit(Outcome::PlayerA, Some(a), None),
            (None, Some(b)) => self.forfeit(Outcome::PlayerB, None, Some(b)),
            (None, None) => unreachable!("collect_choices errors when both are silent"),
        };
        Ok(result)
    }

    fn forfeit(
        &self,
        winner: Outcome,
        choice_a: Option<Parity>,
        choice_b: Option<Parity>,
    ) -> MatchResult {
        self.build_result(winner, choice_a, choice_b, None)
    }

    fn build_result(
        &self,
        winner: Outcome,
        choice_a: Option<Parity>,
        choice_b: Option<Parity>,
        drawn_value: Option<u32>,
    ) -> MatchResult {
        MatchResult {
            match_id: self.assignment.match_id.clone(),
            round_num: self.assignment.round_num,
            player_a: self.assignment.player_a.clone(),
            player_b: self.assignment.player_b.clone(),
            winner,
            player_a_choice: choice_a,
            player_b_choice: choice_b,
            drawn_value,
        }
    }

    /// Informational, fire-and-forget: delivery failures are logged and
    /// ignored.
    fn announce_game_over(&mut self, result: &MatchResult) {
        let payload = json!({
            "match_id": result.match_id,
            "winner": result.winner,
            "drawn_value": result.drawn_value,
        });
        for player in [&mut self.player_a, &mut self.player_b] {
            let note = Message::request(
                MessageType::GameOver,
                self.assignment.referee.clone(),
                payload.clone(),
            );
            if let Err(e) = player.notify(note) {
                debug!("game over notice dropped: {e}");
            }
        }
    }

    /// Reports the result to the LM, retrying on timeout. Each retry reuses
    /// the same correlation id so the LM can tell a retry from a new report.
    fn report_result(&mut self, result: &MatchResult) -> Result<(), LeagueError> {
        let report = Message::request(
            MessageType::MatchResultReport,
            self.assignment.referee.clone(),
            serde_json::to_value(result)?,
        );
        let timeout = self.config.timeout(TimeoutKey::HttpRequest);

        for attempt in 1..=self.config.report_retry_limit {
            self.check_shutdown().map_err(|_| LeagueError::RetryExhausted {
                match_id: result.match_id.clone(),
                attempts: attempt,
            })?;
            match self.league.request(report.clone(), timeout) {
                Ok(ack)
                    if ack.msg_type == MessageType::MatchResultAck
                        && matches!(ack.status(), Some(Status::Recorded | Status::Acknowledged)) =>
                {
                    return Ok(());
                }
                Ok(ack) => {
                    warn!(?ack.msg_type, status = ?ack.status(), attempt, "unexpected report reply");
                }
                Err(e) => {
                    self.sink.emit(&LeagueEvent::RequestError {
                        reason: format!("result report attempt {attempt} failed: {e}"),
                        match_id: Some(result.match_id.clone()),
                    });
                }
            }
        }
        Err(LeagueError::RetryExhausted {
            match_id: result.match_id.clone(),
            attempts: self.config.report_retry_limit,
        })
    }

    /// Best-effort `GAME_ERROR` to the LM so the slot can be accounted for
    /// before the watchdog would.
    fn surface_game_error(&mut self, reason: &str) {
        let notice = Message::request(
            MessageType::GameError,
            self.assignment.referee.clone(),
            json!({
                "status": Status::Error,
                "match_id": self.assignment.match_id,
                "round_num": self.assignment.round_num,
                "reason": reason,
            }),
        );
        let _ = self.league.notify(notice);
    }

    fn check_shutdown(&self) -> Result<(), String> {
        if self.shutdown.load(Ordering::SeqCst) {
            Err("shutdown requested".into())
        } else {
            Ok(())
        }
    }
}

fn invitation(assignment: &MatchAssignment, opponent: &str, role: &str) -> Message {
    Message::request(
        MessageType::GameInvitation,
        assignment.referee.clone(),
        json!({
            "match_id": assignment.match_id,
            "round_num": assignment.round_num,
            "game_id": assignment.game_id,
            "opponent": opponent,
            "role": role,
        }),
    )
}
