//! The League Manager's orchestration state.
//!
//! [`LeagueOrchestrator`] is the single writer of all round state: the runner
//! feeds it one inbound message at a time, and every handler returns the
//! response plus any push messages to deliver, so all mutation is serialized
//! by construction. Match coordinators run elsewhere, in parallel; the only
//! thing they share with the orchestrator is the message protocol.
//!
//! Result recording is idempotent: reports are deduplicated by `match_id`
//! before they reach the round tracker, and a duplicate is re-acknowledged
//! without being counted twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::configuration::LeagueConfig;
use crate::error::LeagueError;
use crate::events::{EventSink, LeagueEvent};
use crate::protocol::{
    AgentId, GameId, LeagueId, MatchAssignment, MatchId, MatchRecord, MatchResult, Message,
    MessageType, Status,
};
use crate::round_tracker::RoundTracker;
use crate::schedule::{matches_per_round, round_robin_schedule, RoundPairings};
use crate::standings::{compute_standings, StandingsEntry};

/// Where the league currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaguePhase {
    /// Accepting referee and player registrations.
    Registration,
    /// Rounds are being played.
    Running,
    /// All rounds complete (or the league was shut down).
    Finished,
}

/// Everything a handler wants delivered: the direct response (for
/// request-type messages) and any push messages it triggered.
#[derive(Debug, Default)]
pub struct Handled {
    /// Response to the inbound message, if one is expected.
    pub reply: Option<Message>,
    /// Push messages to deliver (announcements, assignments, completions).
    pub outbound: Vec<Message>,
}

/// Round and registry state owned by the League Manager. Single writer.
pub struct LeagueOrchestrator {
    identity: AgentId,
    league_id: LeagueId,
    game_id: GameId,
    config: LeagueConfig,
    sink: Arc<dyn EventSink>,
    phase: LeaguePhase,
    referees: Vec<AgentId>,
    players: Vec<AgentId>,
    registered: HashSet<AgentId>,
    schedule: Vec<RoundPairings>,
    tracker: Option<RoundTracker>,
    recorded: HashSet<MatchId>,
    open_assignments: HashMap<MatchId, MatchAssignment>,
    dispatched_at: HashMap<MatchId, Instant>,
}

impl LeagueOrchestrator {
    /// Creates an orchestrator in the registration phase.
    pub fn new(
        league_id: impl Into<LeagueId>,
        game_id: impl Into<GameId>,
        config: LeagueConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        LeagueOrchestrator {
            identity: "league_manager".to_string(),
            league_id: league_id.into(),
            game_id: game_id.into(),
            config,
            sink,
            phase: LeaguePhase::Registration,
            referees: vec![],
            players: vec![],
            registered: HashSet::new(),
            schedule: vec![],
            tracker: None,
            recorded: HashSet::new(),
            open_assignments: HashMap::new(),
            dispatched_at: HashMap::new(),
        }
    }

    /// Current league phase.
    pub fn phase(&self) -> LeaguePhase {
        self.phase
    }

    /// Registered player ids, in registration order.
    pub fn players(&self) -> &[AgentId] {
        &self.players
    }

    /// Standings recomputed from every record seen so far.
    pub fn standings(&self) -> Vec<StandingsEntry> {
        match &self.tracker {
            Some(tracker) => compute_standings(&tracker.all_records()),
            None => vec![],
        }
    }

    /// Registers a Referee. Duplicate ids are rejected.
    pub fn register_referee(&mut self, id: &AgentId) -> Result<(), LeagueError> {
        self.register(id)?;
        self.referees.push(id.clone());
        info!(referee = %id, "referee registered");
        Ok(())
    }

    /// Registers a Player. Duplicate ids are rejected.
    pub fn register_player(&mut self, id: &AgentId) -> Result<(), LeagueError> {
        self.register(id)?;
        self.players.push(id.clone());
        info!(player = %id, "player registered");
        Ok(())
    }

    fn register(&mut self, id: &AgentId) -> Result<(), LeagueError> {
        if self.phase != LeaguePhase::Registration {
            return Err(LeagueError::WrongPhase("running"));
        }
        if !self.registered.insert(id.clone()) {
            self.sink.emit(&LeagueEvent::DuplicateRegistration { agent_id: id.clone() });
            return Err(LeagueError::DuplicateRegistration(id.clone()));
        }
        Ok(())
    }

    /// Starts the league: computes the fixed round-robin schedule and opens
    /// round one.
    ///
    /// Returns the `ROUND_ANNOUNCEMENT` and `RUN_MATCH` messages to deliver.
    pub fn start_league(&mut self) -> Result<Vec<Message>, LeagueError> {
        if self.phase != LeaguePhase::Registration {
            return Err(LeagueError::WrongPhase("already started"));
        }
        if self.players.len() < 2 {
            return Err(LeagueError::NotReady("needs at least two players"));
        }
        if self.referees.is_empty() {
            return Err(LeagueError::NotReady("needs at least one referee"));
        }

        self.schedule = round_robin_schedule(&self.players);
        let total_rounds = self.schedule.len() as u32;
        self.tracker = Some(RoundTracker::new(
            total_rounds,
            matches_per_round(self.players.len()),
        ));
        self.phase = LeaguePhase::Running;
        info!(league = %self.league_id, total_rounds, "league started");
        self.open_round(1)
    }

    /// One inbound message, serialized through the single writer.
    ///
    /// Message types the LM has no business receiving are answered with a
    /// `LEAGUE_ERROR` reply, never silently dropped.
    pub fn handle_message(&mut self, msg: &Message) -> Handled {
        match msg.msg_type {
            MessageType::RefereeRegisterRequest => {
                let outcome = self.register_referee(&msg.sender);
                Handled {
                    reply: Some(self.registration_reply(msg, MessageType::RefereeRegisterResponse, outcome)),
                    outbound: vec![],
                }
            }
            MessageType::LeagueRegisterRequest => {
                let outcome = self.register_player(&msg.sender);
                Handled {
                    reply: Some(self.registration_reply(msg, MessageType::LeagueRegisterResponse, outcome)),
                    outbound: vec![],
                }
            }
            MessageType::StartLeague => match self.start_league() {
                Ok(outbound) => Handled {
                    reply: Some(msg.reply(
                        MessageType::LeagueStatus,
                        self.identity.clone(),
                        json!({"status": Status::Success, "phase": self.phase}),
                    )),
                    outbound,
                },
                Err(e) => Handled {
                    reply: Some(msg.reply(
                        MessageType::LeagueStatus,
                        self.identity.clone(),
                        json!({"status": Status::Failure, "reason": e.to_string()}),
                    )),
                    outbound: vec![],
                },
            },
            MessageType::MatchResultReport => self.handle_result_report(msg),
            MessageType::GameError => self.handle_game_error(msg),
            MessageType::LeagueQuery => Handled {
                reply: Some(msg.reply(
                    MessageType::LeagueQueryResponse,
                    self.identity.clone(),
                    json!({
                        "status": Status::Ok,
                        "league_id": self.league_id,
                        "game_id": self.game_id,
                        "phase": self.phase,
                        "current_round": self.tracker.as_ref().map_or(0, RoundTracker::current_round),
                        "standings": self.standings(),
                    }),
                )),
                outbound: vec![],
            },
            MessageType::ShutdownCommand => {
                self.phase = LeaguePhase::Finished;
                Handled {
                    reply: Some(msg.reply(
                        MessageType::ShutdownAck,
                        self.identity.clone(),
                        json!({"status": Status::Acknowledged}),
                    )),
                    outbound: vec![],
                }
            }
            // responses and notices that close a loop but change nothing
            MessageType::RunMatchAck | MessageType::LeagueError => {
                debug!(msg_type = ?msg.msg_type, sender = %msg.sender, "noted");
                Handled::default()
            }
            other => {
                warn!(?other, sender = %msg.sender, "unhandled message type");
                Handled {
                    reply: Some(msg.error_reply(
                        MessageType::LeagueError,
                        self.identity.clone(),
                        &LeagueError::UnexpectedMessage(other).to_string(),
                    )),
                    outbound: vec![],
                }
            }
        }
    }

    fn registration_reply(
        &self,
        msg: &Message,
        msg_type: MessageType,
        outcome: Result<(), LeagueError>,
    ) -> Message {
        let payload = match outcome {
            Ok(()) => json!({"status": Status::Accepted, "league_id": self.league_id}),
            Err(LeagueError::DuplicateRegistration(_)) => {
                json!({"status": Status::Rejected, "reason": "DUPLICATE_REGISTRATION"})
            }
            Err(e) => json!({"status": Status::Rejected, "reason": e.to_string()}),
        };
        msg.reply(msg_type, self.identity.clone(), payload)
    }

    /// Records a reported result, deduplicating by `match_id`.
    ///
    /// A duplicate (retried) report is re-acknowledged with status
    /// `acknowledged` and counts nothing; a first report gets `recorded`.
    /// A report naming a `match_id` the LM never assigned (or sent before the
    /// league started) is answered with `LEAGUE_ERROR`: accepting it would
    /// let a stray report pad a round and re-fire completion.
    fn handle_result_report(&mut self, msg: &Message) -> Handled {
        let result: MatchResult = match msg.parse_payload() {
            Ok(result) => result,
            Err(e) => {
                return Handled {
                    reply: Some(msg.error_reply(
                        MessageType::LeagueError,
                        self.identity.clone(),
                        &format!("malformed result payload: {e}"),
                    )),
                    outbound: vec![],
                }
            }
        };

        if self.recorded.contains(&result.match_id) {
            debug!(match_id = %result.match_id, "duplicate result report re-acknowledged");
            return Handled {
                reply: Some(msg.reply(
                    MessageType::MatchResultAck,
                    self.identity.clone(),
                    json!({"status": Status::Acknowledged, "match_id": result.match_id}),
                )),
                outbound: vec![],
            };
        }

        if !self.open_assignments.contains_key(&result.match_id) {
            warn!(match_id = %result.match_id, sender = %msg.sender, "report for an unassigned match rejected");
            return Handled {
                reply: Some(msg.error_reply(
                    MessageType::LeagueError,
                    self.identity.clone(),
                    "no open assignment with this match_id",
                )),
                outbound: vec![],
            };
        }

        let match_id = result.match_id.clone();
        let outbound = self.record(MatchRecord::Completed(result));
        Handled {
            reply: Some(msg.reply(
                MessageType::MatchResultAck,
                self.identity.clone(),
                json!({"status": Status::Recorded, "match_id": match_id}),
            )),
            outbound,
        }
    }

    /// A Referee gave up on a match; account for the slot so the round can
    /// still complete.
    fn handle_game_error(&mut self, msg: &Message) -> Handled {
        let match_id = msg.payload.get("match_id").and_then(|v| v.as_str());
        let round_num = msg.payload.get("round_num").and_then(|v| v.as_u64());
        let (Some(match_id), Some(round_num)) = (match_id, round_num) else {
            warn!(payload = %msg.payload, "GAME_ERROR without match coordinates");
            return Handled::default();
        };
        if self.recorded.contains(match_id) {
            return Handled::default();
        }
        if !self.open_assignments.contains_key(match_id) {
            warn!(match_id, "GAME_ERROR for an unassigned match ignored");
            return Handled::default();
        }
        let reason = msg
            .payload
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified")
            .to_string();
        warn!(match_id, %reason, "match errored at referee");
        let outbound = self.record(MatchRecord::Errored {
            match_id: match_id.to_string(),
            round_num: round_num as u32,
            reason,
        });
        Handled { reply: None, outbound }
    }

    /// Round-level watchdog: writes off every assignment that has produced
    /// nothing within the configured match deadline, so a crashed Referee can
    /// never stall the round forever.
    pub fn expire_overdue_matches(&mut self, now: Instant) -> Vec<Message> {
        let deadline = self.config.match_deadline;
        let overdue: Vec<MatchAssignment> = self
            .open_assignments
            .values()
            .filter(|a| {
                self.dispatched_at
                    .get(&a.match_id)
                    .is_some_and(|at| now.duration_since(*at) >= deadline)
            })
            .cloned()
            .collect();

        let mut outbound = vec![];
        for assignment in overdue {
            warn!(match_id = %assignment.match_id, "match slot written off by watchdog");
            outbound.extend(self.record(MatchRecord::Errored {
                match_id: assignment.match_id,
                round_num: assignment.round_num,
                reason: "no result within match deadline".to_string(),
            }));
        }
        outbound
    }

    /// The single path every record takes: dedup bookkeeping, tracker,
    /// then round/league advancement.
    fn record(&mut self, record: MatchRecord) -> Vec<Message> {
        let Some(tracker) = self.tracker.as_mut() else {
            warn!(match_id = %record.match_id(), "record before league start dropped");
            return vec![];
        };
        self.recorded.insert(record.match_id().clone());
        self.open_assignments.remove(record.match_id());
        self.dispatched_at.remove(record.match_id());
        let round_num = record.round_num();
        tracker.add_match_result(round_num, record);
        self.advance(round_num)
    }

    fn advance(&mut self, round_num: u32) -> Vec<Message> {
        let tracker = self.tracker.as_mut().expect("advance without tracker");
        if !tracker.check_round_complete(round_num) {
            return vec![];
        }
        tracker.mark_round_complete(round_num);
        let total_rounds = tracker.total_rounds();
        info!(round_num, "round completed");
        self.sink.emit(&LeagueEvent::RoundCompleted { round_num });

        let standings = self.standings();
        self.sink.emit(&LeagueEvent::StandingsUpdate { standings: standings.clone() });

        let mut outbound = vec![
            Message::request(
                MessageType::RoundCompleted,
                self.identity.clone(),
                json!({"round_num": round_num, "league_id": self.league_id}),
            ),
            Message::request(
                MessageType::LeagueStandingsUpdate,
                self.identity.clone(),
                json!({"round_num": round_num, "standings": standings}),
            ),
        ];

        if round_num >= total_rounds {
            self.phase = LeaguePhase::Finished;
            info!(league = %self.league_id, "league completed");
            self.sink.emit(&LeagueEvent::LeagueCompleted);
            outbound.push(Message::request(
                MessageType::LeagueCompleted,
                self.identity.clone(),
                json!({"league_id": self.league_id, "standings": self.standings()}),
            ));
        } else {
            match self.open_round(round_num + 1) {
                Ok(mut next) => outbound.append(&mut next),
                // cannot happen with a well-formed schedule, but never panic
                Err(e) => warn!("could not open round {}: {e}", round_num + 1),
            }
        }
        outbound
    }

    fn open_round(&mut self, round_num: u32) -> Result<Vec<Message>, LeagueError> {
        let tracker = self.tracker.as_mut().expect("open_round without tracker");
        tracker.start_round(round_num)?;

        let pairings = self.schedule[(round_num - 1) as usize].clone();
        let mut outbound = vec![Message::request(
            MessageType::RoundAnnouncement,
            self.identity.clone(),
            json!({
                "league_id": self.league_id,
                "round_num": round_num,
                "num_matches": pairings.len(),
            }),
        )];

        let now = Instant::now();
        for (index, (player_a, player_b)) in pairings.into_iter().enumerate() {
            let assignment = MatchAssignment {
                match_id: format!("R{round_num}M{}", index + 1),
                round_num,
                game_id: self.game_id.clone(),
                player_a,
                player_b,
                referee: self.referees[index % self.referees.len()].clone(),
            };
            self.dispatched_at.insert(assignment.match_id.clone(), now);
            self.open_assignments
                .insert(assignment.match_id.clone(), assignment.clone());
            outbound.push(Message::request(
                MessageType::RunMatch,
                self.identity.clone(),
                serde_json::to_value(&assignment)?,
            ));
        }
        Ok(outbound)
    }
}
