//! End-to-end league execution.
//!
//! This module defines the [`LeagueRunner`] type, which wires the whole
//! protocol together in-process: it hosts the League Manager's single-writer
//! message loop, serves each Player on its own thread, and launches one
//! [`MatchCoordinator`](crate::referee::MatchCoordinator) thread per
//! `RUN_MATCH` assignment. Coordinators talk to the LM exclusively through
//! the message protocol: result reports land in the same mailbox as every
//! other inbound message, so all round state mutation stays serialized.
//!
//! # Behavior & Configuration
//!
//! Behavior is controlled by a [`LeagueConfig`] object: timeout durations per
//! [`TimeoutKey`](crate::protocol::TimeoutKey), the result-report retry
//! limit, the watchdog deadline for stalled match slots, and the shutdown
//! grace period. When `config.log = true` the runner installs the file
//! logger from [`logger`](crate::logger).
//!
//! # Example
//!
//! See crate-level documentation for an example of running a full league.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::configuration::LeagueConfig;
use crate::events::{EventSink, TracingSink};
use crate::game::{GameRules, ParityRules, ParityStrategy};
use crate::league::{LeagueOrchestrator, LeaguePhase};
use crate::logger::init_logger;
use crate::player::PlayerAgent;
use crate::protocol::{AgentId, MatchAssignment, MatchRecord, Message, MessageType, Status};
use crate::referee::MatchCoordinator;
use crate::standings::StandingsEntry;
use crate::transport::{ChannelEndpoint, Delivery, Endpoint};

/// How often the LM loop wakes up to run the watchdog when idle.
const WATCHDOG_TICK: Duration = Duration::from_millis(100);

/// The main type for running a league among in-process agents.
///
/// Register a roster of players (each with its own decision strategy), call
/// [`run`](LeagueRunner::run), get the final standings back.
pub struct LeagueRunner {
    config: LeagueConfig,
    rules: Arc<dyn GameRules>,
    sink: Arc<dyn EventSink>,
    shutdown: Arc<AtomicBool>,
    num_referees: usize,
}

impl LeagueRunner {
    /// Creates a runner with the parity game and a tracing event sink.
    #[instrument(skip_all)]
    pub fn new(config: LeagueConfig) -> Self {
        if config.log {
            // A broken log file should not take the league down with it.
            if let Err(e) = init_logger() {
                eprintln!("file logging disabled: {e:#}");
            }
        }
        let (min, max) = config.draw_range;
        LeagueRunner {
            config,
            rules: Arc::new(ParityRules::new(min, max)),
            sink: Arc::new(TracingSink),
            shutdown: Arc::new(AtomicBool::new(false)),
            num_referees: 1,
        }
    }

    /// Replaces the game rules (selected per `game_id`).
    pub fn with_rules(mut self, rules: Arc<dyn GameRules>) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets how many Referee identities matches are spread over.
    pub fn with_referees(mut self, count: usize) -> Self {
        self.num_referees = count.max(1);
        self
    }

    /// Flag another thread can set to abandon in-flight matches and finish
    /// early. Honored at every coordinator suspension point.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Runs a full league over `roster` and returns the final standings.
    ///
    /// # Errors
    /// Returns an error if a roster member fails the registration handshake
    /// or the league cannot start (fewer than two players).
    pub fn run(
        &self,
        roster: Vec<(AgentId, Box<dyn ParityStrategy>)>,
    ) -> anyhow::Result<Vec<StandingsEntry>> {
        let mut orchestrator = LeagueOrchestrator::new(
            "league_1",
            self.rules.game_id(),
            self.config.clone(),
            self.sink.clone(),
        );

        // LM mailbox: coordinators and agents all deliver here.
        let (lm_tx, lm_inbox) = mpsc::channel::<Delivery>();

        // referee staff registration handshake
        let referees: Vec<AgentId> = (1..=self.num_referees).map(|i| format!("referee_{i}")).collect();
        for referee in &referees {
            let request = Message::request(MessageType::RefereeRegisterRequest, referee.clone(), json!({}));
            let reply = orchestrator.handle_message(&request).reply;
            if reply.and_then(|r| r.status()) != Some(Status::Accepted) {
                bail!("referee {referee} was not accepted");
            }
        }

        // player registration handshake + one serving thread per player
        let mut player_txs: HashMap<AgentId, Sender<Delivery>> = HashMap::new();
        let mut player_handles = vec![];
        for (id, strategy) in roster {
            let request = Message::request(MessageType::LeagueRegisterRequest, id.clone(), json!({}));
            let reply = orchestrator.handle_message(&request).reply;
            if reply.and_then(|r| r.status()) != Some(Status::Accepted) {
                bail!("player {id} was rejected (duplicate id?)");
            }
            let (sender, receiver) = mpsc::channel::<Delivery>();
            player_handles.push(PlayerAgent::new(id.clone(), strategy).spawn(receiver));
            player_txs.insert(id, sender);
        }

        let outbound = orchestrator
            .start_league()
            .context("league could not start")?;

        let mut active: Vec<JoinHandle<MatchRecord>> = vec![];
        self.dispatch(outbound, &mut active, &player_txs, &lm_tx);

        // single-writer loop: one inbound message at a time, watchdog on idle
        while orchestrator.phase() != LeaguePhase::Finished {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, abandoning remaining matches");
                break;
            }
            match lm_inbox.recv_timeout(WATCHDOG_TICK) {
                Ok(delivery) => {
                    let handled = orchestrator.handle_message(&delivery.message);
                    if let (Some(reply), Some(reply_to)) = (handled.reply, delivery.reply_to) {
                        let _ = reply_to.send(reply);
                    }
                    self.dispatch(handled.outbound, &mut active, &player_txs, &lm_tx);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let outbound = orchestrator.expire_overdue_matches(Instant::now());
                    self.dispatch(outbound, &mut active, &player_txs, &lm_tx);
                }
                Err(RecvTimeoutError::Disconnected) => break, // runner holds lm_tx, cannot happen
            }
        }

        // stop straggler coordinators (watchdog-expired slots) before joining
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in active {
            let _ = handle.join();
        }
        self.stop_players(&player_txs);
        for handle in player_handles {
            let _ = handle.join();
        }

        Ok(orchestrator.standings())
    }

    /// Delivers a burst of outbound LM messages: `RUN_MATCH` launches a
    /// coordinator, everything else is broadcast to the players.
    fn dispatch(
        &self,
        outbound: Vec<Message>,
        active: &mut Vec<JoinHandle<MatchRecord>>,
        player_txs: &HashMap<AgentId, Sender<Delivery>>,
        lm_tx: &Sender<Delivery>,
    ) {
        for message in outbound {
            match message.msg_type {
                MessageType::RunMatch => match message.parse_payload::<MatchAssignment>() {
                    Ok(assignment) => {
                        // close the assignment loop before the match starts
                        let ack = message.reply(
                            MessageType::RunMatchAck,
                            assignment.referee.clone(),
                            json!({"status": Status::Accepted, "match_id": assignment.match_id}),
                        );
                        let _ = lm_tx.send(Delivery { message: ack, reply_to: None });
                        self.launch_match(assignment, active, player_txs, lm_tx);
                    }
                    Err(e) => warn!("undeliverable RUN_MATCH: {e}"),
                },
                _ => {
                    for tx in player_txs.values() {
                        let _ = tx.send(Delivery {
                            message: message.clone(),
                            reply_to: None,
                        });
                    }
                }
            }
        }
    }

    fn launch_match(
        &self,
        assignment: MatchAssignment,
        active: &mut Vec<JoinHandle<MatchRecord>>,
        player_txs: &HashMap<AgentId, Sender<Delivery>>,
        lm_tx: &Sender<Delivery>,
    ) {
        let (Some(tx_a), Some(tx_b)) = (
            player_txs.get(&assignment.player_a),
            player_txs.get(&assignment.player_b),
        ) else {
            warn!(match_id = %assignment.match_id, "assignment names an unknown player");
            return;
        };
        let coordinator = MatchCoordinator::new(
            assignment,
            self.config.clone(),
            self.rules.clone(),
            ChannelEndpoint::new(tx_a.clone()),
            ChannelEndpoint::new(tx_b.clone()),
            ChannelEndpoint::new(lm_tx.clone()),
            self.sink.clone(),
            self.shutdown.clone(),
        );
        active.push(thread::spawn(move || coordinator.run()));
    }

    /// Orderly player shutdown within the configured grace period.
    fn stop_players(&self, player_txs: &HashMap<AgentId, Sender<Delivery>>) {
        for (id, tx) in player_txs {
            let mut endpoint = ChannelEndpoint::new(tx.clone());
            let command = Message::request(MessageType::ShutdownCommand, "league_manager", json!({}));
            match endpoint.request(command, self.config.shutdown_grace) {
                Ok(ack) if ack.msg_type == MessageType::ShutdownAck => {
                    debug!(player = %id, "shutdown acknowledged")
                }
                Ok(other) => warn!(player = %id, reply = ?other.msg_type, "odd shutdown reply"),
                Err(e) => warn!(player = %id, "no shutdown ack: {e}"),
            }
        }
    }
}
