//! Player-side message loop.
//!
//! A player is just a mailbox loop: accept invitations, answer parity calls
//! through its [`ParityStrategy`], acknowledge shutdown, and answer anything
//! it does not understand with a `GAME_ERROR` reply. The decision algorithm
//! behind the strategy is deliberately outside the orchestration core.

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use serde_json::json;
use tracing::{debug, trace};

use crate::game::ParityStrategy;
use crate::protocol::{AgentId, MessageType, Status};
use crate::transport::Delivery;

/// One player agent, served on its own thread by [`PlayerAgent::spawn`].
pub struct PlayerAgent<S: ParityStrategy> {
    id: AgentId,
    strategy: S,
}

impl<S: ParityStrategy + 'static> PlayerAgent<S> {
    /// Creates a player with the given decision strategy.
    pub fn new(id: impl Into<AgentId>, strategy: S) -> Self {
        PlayerAgent {
            id: id.into(),
            strategy,
        }
    }

    /// Serves the mailbox on a new thread until shutdown or disconnect.
    pub fn spawn(self, mailbox: Receiver<Delivery>) -> JoinHandle<()> {
        thread::Builder::new()
            .name(format!("player-{}", self.id))
            .spawn(move || self.serve(mailbox))
            .expect("failed to spawn player thread")
    }

    /// Serves the mailbox until a `SHUTDOWN_COMMAND` arrives or every sender
    /// hangs up.
    pub fn serve(mut self, mailbox: Receiver<Delivery>) {
        while let Ok(delivery) = mailbox.recv() {
            let message = delivery.message;
            trace!(player = %self.id, msg_type = ?message.msg_type, "received");
            let reply = match message.msg_type {
                MessageType::GameInvitation => message.reply(
                    MessageType::GameJoinAck,
                    self.id.clone(),
                    json!({
                        "status": Status::Accepted,
                        "match_id": message.payload.get("match_id"),
                    }),
                ),
                MessageType::ChooseParityCall => {
                    let choice = self.strategy.choose();
                    message.reply(
                        MessageType::ChooseParityResponse,
                        self.id.clone(),
                        json!({
                            "match_id": message.payload.get("match_id"),
                            "choice": choice,
                        }),
                    )
                }
                MessageType::GameOver => {
                    debug!(player = %self.id, result = %message.payload, "game over");
                    continue;
                }
                // league broadcasts are informational for a player
                MessageType::RoundAnnouncement
                | MessageType::RoundCompleted
                | MessageType::LeagueCompleted
                | MessageType::LeagueStandingsUpdate
                | MessageType::LeagueStatus => {
                    trace!(player = %self.id, msg_type = ?message.msg_type, "league notice");
                    continue;
                }
                MessageType::ShutdownCommand => {
                    let ack = message.reply(
                        MessageType::ShutdownAck,
                        self.id.clone(),
                        json!({"status": Status::Acknowledged}),
                    );
                    if let Some(reply_to) = delivery.reply_to {
                        let _ = reply_to.send(ack);
                    }
                    return;
                }
                other => {
                    debug!(player = %self.id, ?other, "unhandled message type");
                    message.error_reply(MessageType::GameError, self.id.clone(), "not a player concern")
                }
            };
            if let Some(reply_to) = delivery.reply_to {
                // a dropped reply channel means the asker gave up waiting
                let _ = reply_to.send(reply);
            }
        }
    }
}
