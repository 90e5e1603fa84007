//! Transport seam between the orchestration core and the outside world.
//!
//! The core only ever talks through [`Endpoint`]: a bounded request/response
//! exchange plus a fire-and-forget notify. Any delivery fabric that offers
//! at-least-once delivery with correlation-id duplicate detection can sit
//! behind it; [`ChannelEndpoint`] is the in-process binding used by the
//! runner and the tests.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::protocol::Message;

/// One inbound delivery on an agent's mailbox.
///
/// `reply_to` is present for request-type messages and absent for
/// fire-and-forget notifications.
#[derive(Debug)]
pub struct Delivery {
    /// The delivered message.
    pub message: Message,
    /// Where the response must go, if one is expected.
    pub reply_to: Option<Sender<Message>>,
}

/// A channel an agent can be reached on.
pub trait Endpoint: Send {
    /// Sends `msg` and waits for the correlated response within `timeout`.
    fn request(&mut self, msg: Message, timeout: Duration) -> anyhow::Result<Message>;

    /// Sends `msg` without waiting for anything.
    fn notify(&mut self, msg: Message) -> anyhow::Result<()>;
}

/// In-process endpoint backed by std mpsc channels.
///
/// Each request opens a dedicated reply channel, so late responses to an
/// earlier (timed-out) request can never be mistaken for the current one.
#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    peer: Sender<Delivery>,
}

impl ChannelEndpoint {
    /// Endpoint delivering into `peer`'s mailbox.
    pub fn new(peer: Sender<Delivery>) -> Self {
        ChannelEndpoint { peer }
    }

    /// Creates a mailbox and an endpoint pointing at it.
    pub fn mailbox() -> (ChannelEndpoint, Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel();
        (ChannelEndpoint::new(tx), rx)
    }
}

impl Endpoint for ChannelEndpoint {
    fn request(&mut self, msg: Message, timeout: Duration) -> anyhow::Result<Message> {
        let correlation_id = msg.correlation_id;
        let (reply_tx, reply_rx) = mpsc::channel();
        self.peer
            .send(Delivery {
                message: msg,
                reply_to: Some(reply_tx),
            })
            .map_err(|_| anyhow!("peer mailbox closed"))?;

        let response = match reply_rx.recv_timeout(timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => return Err(anyhow!("no response within {timeout:?}")),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("peer dropped the request without responding"))
            }
        };
        if response.correlation_id != correlation_id {
            return Err(anyhow!(
                "response correlation mismatch: expected {correlation_id}, got {}",
                response.correlation_id
            ));
        }
        Ok(response)
    }

    fn notify(&mut self, msg: Message) -> anyhow::Result<()> {
        self.peer
            .send(Delivery {
                message: msg,
                reply_to: None,
            })
            .map_err(|_| anyhow!("peer mailbox closed"))
            .context("notify failed")
    }
}

#[cfg(test)]
mod transport_tests {
    use std::thread;

    use super::*;
    use crate::protocol::{MessageType, Status};

    #[test]
    fn request_gets_the_correlated_reply() {
        let (mut endpoint, mailbox) = ChannelEndpoint::mailbox();
        let server = thread::spawn(move || {
            let delivery = mailbox.recv().unwrap();
            let reply = delivery.message.reply(
                MessageType::GameJoinAck,
                "player_1",
                serde_json::json!({"status": Status::Accepted}),
            );
            delivery.reply_to.unwrap().send(reply).unwrap();
        });

        let request = Message::request(MessageType::GameInvitation, "referee_1", serde_json::json!({}));
        let response = endpoint.request(request, Duration::from_secs(1)).unwrap();
        assert_eq!(response.msg_type, MessageType::GameJoinAck);
        assert_eq!(response.status(), Some(Status::Accepted));
        server.join().unwrap();
    }

    #[test]
    fn silent_peer_times_out() {
        let (mut endpoint, mailbox) = ChannelEndpoint::mailbox();
        let request = Message::request(MessageType::GameInvitation, "referee_1", serde_json::json!({}));
        let err = endpoint.request(request, Duration::from_millis(20)).unwrap_err();
        assert!(err.to_string().contains("no response"), "{err}");
        drop(mailbox);
    }

    #[test]
    fn mismatched_correlation_is_rejected() {
        let (mut endpoint, mailbox) = ChannelEndpoint::mailbox();
        let server = thread::spawn(move || {
            let delivery = mailbox.recv().unwrap();
            // a reply belonging to some other exchange
            let stray = Message::request(
                MessageType::GameJoinAck,
                "player_1",
                serde_json::json!({"status": Status::Accepted}),
            );
            delivery.reply_to.unwrap().send(stray).unwrap();
        });
        let request = Message::request(MessageType::GameInvitation, "referee_1", serde_json::json!({}));
        let err = endpoint.request(request, Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("correlation mismatch"), "{err}");
        server.join().unwrap();
    }

    #[test]
    fn notify_does_not_block_on_missing_reply() {
        let (mut endpoint, mailbox) = ChannelEndpoint::mailbox();
        let note = Message::request(MessageType::GameOver, "referee_1", serde_json::json!({}));
        endpoint.notify(note).unwrap();
        let delivery = mailbox.recv().unwrap();
        assert!(delivery.reply_to.is_none());
    }
}
