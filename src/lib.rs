//! # Parity League
//!
//! Round-robin league orchestration for autonomous game-playing agents: a
//! League Manager schedules rounds and pairings, Referees drive individual
//! matches, and Players answer game calls, all over a typed message
//! protocol with correlation ids, bounded timeouts, and idempotent result
//! recording.
//!
//! It provides:
//! - The wire contract ([`protocol`]): message types, status codes, timeout
//!   keys, and the envelope every agent exchanges
//! - The League Manager's single-writer state machine
//!   ([`league::LeagueOrchestrator`]) with count-based round completion and
//!   `match_id` deduplication
//! - The per-match Referee state machine ([`referee::MatchCoordinator`]):
//!   invite, collect choices, resolve, report with bounded retries
//! - Pure standings aggregation ([`standings`]) with deterministic ordering
//! - An in-process runner ([`server::LeagueRunner`]) that wires all agents
//!   over channel endpoints for tests and demos
//!
//! Each match runs on its own thread; the only shared state between a
//! coordinator and the League Manager is the message protocol itself. Every
//! wait is bounded by a named timeout ([`protocol::TimeoutKey`]), and a
//! player that stops answering forfeits instead of hanging its match. A
//! watchdog writes off match slots that never report, so a round always
//! completes.
//!
//! # Documentation Overview
//!
//! - For the end-to-end execution loop, see the [`server`] module.
//! - For configuring timeouts, retries, and the watchdog, see
//!   [`LeagueConfig`](crate::configuration::LeagueConfig).
//! - To understand round bookkeeping and completion, see [`round_tracker`]
//!   and [`schedule`].
//! - For plugging in another game or decision strategy, check out the
//!   [`GameRules`](crate::game::GameRules) and
//!   [`ParityStrategy`](crate::game::ParityStrategy) traits.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use parity_league::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LeagueConfig::new()
//!         .with_timeout(TimeoutKey::ParityChoice, Duration::from_millis(500))
//!         .with_report_retry_limit(3);
//!
//!     let runner = LeagueRunner::new(config).with_referees(2);
//!
//!     let roster: Vec<(String, Box<dyn ParityStrategy>)> = vec![
//!         ("alice".into(), Box::new(RandomParity)),
//!         ("bob".into(), Box::new(RandomParity)),
//!         ("carol".into(), Box::new(FixedParity(Parity::Even))),
//!     ];
//!
//!     let standings = runner.run(roster)?;
//!     for entry in standings {
//!         println!(
//!             "{}: {} pts ({}W {}D {}L)",
//!             entry.agent_id, entry.points, entry.wins, entry.draws, entry.losses
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Protocol Requirements
//!
//! - Transport is pluggable through [`transport::Endpoint`]; the core only
//!   needs at-least-once delivery plus duplicate detection by
//!   `correlation_id`/`match_id`
//! - Every request-type message gets exactly one correlated response; unknown
//!   message types are answered with an error status, never dropped
//! - A retried `MATCH_RESULT_REPORT` keeps its correlation id, and the LM
//!   re-acknowledges duplicates without double-counting
#![warn(missing_docs)]

pub mod configuration;
pub mod error;
pub mod events;
pub mod game;
pub mod league;
mod logger;
pub mod player;
pub mod protocol;
pub mod referee;
pub mod round_tracker;
pub mod schedule;
pub mod server;
pub mod standings;
pub mod transport;

pub use anyhow;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use parity_league::prelude::*;
/// ```
///
/// Includes:
/// - [`LeagueConfig`](crate::configuration::LeagueConfig)
/// - [`LeagueRunner`](crate::server::LeagueRunner)
/// - the [`GameRules`](crate::game::GameRules) and
///   [`ParityStrategy`](crate::game::ParityStrategy) seams with their
///   built-in implementations
/// - the wire vocabulary most callers touch ([`Parity`](crate::protocol::Parity),
///   [`TimeoutKey`](crate::protocol::TimeoutKey))
pub mod prelude {
    pub use crate::configuration::LeagueConfig;
    pub use crate::game::{FixedParity, GameRules, ParityRules, ParityStrategy, RandomParity};
    pub use crate::protocol::{Parity, TimeoutKey};
    pub use crate::server::LeagueRunner;
    pub use crate::standings::StandingsEntry;
}
