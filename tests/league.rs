use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use parity_league::events::{EventSink, LeagueEvent, NullSink};
use parity_league::league::{LeagueOrchestrator, LeaguePhase};
use parity_league::player::PlayerAgent;
use parity_league::prelude::*;
use parity_league::protocol::{
    MatchAssignment, MatchRecord, MatchResult, Message, MessageType, Outcome, Status,
};
use parity_league::referee::MatchCoordinator;
use parity_league::transport::{ChannelEndpoint, Delivery};
use serde_json::json;

fn fast_config() -> LeagueConfig {
    LeagueConfig::new()
        .with_timeout(TimeoutKey::GameJoinAck, Duration::from_millis(200))
        .with_timeout(TimeoutKey::ParityChoice, Duration::from_millis(200))
        .with_timeout(TimeoutKey::HttpRequest, Duration::from_millis(200))
        .with_shutdown_grace(Duration::from_millis(200))
}

/// Sink capturing round/league lifecycle events in emission order.
struct LifecycleSink(Mutex<Vec<String>>);

impl EventSink for LifecycleSink {
    fn emit(&self, event: &LeagueEvent) {
        let name = match event {
            LeagueEvent::RoundCompleted { round_num } => format!("round_completed:{round_num}"),
            LeagueEvent::LeagueCompleted => "league_completed".to_string(),
            _ => return,
        };
        self.0.lock().unwrap().push(name);
    }
}

#[test]
fn full_round_robin_league() {
    // drawn value is always even, so EVEN callers beat ODD callers and
    // same-call pairings draw
    let runner = LeagueRunner::new(fast_config())
        .with_rules(Arc::new(ParityRules::new(2, 2)))
        .with_referees(2);
    let roster: Vec<(String, Box<dyn ParityStrategy>)> = vec![
        ("alice".into(), Box::new(FixedParity(Parity::Even))),
        ("bob".into(), Box::new(FixedParity(Parity::Odd))),
        ("carol".into(), Box::new(FixedParity(Parity::Even))),
        ("dave".into(), Box::new(FixedParity(Parity::Odd))),
    ];

    let standings = runner.run(roster).unwrap();

    // 4 players, 3 rounds, 6 matches: EVEN callers win twice and draw once
    assert_eq!(standings.len(), 4);
    let by_id = |id: &str| standings.iter().find(|e| e.agent_id == id).unwrap().clone();
    for id in ["alice", "carol"] {
        let entry = by_id(id);
        assert_eq!((entry.wins, entry.draws, entry.losses), (2, 1, 0), "{id}");
        assert_eq!(entry.points, 7, "{id}");
    }
    for id in ["bob", "dave"] {
        let entry = by_id(id);
        assert_eq!((entry.wins, entry.draws, entry.losses), (0, 1, 2), "{id}");
        assert_eq!(entry.points, 1, "{id}");
    }
    // deterministic ordering: points desc, wins desc, id asc
    assert_eq!(standings[0].agent_id, "alice");
    assert_eq!(standings[1].agent_id, "carol");
}

#[test]
fn rounds_complete_in_order_and_league_completes_once() {
    let sink = Arc::new(LifecycleSink(Mutex::new(vec![])));
    let runner = LeagueRunner::new(fast_config()).with_sink(sink.clone());
    let roster: Vec<(String, Box<dyn ParityStrategy>)> = vec![
        ("alice".into(), Box::new(RandomParity)),
        ("bob".into(), Box::new(RandomParity)),
        ("carol".into(), Box::new(RandomParity)),
    ];

    runner.run(roster).unwrap();

    // 3 players: 3 rounds (one bye each), every completion exactly once,
    // league completion strictly last
    let events = sink.0.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "round_completed:1",
            "round_completed:2",
            "round_completed:3",
            "league_completed",
        ]
    );
}

#[test]
fn one_round_two_matches_standings() {
    // smallest interesting round: two match slots, one win and one draw
    let mut lm = LeagueOrchestrator::new(
        "league_1",
        "parity_guess",
        fast_config(),
        Arc::new(NullSink),
    );
    lm.register_referee(&"referee_1".to_string()).unwrap();
    for p in ["alice", "bob", "carol", "dave"] {
        lm.register_player(&p.to_string()).unwrap();
    }
    let outbound = lm.start_league().unwrap();
    let assignments: Vec<MatchAssignment> = outbound
        .iter()
        .filter(|m| m.msg_type == MessageType::RunMatch)
        .map(|m| m.parse_payload().unwrap())
        .collect();
    assert_eq!(assignments.len(), 2);

    let report = |assignment: &MatchAssignment, winner: Outcome, choice_b: Parity| {
        Message::request(
            MessageType::MatchResultReport,
            assignment.referee.clone(),
            serde_json::to_value(MatchResult {
                match_id: assignment.match_id.clone(),
                round_num: assignment.round_num,
                player_a: assignment.player_a.clone(),
                player_b: assignment.player_b.clone(),
                winner,
                player_a_choice: Some(Parity::Even),
                player_b_choice: Some(choice_b),
                drawn_value: Some(2),
            })
            .unwrap(),
        )
    };

    lm.handle_message(&report(&assignments[0], Outcome::PlayerA, Parity::Odd));
    lm.handle_message(&report(&assignments[1], Outcome::Draw, Parity::Even));

    // this was round 1 of 3 for four players; standings after round one
    let standings = lm.standings();
    let by_id = |id: &str| standings.iter().find(|e| e.agent_id == id).unwrap().clone();
    assert_eq!(by_id(&assignments[0].player_a).points, 3);
    assert_eq!(by_id(&assignments[0].player_b).points, 0);
    assert_eq!(by_id(&assignments[1].player_a).points, 1);
    assert_eq!(by_id(&assignments[1].player_b).points, 1);
}

#[test]
fn unresponsive_player_forfeits_instead_of_hanging() {
    let assignment = MatchAssignment {
        match_id: "R1M1".into(),
        round_num: 1,
        game_id: "parity_guess".into(),
        player_a: "alice".into(),
        player_b: "bob".into(),
        referee: "referee_1".into(),
    };

    // alice is a real player; bob joins, then never answers the parity call
    let (alice_tx, alice_rx) = mpsc::channel::<Delivery>();
    let _alice = PlayerAgent::new("alice", FixedParity(Parity::Odd)).spawn(alice_rx);
    let (bob_tx, bob_rx) = mpsc::channel::<Delivery>();
    thread::spawn(move || {
        while let Ok(delivery) = bob_rx.recv() {
            if delivery.message.msg_type == MessageType::GameInvitation {
                let ack = delivery.message.reply(
                    MessageType::GameJoinAck,
                    "bob",
                    json!({"status": Status::Accepted}),
                );
                delivery.reply_to.unwrap().send(ack).unwrap();
            }
        }
    });

    // an LM that just acks the report
    let (lm_tx, lm_rx) = mpsc::channel::<Delivery>();
    thread::spawn(move || {
        while let Ok(delivery) = lm_rx.recv() {
            if delivery.message.msg_type == MessageType::MatchResultReport {
                let ack = delivery.message.reply(
                    MessageType::MatchResultAck,
                    "league_manager",
                    json!({"status": Status::Recorded}),
                );
                let _ = delivery.reply_to.unwrap().send(ack);
            }
        }
    });

    let started = Instant::now();
    let record = MatchCoordinator::new(
        assignment,
        fast_config(),
        Arc::new(ParityRules::new(1, 100)),
        ChannelEndpoint::new(alice_tx),
        ChannelEndpoint::new(bob_tx),
        ChannelEndpoint::new(lm_tx),
        Arc::new(NullSink),
        Arc::new(AtomicBool::new(false)),
    )
    .run();

    let MatchRecord::Completed(result) = record else {
        panic!("forfeit must complete the match");
    };
    assert_eq!(result.winner, Outcome::PlayerA);
    assert_eq!(result.player_b_choice, None);
    // bounded by the configured timeouts, not an indefinite hang
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn retried_report_is_recognized_and_not_double_counted() {
    let mut lm = LeagueOrchestrator::new(
        "league_1",
        "parity_guess",
        fast_config(),
        Arc::new(NullSink),
    );
    lm.register_referee(&"referee_1".to_string()).unwrap();
    lm.register_player(&"alice".to_string()).unwrap();
    lm.register_player(&"bob".to_string()).unwrap();
    let outbound = lm.start_league().unwrap();
    let assignment: MatchAssignment = outbound
        .iter()
        .find(|m| m.msg_type == MessageType::RunMatch)
        .unwrap()
        .parse_payload()
        .unwrap();

    // real players, a real coordinator, and an LM inbox where the first
    // MATCH_RESULT_ACK gets lost on the way back
    let (alice_tx, alice_rx) = mpsc::channel::<Delivery>();
    let _alice = PlayerAgent::new("alice", FixedParity(Parity::Even)).spawn(alice_rx);
    let (bob_tx, bob_rx) = mpsc::channel::<Delivery>();
    let _bob = PlayerAgent::new("bob", FixedParity(Parity::Odd)).spawn(bob_rx);
    let (lm_tx, lm_rx) = mpsc::channel::<Delivery>();

    let coordinator = thread::spawn(move || {
        MatchCoordinator::new(
            assignment,
            fast_config(),
            Arc::new(ParityRules::new(2, 2)),
            ChannelEndpoint::new(alice_tx),
            ChannelEndpoint::new(bob_tx),
            ChannelEndpoint::new(lm_tx),
            Arc::new(NullSink),
            Arc::new(AtomicBool::new(false)),
        )
        .run()
    });

    let mut reports = 0;
    let mut ack_statuses = vec![];
    loop {
        let delivery = match lm_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(delivery) => delivery,
            Err(RecvTimeoutError::Timeout) => panic!("coordinator never retried"),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if delivery.message.msg_type == MessageType::MatchResultReport {
            reports += 1;
        }
        let handled = lm.handle_message(&delivery.message);
        if let (Some(reply), Some(reply_to)) = (handled.reply, delivery.reply_to) {
            ack_statuses.push(reply.status());
            if reports == 1 {
                continue; // drop the first ack, forcing a retry
            }
            let _ = reply_to.send(reply);
            break;
        }
    }

    let record = coordinator.join().unwrap();
    assert!(matches!(record, MatchRecord::Completed(_)));
    assert_eq!(lm.phase(), LeaguePhase::Finished);
    assert_eq!(reports, 2, "the lost ack must cause exactly one retry");
    assert_eq!(
        ack_statuses,
        vec![Some(Status::Recorded), Some(Status::Acknowledged)]
    );
    // one match in the books, not two
    let standings = lm.standings();
    let total_matches: u32 = standings.iter().map(|e| e.wins + e.draws + e.losses).sum();
    assert_eq!(total_matches, 2); // two players, one match each
}
