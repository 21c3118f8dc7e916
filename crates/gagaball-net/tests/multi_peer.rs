#[allow(dead_code)]
mod common;

use std::time::Duration;

use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use common::{DT, TestRoom, run_until_ended};
use gagaball_core::test_helpers::RecordingProgression;
use gagaball_net::SessionEvent;
use gagaball_sim::PlayerIntent;
use gagaball_sim::lifecycle::{EndReason, MatchOutcome, MatchPhase};

#[tokio::test]
async fn lobby_events_reach_subscribers() {
    let mut room = TestRoom::new();
    let stream = BroadcastStream::new(room.host.events().subscribe());

    room.join();
    room.join();
    room.clients[0].set_ready(true);
    room.pump();
    room.host.start_match(9, 1).unwrap();

    let events: Vec<SessionEvent> = tokio::time::timeout(
        Duration::from_secs(1),
        stream.take(4).map(|e| e.unwrap()).collect::<Vec<_>>(),
    )
    .await
    .expect("events delivered");

    assert!(matches!(&events[0], SessionEvent::PlayerJoined(p) if p.id == 2));
    assert!(matches!(&events[1], SessionEvent::PlayerJoined(p) if p.id == 3));
    assert_eq!(
        events[2],
        SessionEvent::ReadyChanged {
            player_id: 2,
            ready: true
        }
    );
    assert!(matches!(&events[3], SessionEvent::MatchStarted(m) if m.seed == 9 && m.ai_opponents == 1));
}

#[tokio::test]
async fn full_match_ends_everywhere_and_settles_once() {
    let room = TestRoom::with_clients(2);
    let (mut host, mut clients) = room.start(2024, 3);

    // 45 s round plus the ending delay, with headroom.
    let ticks = run_until_ended(&mut host, &mut clients, 60 * 50);
    assert!(ticks < 60 * 50, "every peer reaches ENDED");

    for peer in std::iter::once(&mut host).chain(clients.iter_mut()) {
        let mut store = RecordingProgression::default();
        assert!(peer.settle(&mut store));
        assert!(!peer.settle(&mut store));
        assert_eq!(store.wins() + store.losses(), 1);
        let report = peer.report().unwrap();
        assert_eq!(store.coins, report.total_coins());
    }
}

#[tokio::test]
async fn eliminations_converge_across_peers() {
    let room = TestRoom::with_clients(2);
    let (mut host, mut clients) = room.start(5, 2);
    let idle = PlayerIntent::default();

    assert!(clients[0].session_mut().report_elimination(1001));
    host.tick(DT, &idle);
    clients[1].tick(DT, &idle);

    for peer in [&host, &clients[1]] {
        let state = peer.sim().state();
        assert!(!state.player(1001).unwrap().alive);
        assert_eq!(state.elimination_count, 1);
    }
    // Already known, so not reported again.
    assert!(!clients[1].session_mut().report_elimination(1001));
}

#[tokio::test]
async fn client_leaving_mid_match_is_not_fatal() {
    let room = TestRoom::with_clients(2);
    let (mut host, mut clients) = room.start(11, 1);
    let idle = PlayerIntent::default();
    host.tick(DT, &idle);

    let leaver = clients.remove(0);
    drop(leaver);

    host.tick(DT, &idle);
    clients[0].tick(DT, &idle);

    assert!(host.sim().state().player(2).unwrap().departed);
    assert!(clients[0].sim().state().player(2).unwrap().departed);
    assert!(matches!(host.sim().phase(), MatchPhase::Running));
    assert!(matches!(clients[0].sim().phase(), MatchPhase::Running));
    assert_eq!(host.sim().state().elimination_count, 0);
}

#[tokio::test]
async fn host_leaving_ends_every_client_with_a_loss() {
    let room = TestRoom::with_clients(2);
    let (host, mut clients) = room.start(3, 0);
    drop(host);

    for client in &mut clients {
        client.tick(DT, &PlayerIntent::default());
        assert!(client.session().is_host_lost());
        match client.sim().phase() {
            MatchPhase::Ending { outcome, reason, .. } => {
                assert_eq!(outcome, MatchOutcome::Lost);
                assert_eq!(reason, EndReason::HostLost);
            },
            other => panic!("Expected Ending, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn host_declared_winner_overrides_client_view() {
    let room = TestRoom::with_clients(1);
    let (mut host, mut clients) = room.start(8, 0);
    host.tick(DT, &PlayerIntent::default());
    host.session_mut()
        .declare_match_over(gagaball_core::net::messages::MatchOverMsg {
            winner_id: Some(1),
            elimination_count: 0,
            duration_secs: 0.5,
        })
        .unwrap();

    clients[0].tick(DT, &PlayerIntent::default());
    match clients[0].sim().phase() {
        MatchPhase::Ending { outcome, reason, .. } => {
            assert_eq!(outcome, MatchOutcome::Lost);
            assert_eq!(reason, EndReason::HostDeclared);
        },
        other => panic!("Expected Ending, got: {other:?}"),
    }
}
