mod common;

use common::{drain, harness, snapshot, technique};
use pvp_server::{
    game::types::QueueKind,
    notify::ConnectionRegistry,
    protocol::{ClientMsg, ServerMsg},
    ws::index::dispatch,
};

fn ping() -> ServerMsg {
    ServerMsg::ChallengeDeclined { challenge_id: 1 }
}

#[test]
fn every_socket_of_a_player_gets_the_event() {
    let reg = ConnectionRegistry::new();
    let (_, mut a) = reg.register(7);
    let (_, mut b) = reg.register(7);
    let (_, mut other) = reg.register(8);

    assert_eq!(reg.notify(7, ping()), 2);
    assert_eq!(drain(&mut a), vec![ping()]);
    assert_eq!(drain(&mut b), vec![ping()]);
    assert!(drain(&mut other).is_empty());
}

#[test]
fn offline_players_are_skipped() {
    let reg = ConnectionRegistry::new();
    assert_eq!(reg.notify(7, ping()), 0);
    assert!(!reg.is_online(7));
}

#[test]
fn dead_sockets_are_pruned_on_delivery() {
    let reg = ConnectionRegistry::new();
    let (_, a) = reg.register(7);
    let (_, mut b) = reg.register(7);
    drop(a);

    assert_eq!(reg.notify(7, ping()), 1);
    assert_eq!(reg.connection_count(7), 1);
    assert_eq!(drain(&mut b).len(), 1);

    drop(b);
    assert_eq!(reg.notify(7, ping()), 0);
    assert!(!reg.is_online(7));
}

#[test]
fn unregister_removes_one_connection() {
    let reg = ConnectionRegistry::new();
    let (first, _rx1) = reg.register(7);
    let (_second, _rx2) = reg.register(7);

    assert!(reg.unregister(7, first));
    assert!(!reg.unregister(7, first));
    assert_eq!(reg.connection_count(7), 1);
}

#[test]
fn events_use_namespaced_tags() {
    let json = serde_json::to_value(ServerMsg::ChallengeAccepted {
        challenge_id: 3,
        match_id: 9,
    })
    .unwrap();
    assert_eq!(json["event"], "challenge:accepted");
    assert_eq!(json["matchId"], 9);

    let cmd: ClientMsg =
        serde_json::from_str(r#"{"event":"matchmaking:join","beastId":4,"matchType":"ranked"}"#)
            .unwrap();
    assert!(matches!(
        cmd,
        ClientMsg::Join {
            beast_id: 4,
            match_type: QueueKind::Ranked
        }
    ));
}

#[tokio::test]
async fn socket_commands_drive_the_queue_and_relay() {
    let h = harness();
    let b1 = h.beast(1);
    let b2 = h.beast(2);
    let (_, mut rx1) = h.state.notifier.register(1);
    let (_, mut rx2) = h.state.notifier.register(2);

    dispatch(
        &h.state,
        1,
        ClientMsg::Join {
            beast_id: b1.id,
            match_type: QueueKind::Casual,
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        drain(&mut rx1).as_slice(),
        [ServerMsg::QueueJoined { .. }]
    ));

    dispatch(
        &h.state,
        2,
        ClientMsg::Join {
            beast_id: b2.id,
            match_type: QueueKind::Casual,
        },
    )
    .await
    .unwrap();
    let match_id = drain(&mut rx2)
        .into_iter()
        .find_map(|m| match m {
            ServerMsg::MatchFound { match_id, .. } => Some(match_id),
            _ => None,
        })
        .expect("match found");
    drain(&mut rx1);

    dispatch(
        &h.state,
        2,
        ClientMsg::Action {
            match_id,
            action: technique("spore_burst"),
            beast_state: snapshot(b2.id),
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        drain(&mut rx1).as_slice(),
        [ServerMsg::MatchAction { from_player: 2, .. }]
    ));

    // leaving while not queued is fine
    dispatch(&h.state, 1, ClientMsg::Leave).await.unwrap();
}
