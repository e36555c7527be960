mod common;

use chrono::{Duration, Utc};
use common::harness;
use pvp_server::{
    db::store::PvpStore,
    error::PvpError,
    game::types::{MatchType, QueueKind},
    matchmaking::EnqueueOutcome,
};
use std::collections::HashSet;

#[tokio::test]
async fn unowned_beast_is_rejected() {
    let h = harness();
    let beast = h.beast(2);
    let err = h
        .state
        .queue
        .enqueue(1, beast.id, QueueKind::Casual)
        .await
        .unwrap_err();
    assert!(matches!(err, PvpError::InvalidBeast));
    assert_eq!(h.store.queue_len(), 0);
}

#[tokio::test]
async fn second_join_is_already_queued() {
    let h = harness();
    let beast = h.beast(1);
    let first = h.state.queue.enqueue(1, beast.id, QueueKind::Casual).await;
    assert!(matches!(first, Ok(EnqueueOutcome::Queued(_))));

    let again = h.state.queue.enqueue(1, beast.id, QueueKind::Ranked).await;
    assert!(matches!(again, Err(PvpError::AlreadyQueued)));
    assert_eq!(h.store.queue_len(), 1);
}

#[tokio::test]
async fn leaving_is_idempotent() {
    let h = harness();
    let beast = h.beast(1);
    h.state
        .queue
        .enqueue(1, beast.id, QueueKind::Casual)
        .await
        .unwrap();

    assert!(h.state.queue.dequeue(1).await.unwrap());
    assert!(!h.state.queue.dequeue(1).await.unwrap());
    assert!(!h.state.queue.status(1).await.unwrap().in_queue);
}

#[tokio::test]
async fn status_reports_the_live_entry() {
    let h = harness();
    let idle = h.state.queue.status(1).await.unwrap();
    assert_eq!(idle.status, "idle");
    assert_eq!(idle.match_type, None);

    h.park(1, QueueKind::Ranked, Some(1000), 30).await;
    let queued = h.state.queue.status(1).await.unwrap();
    assert!(queued.in_queue);
    assert_eq!(queued.status, "queued");
    assert_eq!(queued.match_type, Some(QueueKind::Ranked));
    assert!(queued.waited_seconds.unwrap() >= 30);
}

#[tokio::test]
async fn ranked_entry_snapshots_current_elo() {
    let h = harness();
    h.seed_elo(1, 1337).await;
    let beast = h.beast(1);
    let EnqueueOutcome::Queued(entry) = h
        .state
        .queue
        .enqueue(1, beast.id, QueueKind::Ranked)
        .await
        .unwrap()
    else {
        panic!("nobody else is waiting");
    };
    assert_eq!(entry.elo_snapshot, Some(1337));
    assert!(entry.tier_snapshot.is_some());
    assert_eq!(entry.expires_at - entry.queued_at, Duration::minutes(5));
}

#[tokio::test]
async fn join_pairs_inline_when_someone_compatible_waits() {
    let h = harness();
    h.seed_elo(1, 1000).await;
    h.seed_elo(2, 1080).await;
    let m = h.matched(1, 2, QueueKind::Ranked).await;

    assert_eq!(m.match_type, MatchType::Ranked);
    assert!(m.is_participant(1) && m.is_participant(2));
    assert!(!m.is_finished());
    assert_eq!(h.store.queue_len(), 0);
}

#[tokio::test]
async fn ranked_players_far_apart_keep_waiting() {
    let h = harness();
    h.seed_elo(1, 1000).await;
    h.seed_elo(2, 1600).await;
    let (b1, b2) = (h.beast(1), h.beast(2));

    let a = h.state.queue.enqueue(1, b1.id, QueueKind::Ranked).await;
    let b = h.state.queue.enqueue(2, b2.id, QueueKind::Ranked).await;
    assert!(matches!(a, Ok(EnqueueOutcome::Queued(_))));
    assert!(matches!(b, Ok(EnqueueOutcome::Queued(_))));
    assert_eq!(h.store.queue_len(), 2);
}

#[tokio::test]
async fn ranked_and_casual_pools_do_not_mix() {
    let h = harness();
    h.park(1, QueueKind::Casual, None, 10).await;
    let beast = h.beast(2);
    let out = h
        .state
        .queue
        .enqueue(2, beast.id, QueueKind::Ranked)
        .await
        .unwrap();
    assert!(matches!(out, EnqueueOutcome::Queued(_)));
}

#[tokio::test]
async fn search_window_widens_in_steps() {
    let h = harness();
    let me = h.park(1, QueueKind::Ranked, Some(1000), 10).await;
    h.park(2, QueueKind::Ranked, Some(1230), 5).await;

    let found = h
        .state
        .queue
        .find_opponent(&me, &HashSet::new())
        .await
        .unwrap()
        .expect("within the widest window");
    assert_eq!(found.entry.player_id, 2);
    assert_eq!(found.window, Some(250));
}

#[tokio::test]
async fn closest_rating_wins_over_queue_order() {
    let h = harness();
    let me = h.park(1, QueueKind::Ranked, Some(1000), 30).await;
    h.park(2, QueueKind::Ranked, Some(1090), 20).await;
    h.park(3, QueueKind::Ranked, Some(960), 10).await;

    let found = h
        .state
        .queue
        .find_opponent(&me, &HashSet::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.entry.player_id, 3);
    assert_eq!(found.window, Some(100));
}

#[tokio::test]
async fn equal_distance_prefers_the_longer_wait() {
    let h = harness();
    let me = h.park(1, QueueKind::Ranked, Some(1000), 30).await;
    h.park(2, QueueKind::Ranked, Some(1050), 5).await;
    h.park(3, QueueKind::Ranked, Some(950), 20).await;

    let found = h
        .state
        .queue
        .find_opponent(&me, &HashSet::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.entry.player_id, 3);
}

#[tokio::test]
async fn excluded_players_are_skipped() {
    let h = harness();
    let me = h.park(1, QueueKind::Casual, None, 30).await;
    h.park(2, QueueKind::Casual, None, 20).await;
    h.park(3, QueueKind::Casual, None, 10).await;

    let exclude = HashSet::from([2]);
    let found = h
        .state
        .queue
        .find_opponent(&me, &exclude)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.entry.player_id, 3);
    assert_eq!(found.window, None);
}

#[tokio::test]
async fn expired_entries_are_invisible_and_purged() {
    let h = harness();
    h.park(1, QueueKind::Casual, None, 10).await;
    assert!(h.store.set_queue_expiry(1, Utc::now() - Duration::seconds(1)));

    // 1's entry is dead: 2 waits instead of pairing with it
    let beast = h.beast(2);
    let out = h
        .state
        .queue
        .enqueue(2, beast.id, QueueKind::Casual)
        .await
        .unwrap();
    assert!(matches!(out, EnqueueOutcome::Queued(_)));
    assert!(!h.state.queue.status(1).await.unwrap().in_queue);

    assert_eq!(h.state.queue.purge_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(h.store.queue_len(), 1);
}

#[tokio::test]
async fn an_expired_entry_does_not_block_rejoining() {
    let h = harness();
    h.park(1, QueueKind::Casual, None, 10).await;
    h.store.set_queue_expiry(1, Utc::now() - Duration::seconds(1));

    let beast = h.beast(1);
    let out = h.state.queue.enqueue(1, beast.id, QueueKind::Casual).await;
    assert!(matches!(out, Ok(EnqueueOutcome::Queued(_))));
    assert!(h.store.queue_entry(1, Utc::now()).await.unwrap().is_some());
}
