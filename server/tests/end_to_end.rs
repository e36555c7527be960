mod common;

use common::harness;
use pvp_server::{game::types::QueueKind, matchmaking::EnqueueOutcome};

#[tokio::test]
async fn queue_fight_settle_and_rank() {
    let h = harness();
    h.seed_elo(1, 1000).await;
    h.seed_elo(2, 1050).await;
    let b1 = h.beast(1);

    let a = h.state.queue.enqueue(1, b1.id, QueueKind::Ranked).await.unwrap();
    assert!(matches!(a, EnqueueOutcome::Queued(_)));
    // 2 arrives without the inline attempt and waits for the sweep
    h.park(2, QueueKind::Ranked, Some(1050), 20).await;

    let report = h.state.sweeper().run_cycle().await.unwrap();
    assert_eq!(report.ranked_matches, 1);
    let m = h.state.matches.history(1).await.unwrap().remove(0);
    assert!(m.is_participant(2));

    let done = h
        .state
        .matches
        .finish_reported_by(1, m.id, 2, 42)
        .await
        .unwrap();
    assert_eq!(done.duration_seconds, Some(42));
    assert_eq!(done.elo_change_of(2), Some(14));
    assert_eq!(done.elo_change_of(1), Some(-14));

    let board = h.state.rankings.leaderboard(1, 10).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!((board[0].rank, board[0].player_id), (1, 2));
    assert_eq!((board[0].elo, board[0].wins), (1064, 1));
    assert_eq!((board[1].player_id, board[1].elo, board[1].losses), (1, 986, 1));
    assert_eq!(h.state.rankings.player_rank(1, 1).await.unwrap(), Some(2));

    assert!(h.store.player_currency(2) > h.store.player_currency(1));
    assert_eq!(h.store.queue_len(), 0);
}
