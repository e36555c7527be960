mod common;

use chrono::{Duration, Utc};
use common::{harness, harness_with};
use pvp_server::{
    config::Settings,
    db::store::PvpStore,
    error::Outage,
    game::types::{MatchType, QueueKind},
    matchmaking::sweep::TickOutcome,
};

#[tokio::test]
async fn casual_pool_pairs_in_queue_order() {
    let h = harness();
    for (player, ago) in [(1, 40), (2, 30), (3, 20), (4, 10), (5, 5)] {
        h.park(player, QueueKind::Casual, None, ago).await;
    }

    let report = h.state.sweeper().run_cycle().await.unwrap();
    assert_eq!(report.casual_matches, 2);
    assert_eq!(report.ranked_matches, 0);

    let first = h.store.match_history(1, 10).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].is_participant(2));
    assert_eq!(first[0].match_type, MatchType::Casual);

    // odd one out keeps waiting
    assert!(h.state.queue.status(5).await.unwrap().in_queue);
    assert_eq!(h.store.queue_len(), 1);
}

#[tokio::test]
async fn each_player_is_matched_at_most_once_per_cycle() {
    let h = harness();
    h.park(1, QueueKind::Ranked, Some(1000), 40).await;
    h.park(2, QueueKind::Ranked, Some(1040), 30).await;
    h.park(3, QueueKind::Ranked, Some(1700), 20).await;
    h.park(4, QueueKind::Ranked, Some(1760), 10).await;

    let report = h.state.sweeper().run_cycle().await.unwrap();
    assert_eq!(report.ranked_matches, 2);

    for player in 1..=4 {
        let matches = h.store.match_history(player, 10).await.unwrap();
        assert_eq!(matches.len(), 1, "player {player}");
    }
    let low = &h.store.match_history(1, 10).await.unwrap()[0];
    assert!(low.is_participant(2));
    assert_eq!(h.store.queue_len(), 0);
}

#[tokio::test]
async fn ranked_outliers_stay_queued() {
    let h = harness();
    h.park(1, QueueKind::Ranked, Some(400), 20).await;
    h.park(2, QueueKind::Ranked, Some(2000), 10).await;

    let report = h.state.sweeper().run_cycle().await.unwrap();
    assert_eq!(report.ranked_matches, 0);
    assert_eq!(h.store.queue_len(), 2);
}

#[tokio::test]
async fn cycle_purges_and_expires_before_pairing() {
    let h = harness();
    h.park(1, QueueKind::Casual, None, 20).await;
    h.park(2, QueueKind::Casual, None, 10).await;
    h.store.set_queue_expiry(1, Utc::now() - Duration::seconds(1));

    let sender = h.beast(7);
    let c = h.state.challenges.send(7, 8, sender.id).await.unwrap();
    h.store
        .set_challenge_expiry(c.id, Utc::now() - Duration::seconds(1));

    let report = h.state.sweeper().run_cycle().await.unwrap();
    assert_eq!(report.purged, 1);
    assert_eq!(report.challenges_expired, 1);
    assert_eq!(report.casual_matches, 0);
    assert!(h.state.queue.status(2).await.unwrap().in_queue);
}

#[tokio::test]
async fn repeated_outages_pause_the_sweep() {
    let settings = Settings {
        sweep_max_failures: 2,
        ..Settings::default()
    };
    let h = harness_with(settings);
    let sweeper = h.state.sweeper();

    h.store.set_outage(Some(Outage::Connection));
    assert_eq!(sweeper.tick().await, TickOutcome::Failed);
    assert_eq!(sweeper.consecutive_failures(), 1);
    assert_eq!(sweeper.tick().await, TickOutcome::Paused);
    assert!(sweeper.is_paused());

    // still paused after the store recovers
    h.store.set_outage(None);
    assert_eq!(sweeper.tick().await, TickOutcome::Paused);
}

#[tokio::test]
async fn success_clears_the_failure_count() {
    let settings = Settings {
        sweep_max_failures: 2,
        ..Settings::default()
    };
    let h = harness_with(settings);
    let sweeper = h.state.sweeper();

    h.store.set_outage(Some(Outage::Timeout));
    assert_eq!(sweeper.tick().await, TickOutcome::Failed);
    h.store.set_outage(None);
    assert!(matches!(sweeper.tick().await, TickOutcome::Completed(_)));
    assert_eq!(sweeper.consecutive_failures(), 0);

    h.store.set_outage(Some(Outage::Timeout));
    assert_eq!(sweeper.tick().await, TickOutcome::Failed);
}

#[tokio::test]
async fn open_circuit_pauses_immediately() {
    let h = harness();
    let sweeper = h.state.sweeper();
    h.store.set_outage(Some(Outage::CircuitOpen));
    assert_eq!(sweeper.tick().await, TickOutcome::Paused);
    assert!(sweeper.is_paused());
}

#[tokio::test]
async fn a_zero_pause_resumes_on_the_next_tick() {
    let settings = Settings {
        sweep_pause: 0,
        ..Settings::default()
    };
    let h = harness_with(settings);
    let sweeper = h.state.sweeper();

    h.store.set_outage(Some(Outage::CircuitOpen));
    assert_eq!(sweeper.tick().await, TickOutcome::Paused);
    h.store.set_outage(None);
    assert!(matches!(sweeper.tick().await, TickOutcome::Completed(_)));
}
