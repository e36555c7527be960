mod common;

use chrono::{Duration, Utc};
use common::{harness, harness_with, season};
use pvp_server::{
    config::Settings,
    db::{memory_store::MemoryStore, models::SeasonStatus, store::PvpStore},
    error::{Outage, PvpError},
    season::SeasonRegistry,
};
use std::sync::Arc;

fn expired_season_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut old = season(1, 0);
    old.start_date = Utc::now() - Duration::days(31);
    old.end_date = Utc::now() - Duration::hours(1);
    store.insert_season(old);
    store
}

#[tokio::test]
async fn first_lookup_opens_season_one() {
    let store = Arc::new(MemoryStore::new());
    let seasons = SeasonRegistry::new(store.clone(), std::time::Duration::from_secs(30));

    let current = seasons.current_season().await.unwrap();
    assert_eq!(current.season.number, 1);
    assert_eq!(current.season.status, SeasonStatus::Active);
    assert!(!current.stale);
    assert!(current.season.end_date > current.season.start_date);
}

#[tokio::test]
async fn expired_season_rolls_over_to_the_next() {
    let store = expired_season_store();
    store.get_or_create_ranking(10, 1, 1400).await.unwrap();
    store.get_or_create_ranking(11, 1, 900).await.unwrap();
    let seasons = SeasonRegistry::new(store.clone(), std::time::Duration::from_secs(30));

    assert_eq!(seasons.current_number().await.unwrap(), 2);
    assert_eq!(seasons.current_number().await.unwrap(), 2);

    let old = store.season(1).await.unwrap().unwrap();
    assert_eq!(old.status, SeasonStatus::Ended);
    let active = store.active_season().await.unwrap().unwrap();
    assert_eq!(active.number, 2);
    assert_eq!(active.name, "Season 2");

    // payout table written for the season that ended
    let rewards = seasons.season_rewards(1).await.unwrap();
    assert_eq!(rewards.len(), 2);
    assert_eq!((rewards[0].player_id, rewards[0].currency), (10, 5000));
    assert_eq!((rewards[1].player_id, rewards[1].currency), (11, 4750));
    assert!(!old.rewards_config.is_null());
}

#[tokio::test]
async fn concurrent_rollovers_leave_one_active_season() {
    let store = expired_season_store();
    let a = SeasonRegistry::new(store.clone(), std::time::Duration::from_secs(30));
    let b = SeasonRegistry::new(store.clone(), std::time::Duration::from_secs(30));

    let (x, y) = tokio::join!(a.current_number(), b.current_number());
    assert_eq!(x.unwrap(), 2);
    assert_eq!(y.unwrap(), 2);
    assert!(store.season(3).await.unwrap().is_none());
}

#[tokio::test]
async fn outage_serves_the_cached_season_as_stale() {
    let h = harness_with(Settings {
        season_cache_ttl: 0,
        ..Settings::default()
    });
    let fresh = h.state.seasons.current_season().await.unwrap();
    assert!(!fresh.stale);

    h.store.set_outage(Some(Outage::Connection));
    let stale = h.state.seasons.current_season().await.unwrap();
    assert!(stale.stale);
    assert_eq!(stale.season.number, 1);
    assert!(h.state.seasons.is_stale());

    h.store.set_outage(None);
    assert!(!h.state.seasons.current_season().await.unwrap().stale);
    assert!(!h.state.seasons.is_stale());
}

#[tokio::test]
async fn outage_without_a_cache_is_an_error() {
    let h = harness();
    h.store.set_outage(Some(Outage::Timeout));
    let err = h.state.seasons.current_season().await.unwrap_err();
    assert!(matches!(err, PvpError::StoreUnavailable(Outage::Timeout)));
}

#[tokio::test]
async fn fresh_cache_skips_the_store() {
    let h = harness();
    h.state.seasons.current_season().await.unwrap();
    h.store.set_outage(Some(Outage::Connection));
    let cached = h.state.seasons.current_season().await.unwrap();
    assert!(!cached.stale);
}

#[tokio::test]
async fn rewards_of_a_running_season_are_refused() {
    let h = harness();
    let err = h.state.seasons.season_rewards(1).await.unwrap_err();
    assert!(matches!(err, PvpError::InvalidRequest(_)));
    let err = h.state.seasons.season_rewards(42).await.unwrap_err();
    assert!(matches!(err, PvpError::InvalidRequest(_)));
}

#[tokio::test]
async fn player_reward_lookup() {
    let store = expired_season_store();
    store.get_or_create_ranking(10, 1, 1400).await.unwrap();
    let seasons = SeasonRegistry::new(store.clone(), std::time::Duration::from_secs(30));
    seasons.current_number().await.unwrap();

    let mine = seasons.player_season_reward(1, 10).await.unwrap().unwrap();
    assert_eq!(mine.rank, 1);
    assert!(seasons.player_season_reward(1, 99).await.unwrap().is_none());
}
