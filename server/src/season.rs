//! The single active competitive season.
//!
//! Reads go through a short TTL cache. When the store cannot be reached the
//! last season seen is served even past its TTL, flagged as stale, so
//! matchmaking keeps running on an approximately-correct season identity.

use chrono::{DateTime, Months, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{
    db::{
        models::{Season, SeasonStatus},
        store::PvpStore,
    },
    error::{PvpError, PvpResult},
    game::rewards::{season_reward_for_rank, SeasonReward, SEASON_REWARD_RANKS},
    metrics,
};

pub fn season_name(number: i32) -> String {
    format!("Season {number}")
}

/// End date for a season starting at `start`.
pub fn season_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or(start + chrono::Duration::days(30))
}

/// Shape of `seasons.rewards_config` once the payout table is computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonRewardsConfig {
    pub computed_at: DateTime<Utc>,
    pub rewards: Vec<SeasonReward>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSeason {
    pub season: Season,
    /// Served from an expired cache because the store was unreachable.
    pub stale: bool,
}

struct CachedSeason {
    season: Season,
    fetched_at: Instant,
}

pub struct SeasonRegistry {
    store: Arc<dyn PvpStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedSeason>>,
    stale: AtomicBool,
}

impl SeasonRegistry {
    pub fn new(store: Arc<dyn PvpStore>, ttl: Duration) -> Self {
        SeasonRegistry {
            store,
            ttl,
            cache: RwLock::new(None),
            stale: AtomicBool::new(false),
        }
    }

    /// Whether the last answer came from a stale cache.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    fn mark_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::Relaxed);
        metrics::SEASON_CACHE_STALE.set(i64::from(stale));
    }

    fn fresh_cached(&self) -> Option<Season> {
        self.cache
            .read()
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .filter(|c| !c.season.has_expired(Utc::now()))
            .map(|c| c.season.clone())
    }

    fn any_cached(&self) -> Option<Season> {
        self.cache.read().as_ref().map(|c| c.season.clone())
    }

    pub async fn current_season(&self) -> PvpResult<CurrentSeason> {
        if let Some(season) = self.fresh_cached() {
            return Ok(CurrentSeason {
                season,
                stale: false,
            });
        }

        match self.load_current().await {
            Ok(season) => {
                *self.cache.write() = Some(CachedSeason {
                    season: season.clone(),
                    fetched_at: Instant::now(),
                });
                self.mark_stale(false);
                Ok(CurrentSeason {
                    season,
                    stale: false,
                })
            }
            Err(e) => match self.any_cached() {
                Some(season) => {
                    log::warn!(
                        "season lookup failed ({e}); serving cached season {}",
                        season.number
                    );
                    self.mark_stale(true);
                    Ok(CurrentSeason {
                        season,
                        stale: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Current season number, for callers that only need the identity.
    pub async fn current_number(&self) -> PvpResult<i32> {
        Ok(self.current_season().await?.season.number)
    }

    async fn load_current(&self) -> PvpResult<Season> {
        let now = Utc::now();
        match self.store.active_season().await? {
            None => {
                let season = self.store.open_season(None, now, season_end(now)).await?;
                log::info!("opened season {} ({})", season.number, season.name);
                Ok(season)
            }
            Some(expired) if expired.has_expired(now) => {
                let next = self
                    .store
                    .open_season(Some(expired.number), now, season_end(now))
                    .await?;
                self.invalidate();
                log::info!(
                    "season {} ended; season {} is now active",
                    expired.number,
                    next.number
                );
                if let Err(e) = self.end_of_season_rewards(expired.number).await {
                    log::warn!("end-of-season rewards for {} failed: {e}", expired.number);
                }
                Ok(next)
            }
            Some(active) => Ok(active),
        }
    }

    pub async fn season(&self, number: i32) -> PvpResult<Option<Season>> {
        self.store.season(number).await
    }

    /// Ranks the season's ladder and stores the payout table on the season.
    pub async fn end_of_season_rewards(&self, number: i32) -> PvpResult<Vec<SeasonReward>> {
        let ladder = self.store.leaderboard(number, SEASON_REWARD_RANKS).await?;
        let rewards: Vec<SeasonReward> = ladder
            .into_iter()
            .zip(1..)
            .filter_map(|(row, rank)| {
                season_reward_for_rank(rank).map(|currency| SeasonReward {
                    rank,
                    player_id: row.player_id,
                    currency,
                })
            })
            .collect();

        let config = SeasonRewardsConfig {
            computed_at: Utc::now(),
            rewards: rewards.clone(),
        };
        let value = serde_json::to_value(&config)
            .map_err(|e| PvpError::Store(format!("encoding season rewards: {e}")))?;
        self.store.set_season_rewards(number, value).await?;
        log::info!("season {number}: {} reward rows stored", rewards.len());
        Ok(rewards)
    }

    /// The payout table of an ended season, computing it on first request.
    pub async fn season_rewards(&self, number: i32) -> PvpResult<Vec<SeasonReward>> {
        let season = self
            .store
            .season(number)
            .await?
            .ok_or_else(|| PvpError::invalid_request("unknown season"))?;
        if season.status == SeasonStatus::Active {
            return Err(PvpError::invalid_request("season is still running"));
        }
        match serde_json::from_value::<SeasonRewardsConfig>(season.rewards_config) {
            Ok(config) => Ok(config.rewards),
            Err(_) => self.end_of_season_rewards(number).await,
        }
    }

    pub async fn player_season_reward(
        &self,
        number: i32,
        player_id: i64,
    ) -> PvpResult<Option<SeasonReward>> {
        Ok(self
            .season_rewards(number)
            .await?
            .into_iter()
            .find(|r| r.player_id == player_id))
    }
}
