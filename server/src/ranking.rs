//! Per-season ladder: lazy row creation, result application, leaderboard.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    db::{models::PlayerRanking, store::PvpStore},
    error::PvpResult,
    game::{scoring, tier::tier_for, tier::Tier},
};

/// A fresh row at `starting_elo`.
pub fn new_ranking(player_id: i64, season_number: i32, starting_elo: i32) -> PlayerRanking {
    let elo = starting_elo.max(0);
    let (tier, division) = tier_for(elo);
    PlayerRanking {
        player_id,
        season_number,
        elo,
        tier,
        division,
        wins: 0,
        losses: 0,
        win_streak: 0,
        peak_elo: elo,
        peak_tier: tier,
    }
}

/// `(winner_delta, loser_delta)` under the logistic model.
pub fn compute_elo_delta(winner_elo: i32, loser_elo: i32, k: f64) -> (i32, i32) {
    scoring::elo_delta(winner_elo, loser_elo, k)
}

/// The row after one decided game. Stores call this inside the settlement
/// transaction, on the row they have locked.
pub fn apply_result(current: &PlayerRanking, delta: i32, won: bool) -> PlayerRanking {
    let elo = current.elo.saturating_add(delta).max(0);
    let (tier, division) = tier_for(elo);
    let mut next = PlayerRanking {
        elo,
        tier,
        division,
        ..current.clone()
    };
    if won {
        next.wins += 1;
        next.win_streak += 1;
    } else {
        next.losses += 1;
        next.win_streak = 0;
    }
    if elo > next.peak_elo {
        next.peak_elo = elo;
    }
    if tier > next.peak_tier {
        next.peak_tier = tier;
    }
    next
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub player_id: i64,
    pub elo: i32,
    pub tier: Tier,
    pub division: Option<i32>,
    pub wins: i32,
    pub losses: i32,
    pub win_streak: i32,
}

pub struct RankingEngine {
    store: Arc<dyn PvpStore>,
    starting_elo: i32,
}

impl RankingEngine {
    pub fn new(store: Arc<dyn PvpStore>, starting_elo: i32) -> Self {
        RankingEngine {
            store,
            starting_elo,
        }
    }

    pub fn starting_elo(&self) -> i32 {
        self.starting_elo
    }

    pub async fn get_or_create_ranking(
        &self,
        player_id: i64,
        season_number: i32,
    ) -> PvpResult<PlayerRanking> {
        self.store
            .get_or_create_ranking(player_id, season_number, self.starting_elo)
            .await
    }

    pub async fn ranking(
        &self,
        player_id: i64,
        season_number: i32,
    ) -> PvpResult<Option<PlayerRanking>> {
        self.store.ranking(player_id, season_number).await
    }

    pub async fn leaderboard(
        &self,
        season_number: i32,
        limit: i64,
    ) -> PvpResult<Vec<LeaderboardEntry>> {
        let rows = self.store.leaderboard(season_number, limit.max(0)).await?;
        Ok(rows
            .into_iter()
            .zip(1..)
            .map(|(r, rank)| LeaderboardEntry {
                rank,
                player_id: r.player_id,
                elo: r.elo,
                tier: r.tier,
                division: r.division,
                wins: r.wins,
                losses: r.losses,
                win_streak: r.win_streak,
            })
            .collect())
    }

    pub async fn player_rank(&self, player_id: i64, season_number: i32) -> PvpResult<Option<i64>> {
        self.store.player_rank(player_id, season_number).await
    }
}
