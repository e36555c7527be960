//! Payouts for finished matches and for the end-of-season ladder.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Match, RewardGrant},
    game::{tier::Tier, types::MatchType},
};

const RANKED_BASE_CURRENCY: f64 = 100.0;
const CASUAL_CURRENCY_MIN: i64 = 40;
const CASUAL_CURRENCY_MAX: i64 = 80;
const BASE_EXPERIENCE: f64 = 50.0;
/// Per level of difference between the beaten and the winning beast.
const LEVEL_XP_STEP: f64 = 0.1;
const LEVEL_XP_MIN_FACTOR: f64 = 0.5;
const LEVEL_XP_MAX_FACTOR: f64 = 2.0;
const LOSER_CURRENCY_PCT: i64 = 30;
const LOSER_XP_PCT: i64 = 50;

/// Facts about the finished match the payout depends on.
#[derive(Debug, Clone, Copy)]
pub struct RewardContext {
    /// Tier of the loser at settlement time (ranked only).
    pub loser_tier: Option<Tier>,
    pub winner_beast_level: i32,
    pub loser_beast_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRewards {
    pub player1: RewardGrant,
    pub player2: RewardGrant,
}

impl MatchRewards {
    pub fn for_player(&self, m: &Match, player_id: i64) -> RewardGrant {
        if player_id == m.player1_id {
            self.player1
        } else if player_id == m.player2_id {
            self.player2
        } else {
            RewardGrant::default()
        }
    }
}

/// XP multiplier: beating a higher-level beast pays more, a lower one less.
pub fn level_factor(winner_level: i32, loser_level: i32) -> f64 {
    let diff = f64::from(loser_level - winner_level);
    (1.0 + diff * LEVEL_XP_STEP).clamp(LEVEL_XP_MIN_FACTOR, LEVEL_XP_MAX_FACTOR)
}

/// Winner's full share; the loser receives a fixed fraction of it.
pub fn winner_grant<R: Rng>(
    match_type: MatchType,
    ctx: &RewardContext,
    rng: &mut R,
) -> RewardGrant {
    let currency = match match_type {
        MatchType::Ranked => {
            let tier = ctx.loser_tier.unwrap_or(Tier::Iron);
            (RANKED_BASE_CURRENCY * tier.reward_multiplier()).round() as i64
        }
        MatchType::Casual | MatchType::DirectChallenge => {
            rng.random_range(CASUAL_CURRENCY_MIN..=CASUAL_CURRENCY_MAX)
        }
    };
    let experience = (BASE_EXPERIENCE
        * level_factor(ctx.winner_beast_level, ctx.loser_beast_level))
    .round() as i64;
    RewardGrant {
        currency,
        experience,
    }
}

pub fn loser_grant(winner: RewardGrant) -> RewardGrant {
    RewardGrant {
        currency: winner.currency * LOSER_CURRENCY_PCT / 100,
        experience: winner.experience * LOSER_XP_PCT / 100,
    }
}

pub fn compute_rewards<R: Rng>(
    m: &Match,
    winner_id: i64,
    ctx: &RewardContext,
    rng: &mut R,
) -> MatchRewards {
    let win = winner_grant(m.match_type, ctx, rng);
    let lose = loser_grant(win);
    if winner_id == m.player1_id {
        MatchRewards {
            player1: win,
            player2: lose,
        }
    } else {
        MatchRewards {
            player1: lose,
            player2: win,
        }
    }
}

/// One row of an end-of-season payout table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonReward {
    pub rank: i64,
    pub player_id: i64,
    pub currency: i64,
}

/// Highest rank that still earns an end-of-season payout.
pub const SEASON_REWARD_RANKS: i64 = 100;

/// Currency for a final ladder position; strictly decreasing with rank.
pub fn season_reward_for_rank(rank: i64) -> Option<i64> {
    match rank {
        1..=10 => Some(5000 - (rank - 1) * 250),
        11..=50 => Some(2000 - (rank - 11) * 25),
        51..=SEASON_REWARD_RANKS => Some(800 - (rank - 51) * 10),
        _ => None,
    }
}
