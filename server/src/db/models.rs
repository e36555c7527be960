use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::game::{
    tier::Tier,
    types::{MatchType, PvpAction, QueueKind, UnknownVariant},
};

/// One pending matchmaking entry; at most one per player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: i64,
    pub player_id: i64,
    pub beast_id: i64,
    pub kind: QueueKind,
    /// Rating at enqueue time; pairing uses this, never a live read.
    pub elo_snapshot: Option<i32>,
    pub tier_snapshot: Option<Tier>,
    pub queued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub player_id: i64,
    pub beast_id: i64,
    pub kind: QueueKind,
    pub elo_snapshot: Option<i32>,
    pub tier_snapshot: Option<Tier>,
    pub queued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Per-player, per-season ladder row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRanking {
    pub player_id: i64,
    pub season_number: i32,
    pub elo: i32,
    pub tier: Tier,
    pub division: Option<i32>,
    pub wins: i32,
    pub losses: i32,
    pub win_streak: i32,
    pub peak_elo: i32,
    pub peak_tier: Tier,
}

/// One relayed action, as kept in the match's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    pub player_id: i64,
    pub action: PvpAction,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: i64,
    pub season_number: i32,
    pub player1_id: i64,
    pub player2_id: i64,
    pub player1_beast_id: i64,
    pub player2_beast_id: i64,
    pub match_type: MatchType,
    pub winner_id: Option<i64>,
    pub loser_id: Option<i64>,
    pub elo_change_player1: Option<i32>,
    pub elo_change_player2: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub action_log: Vec<ActionLogEntry>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn is_participant(&self, player_id: i64) -> bool {
        player_id == self.player1_id || player_id == self.player2_id
    }

    pub fn opponent_of(&self, player_id: i64) -> Option<i64> {
        if player_id == self.player1_id {
            Some(self.player2_id)
        } else if player_id == self.player2_id {
            Some(self.player1_id)
        } else {
            None
        }
    }

    pub fn beast_of(&self, player_id: i64) -> Option<i64> {
        if player_id == self.player1_id {
            Some(self.player1_beast_id)
        } else if player_id == self.player2_id {
            Some(self.player2_beast_id)
        } else {
            None
        }
    }

    /// ELO change recorded for `player_id`, if any.
    pub fn elo_change_of(&self, player_id: i64) -> Option<i32> {
        if player_id == self.player1_id {
            self.elo_change_player1
        } else if player_id == self.player2_id {
            self.elo_change_player2
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMatch {
    pub season_number: i32,
    pub player1_id: i64,
    pub player2_id: i64,
    pub player1_beast_id: i64,
    pub player2_beast_id: i64,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Active,
    Ended,
}

impl SeasonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SeasonStatus::Active => "active",
            SeasonStatus::Ended => "ended",
        }
    }
}

impl FromStr for SeasonStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SeasonStatus::Active),
            "ended" => Ok(SeasonStatus::Ended),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub number: i32,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SeasonStatus,
    /// End-of-season payout table once computed (`null` before).
    pub rewards_config: serde_json::Value,
}

impl Season {
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::Declined => "declined",
            ChallengeStatus::Expired => "expired",
        }
    }
}

impl FromStr for ChallengeStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChallengeStatus::Pending),
            "accepted" => Ok(ChallengeStatus::Accepted),
            "declined" => Ok(ChallengeStatus::Declined),
            "expired" => Ok(ChallengeStatus::Expired),
            other => Err(UnknownVariant(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectChallenge {
    pub id: i64,
    pub challenger_id: i64,
    pub challenged_id: i64,
    pub challenger_beast_id: i64,
    pub challenged_beast_id: Option<i64>,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub match_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub challenger_id: i64,
    pub challenged_id: i64,
    pub challenger_beast_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The slice of a beast this engine reads: who owns it and how strong it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BeastRef {
    pub id: i64,
    pub owner_id: i64,
    pub level: i32,
}

/// Currency and experience granted to one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardGrant {
    pub currency: i64,
    pub experience: i64,
}

/// Everything the store must commit atomically when a match ends.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub match_id: i64,
    pub winner_id: i64,
    pub duration_seconds: i32,
    pub finished_at: DateTime<Utc>,
    pub player1_rewards: RewardGrant,
    pub player2_rewards: RewardGrant,
    /// Set for ranked matches; `None` leaves rankings untouched.
    pub elo: Option<RankedSettlement>,
}

/// Where and how a ranked result is rated.
#[derive(Debug, Clone, Copy)]
pub struct RankedSettlement {
    /// Season whose ladder receives the result (the running one).
    pub season_number: i32,
    pub rules: EloRules,
}

#[derive(Debug, Clone, Copy)]
pub struct EloRules {
    pub k_factor: f64,
    pub starting_elo: i32,
}
