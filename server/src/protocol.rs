//! Wire-protocol shared by the WS handler and the notification fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::RewardGrant,
    game::types::{BeastSnapshot, MatchType, PvpAction, QueueKind},
};

// ---------- client → server ----------
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    #[serde(rename = "matchmaking:join")]
    Join { beast_id: i64, match_type: QueueKind },
    #[serde(rename = "matchmaking:leave")]
    Leave,
    #[serde(rename = "match:action")]
    Action {
        match_id: i64,
        action: PvpAction,
        beast_state: BeastSnapshot,
    },
}

/// The other side of a freshly created match.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpponentInfo {
    pub player_id: i64,
    pub beast_id: i64,
}

// ---------- server → client ----------
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    #[serde(rename = "matchmaking:joined")]
    QueueJoined {
        match_type: QueueKind,
        queued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "matchmaking:found")]
    MatchFound {
        match_id: i64,
        opponent: OpponentInfo,
    },
    #[serde(rename = "match:start")]
    MatchStart {
        match_id: i64,
        match_type: MatchType,
        player1_id: i64,
        player2_id: i64,
        player1_beast_id: i64,
        player2_beast_id: i64,
    },
    #[serde(rename = "match:action")]
    MatchAction {
        match_id: i64,
        action: PvpAction,
        from_player: i64,
    },
    #[serde(rename = "match:state")]
    MatchState {
        match_id: i64,
        finished: bool,
        winner_id: Option<i64>,
        loser_id: Option<i64>,
        elo_change: Option<i32>,
        rewards: RewardGrant,
        duration_seconds: Option<i32>,
    },
    #[serde(rename = "challenge:received")]
    ChallengeReceived {
        challenge_id: i64,
        challenger_id: i64,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "challenge:accepted")]
    ChallengeAccepted { challenge_id: i64, match_id: i64 },
    #[serde(rename = "challenge:declined")]
    ChallengeDeclined { challenge_id: i64 },
    /// Reply to a rejected socket command.
    #[serde(rename = "error")]
    Error { reason: String },
}
