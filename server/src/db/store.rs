//! Transactional primitives the PVP engine needs from persistence.
//!
//! Every method is one atomic unit: an implementation must either apply all
//! of its effects or none. Multi-step invariants (pair + dequeue, settle +
//! rank, season rollover) therefore live behind a single call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::models::{
        ActionLogEntry, BeastRef, DirectChallenge, Match, NewChallenge, NewMatch, NewQueueEntry,
        PlayerRanking, QueueEntry, Season, Settlement,
    },
    error::PvpResult,
    game::types::QueueKind,
};

/// What `create_match` does with the two players' queue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRemoval {
    /// Both live entries must exist and are consumed; otherwise `NotInQueue`
    /// and nothing is written.
    Required,
    /// Remove whatever entries exist (direct challenges).
    BestEffort,
}

#[async_trait]
pub trait PvpStore: Send + Sync {
    async fn ping(&self) -> PvpResult<()>;

    async fn beast(&self, beast_id: i64) -> PvpResult<Option<BeastRef>>;

    // ---------- queue ----------

    /// Fails with `AlreadyQueued` if the player holds a live entry. A dead
    /// entry left behind by expiry is replaced.
    async fn insert_queue_entry(&self, entry: NewQueueEntry) -> PvpResult<QueueEntry>;

    /// The player's live entry, if any.
    async fn queue_entry(&self, player_id: i64, now: DateTime<Utc>)
        -> PvpResult<Option<QueueEntry>>;

    /// Returns whether a row was removed.
    async fn delete_queue_entry(&self, player_id: i64) -> PvpResult<bool>;

    /// Live entries of one pool, oldest first.
    async fn live_entries(&self, kind: QueueKind, now: DateTime<Utc>)
        -> PvpResult<Vec<QueueEntry>>;

    /// Live ranked entries with `min_elo <= elo_snapshot <= max_elo`, other
    /// than `exclude_player`.
    async fn ranked_candidates(
        &self,
        exclude_player: i64,
        min_elo: i32,
        max_elo: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>>;

    /// Deletes every entry past its expiry; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> PvpResult<u64>;

    // ---------- matches ----------

    async fn create_match(&self, new: NewMatch, removal: QueueRemoval) -> PvpResult<Match>;

    async fn get_match(&self, match_id: i64) -> PvpResult<Option<Match>>;

    /// Appends to the action log; `AlreadyFinished` once the match is over.
    async fn append_action(&self, match_id: i64, entry: ActionLogEntry) -> PvpResult<()>;

    /// Finishes the match, applies ELO (ranked) and reward grants. Fails with
    /// `AlreadyFinished` without side effects if the match was settled before.
    async fn settle_match(&self, settlement: Settlement) -> PvpResult<Match>;

    /// Most recent matches of a player, newest first.
    async fn match_history(&self, player_id: i64, limit: i64) -> PvpResult<Vec<Match>>;

    // ---------- rankings ----------

    async fn get_or_create_ranking(
        &self,
        player_id: i64,
        season_number: i32,
        starting_elo: i32,
    ) -> PvpResult<PlayerRanking>;

    async fn ranking(&self, player_id: i64, season_number: i32)
        -> PvpResult<Option<PlayerRanking>>;

    /// Ordered by ELO desc, wins desc, player id.
    async fn leaderboard(&self, season_number: i32, limit: i64) -> PvpResult<Vec<PlayerRanking>>;

    /// 1-based position in the leaderboard ordering.
    async fn player_rank(&self, player_id: i64, season_number: i32) -> PvpResult<Option<i64>>;

    // ---------- seasons ----------

    async fn active_season(&self) -> PvpResult<Option<Season>>;

    async fn season(&self, number: i32) -> PvpResult<Option<Season>>;

    /// Ends season `expired` (if given and still active) and opens the next
    /// one, numbered after the highest existing season. If another caller
    /// already opened a season, that one is returned instead.
    async fn open_season(
        &self,
        expired: Option<i32>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PvpResult<Season>;

    async fn set_season_rewards(&self, number: i32, rewards: serde_json::Value) -> PvpResult<()>;

    // ---------- direct challenges ----------

    /// `InvalidChallenge` if the same challenger already has a live pending
    /// challenge to the same player.
    async fn insert_challenge(&self, new: NewChallenge) -> PvpResult<DirectChallenge>;

    async fn challenge(&self, challenge_id: i64) -> PvpResult<Option<DirectChallenge>>;

    /// Pending → accepted, creates the match and links it, in one unit.
    async fn accept_challenge(
        &self,
        challenge_id: i64,
        challenged_beast_id: i64,
        season_number: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<(DirectChallenge, Match)>;

    async fn decline_challenge(
        &self,
        challenge_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<DirectChallenge>;

    async fn pending_challenges(
        &self,
        player_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<DirectChallenge>>;

    /// Marks overdue pending challenges as expired; returns how many.
    async fn expire_challenges(&self, now: DateTime<Utc>) -> PvpResult<u64>;
}
