//! `PvpStore` over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    db::{
        challenge_repo, match_repo, migrations,
        models::{
            ActionLogEntry, BeastRef, DirectChallenge, Match, NewChallenge, NewMatch,
            NewQueueEntry, PlayerRanking, QueueEntry, Season, Settlement,
        },
        queue_repo, ranking_repo, season_repo,
        store::{PvpStore, QueueRemoval},
    },
    error::{PvpError, PvpResult},
    game::types::QueueKind,
};

#[derive(sqlx::FromRow)]
struct BeastRow {
    id: i64,
    owner_id: i64,
    level: i32,
}

pub struct PgStore {
    pool: PgPool,
    /// Set once the on-demand migration has been attempted.
    healed: AtomicBool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore {
            pool,
            healed: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> PvpResult<()> {
        migrations::run(&self.pool).await
    }

    async fn healing<T, F, Fut>(&self, op: F) -> PvpResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PvpResult<T>>,
    {
        heal_once(&self.healed, move || self.migrate(), op).await
    }
}

/// Runs `op`; if a table is missing, migrates (at most once per `healed`
/// flag) and retries the operation once.
async fn heal_once<T, F, Fut, M, MFut>(healed: &AtomicBool, migrate: M, op: F) -> PvpResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = PvpResult<T>>,
    M: FnOnce() -> MFut,
    MFut: Future<Output = PvpResult<()>>,
{
    match op().await {
        Err(PvpError::SchemaMissing(what)) if !healed.swap(true, Ordering::AcqRel) => {
            log::warn!("schema missing ({what}); running migrations");
            migrate().await?;
            op().await
        }
        other => other,
    }
}

#[async_trait]
impl PvpStore for PgStore {
    async fn ping(&self) -> PvpResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn beast(&self, beast_id: i64) -> PvpResult<Option<BeastRef>> {
        let pool = &self.pool;
        self.healing(move || async move {
            let row = sqlx::query_as::<_, BeastRow>(
                "SELECT id, owner_id, level FROM beasts WHERE id = $1",
            )
            .bind(beast_id)
            .fetch_optional(pool)
            .await?;
            Ok(row.map(|b| BeastRef {
                id: b.id,
                owner_id: b.owner_id,
                level: b.level,
            }))
        })
        .await
    }

    async fn insert_queue_entry(&self, entry: NewQueueEntry) -> PvpResult<QueueEntry> {
        let (pool, entry) = (&self.pool, &entry);
        self.healing(move || queue_repo::insert(pool, entry)).await
    }

    async fn queue_entry(
        &self,
        player_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<Option<QueueEntry>> {
        let pool = &self.pool;
        self.healing(move || queue_repo::live(pool, player_id, now)).await
    }

    async fn delete_queue_entry(&self, player_id: i64) -> PvpResult<bool> {
        let pool = &self.pool;
        self.healing(move || queue_repo::delete(pool, player_id)).await
    }

    async fn live_entries(
        &self,
        kind: QueueKind,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>> {
        let pool = &self.pool;
        self.healing(move || queue_repo::live_by_kind(pool, kind, now)).await
    }

    async fn ranked_candidates(
        &self,
        exclude_player: i64,
        min_elo: i32,
        max_elo: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>> {
        let pool = &self.pool;
        self.healing(move || {
            queue_repo::ranked_candidates(pool, exclude_player, min_elo, max_elo, now)
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> PvpResult<u64> {
        let pool = &self.pool;
        self.healing(move || queue_repo::purge_expired(pool, now)).await
    }

    async fn create_match(&self, new: NewMatch, removal: QueueRemoval) -> PvpResult<Match> {
        let (pool, new) = (&self.pool, &new);
        self.healing(move || match_repo::create(pool, new, removal)).await
    }

    async fn get_match(&self, match_id: i64) -> PvpResult<Option<Match>> {
        let pool = &self.pool;
        self.healing(move || match_repo::find(pool, match_id)).await
    }

    async fn append_action(&self, match_id: i64, entry: ActionLogEntry) -> PvpResult<()> {
        let (pool, entry) = (&self.pool, &entry);
        self.healing(move || match_repo::append_action(pool, match_id, entry))
            .await
    }

    async fn settle_match(&self, settlement: Settlement) -> PvpResult<Match> {
        let (pool, settlement) = (&self.pool, &settlement);
        self.healing(move || match_repo::settle(pool, settlement)).await
    }

    async fn match_history(&self, player_id: i64, limit: i64) -> PvpResult<Vec<Match>> {
        let pool = &self.pool;
        self.healing(move || match_repo::history(pool, player_id, limit))
            .await
    }

    async fn get_or_create_ranking(
        &self,
        player_id: i64,
        season_number: i32,
        starting_elo: i32,
    ) -> PvpResult<PlayerRanking> {
        let pool = &self.pool;
        self.healing(move || {
            ranking_repo::get_or_create(pool, player_id, season_number, starting_elo)
        })
        .await
    }

    async fn ranking(
        &self,
        player_id: i64,
        season_number: i32,
    ) -> PvpResult<Option<PlayerRanking>> {
        let pool = &self.pool;
        self.healing(move || ranking_repo::find(pool, player_id, season_number))
            .await
    }

    async fn leaderboard(&self, season_number: i32, limit: i64) -> PvpResult<Vec<PlayerRanking>> {
        let pool = &self.pool;
        self.healing(move || ranking_repo::leaderboard(pool, season_number, limit))
            .await
    }

    async fn player_rank(&self, player_id: i64, season_number: i32) -> PvpResult<Option<i64>> {
        let pool = &self.pool;
        self.healing(move || ranking_repo::rank_of(pool, player_id, season_number))
            .await
    }

    async fn active_season(&self) -> PvpResult<Option<Season>> {
        let pool = &self.pool;
        self.healing(move || season_repo::active(pool)).await
    }

    async fn season(&self, number: i32) -> PvpResult<Option<Season>> {
        let pool = &self.pool;
        self.healing(move || season_repo::by_number(pool, number)).await
    }

    async fn open_season(
        &self,
        expired: Option<i32>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PvpResult<Season> {
        let pool = &self.pool;
        self.healing(move || season_repo::open_next(pool, expired, start, end))
            .await
    }

    async fn set_season_rewards(&self, number: i32, rewards: serde_json::Value) -> PvpResult<()> {
        let (pool, rewards) = (&self.pool, &rewards);
        self.healing(move || season_repo::set_rewards(pool, number, rewards))
            .await
    }

    async fn insert_challenge(&self, new: NewChallenge) -> PvpResult<DirectChallenge> {
        let (pool, new) = (&self.pool, &new);
        self.healing(move || challenge_repo::insert(pool, new)).await
    }

    async fn challenge(&self, challenge_id: i64) -> PvpResult<Option<DirectChallenge>> {
        let pool = &self.pool;
        self.healing(move || challenge_repo::find(pool, challenge_id))
            .await
    }

    async fn accept_challenge(
        &self,
        challenge_id: i64,
        challenged_beast_id: i64,
        season_number: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<(DirectChallenge, Match)> {
        let pool = &self.pool;
        self.healing(move || {
            challenge_repo::accept(pool, challenge_id, challenged_beast_id, season_number, now)
        })
        .await
    }

    async fn decline_challenge(
        &self,
        challenge_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<DirectChallenge> {
        let pool = &self.pool;
        self.healing(move || challenge_repo::decline(pool, challenge_id, now))
            .await
    }

    async fn pending_challenges(
        &self,
        player_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<DirectChallenge>> {
        let pool = &self.pool;
        self.healing(move || challenge_repo::pending_for(pool, player_id, now))
            .await
    }

    async fn expire_challenges(&self, now: DateTime<Utc>) -> PvpResult<u64> {
        let pool = &self.pool;
        self.healing(move || challenge_repo::expire_overdue(pool, now))
            .await
    }
}
