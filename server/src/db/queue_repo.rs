use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::{
    db::models::{NewQueueEntry, QueueEntry},
    error::{PvpError, PvpResult},
    game::types::QueueKind,
};

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: i64,
    player_id: i64,
    beast_id: i64,
    queue_type: String,
    elo_snapshot: Option<i32>,
    tier_snapshot: Option<String>,
    queued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = PvpError;

    fn try_from(r: QueueRow) -> PvpResult<Self> {
        Ok(QueueEntry {
            id: r.id,
            player_id: r.player_id,
            beast_id: r.beast_id,
            kind: r.queue_type.parse()?,
            elo_snapshot: r.elo_snapshot,
            tier_snapshot: r.tier_snapshot.as_deref().map(str::parse).transpose()?,
            queued_at: r.queued_at,
            expires_at: r.expires_at,
        })
    }
}

fn convert(rows: Vec<QueueRow>) -> PvpResult<Vec<QueueEntry>> {
    rows.into_iter().map(QueueEntry::try_from).collect()
}

/// Inserts the entry, replacing a dead one. `AlreadyQueued` if a live entry
/// holds the player's slot.
pub async fn insert(db: &PgPool, e: &NewQueueEntry) -> PvpResult<QueueEntry> {
    let row = sqlx::query_as::<_, QueueRow>(
        r#"
        INSERT INTO pvp_queue (player_id, beast_id, queue_type, elo_snapshot,
                               tier_snapshot, queued_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (player_id) DO UPDATE
           SET beast_id      = EXCLUDED.beast_id,
               queue_type    = EXCLUDED.queue_type,
               elo_snapshot  = EXCLUDED.elo_snapshot,
               tier_snapshot = EXCLUDED.tier_snapshot,
               queued_at     = EXCLUDED.queued_at,
               expires_at    = EXCLUDED.expires_at
         WHERE pvp_queue.expires_at <= EXCLUDED.queued_at
        RETURNING id, player_id, beast_id, queue_type, elo_snapshot,
                  tier_snapshot, queued_at, expires_at
        "#,
    )
    .bind(e.player_id)
    .bind(e.beast_id)
    .bind(e.kind.as_str())
    .bind(e.elo_snapshot)
    .bind(e.tier_snapshot.map(|t| t.as_str()))
    .bind(e.queued_at)
    .bind(e.expires_at)
    .fetch_optional(db)
    .await?;

    row.ok_or(PvpError::AlreadyQueued)?.try_into()
}

pub async fn live(db: &PgPool, player_id: i64, now: DateTime<Utc>) -> PvpResult<Option<QueueEntry>> {
    sqlx::query_as::<_, QueueRow>(
        "SELECT id, player_id, beast_id, queue_type, elo_snapshot, tier_snapshot,
                queued_at, expires_at
           FROM pvp_queue
          WHERE player_id = $1 AND expires_at > $2",
    )
    .bind(player_id)
    .bind(now)
    .fetch_optional(db)
    .await?
    .map(QueueEntry::try_from)
    .transpose()
}

pub async fn delete(db: &PgPool, player_id: i64) -> PvpResult<bool> {
    let done = sqlx::query("DELETE FROM pvp_queue WHERE player_id = $1")
        .bind(player_id)
        .execute(db)
        .await?;
    Ok(done.rows_affected() > 0)
}

pub async fn live_by_kind(
    db: &PgPool,
    kind: QueueKind,
    now: DateTime<Utc>,
) -> PvpResult<Vec<QueueEntry>> {
    let rows = sqlx::query_as::<_, QueueRow>(
        "SELECT id, player_id, beast_id, queue_type, elo_snapshot, tier_snapshot,
                queued_at, expires_at
           FROM pvp_queue
          WHERE queue_type = $1 AND expires_at > $2
          ORDER BY queued_at, id",
    )
    .bind(kind.as_str())
    .bind(now)
    .fetch_all(db)
    .await?;
    convert(rows)
}

pub async fn ranked_candidates(
    db: &PgPool,
    exclude_player: i64,
    min_elo: i32,
    max_elo: i32,
    now: DateTime<Utc>,
) -> PvpResult<Vec<QueueEntry>> {
    let rows = sqlx::query_as::<_, QueueRow>(
        "SELECT id, player_id, beast_id, queue_type, elo_snapshot, tier_snapshot,
                queued_at, expires_at
           FROM pvp_queue
          WHERE queue_type = 'ranked'
            AND player_id <> $1
            AND elo_snapshot BETWEEN $2 AND $3
            AND expires_at > $4
          ORDER BY queued_at, id",
    )
    .bind(exclude_player)
    .bind(min_elo)
    .bind(max_elo)
    .bind(now)
    .fetch_all(db)
    .await?;
    convert(rows)
}

pub async fn purge_expired(db: &PgPool, now: DateTime<Utc>) -> PvpResult<u64> {
    let done = sqlx::query("DELETE FROM pvp_queue WHERE expires_at <= $1")
        .bind(now)
        .execute(db)
        .await?;
    Ok(done.rows_affected())
}

/// Consumes both players' live entries. Returns how many were removed.
pub async fn take_live_pair(
    conn: &mut PgConnection,
    players: [i64; 2],
    now: DateTime<Utc>,
) -> PvpResult<u64> {
    let done = sqlx::query("DELETE FROM pvp_queue WHERE player_id = ANY($1) AND expires_at > $2")
        .bind(players.to_vec())
        .bind(now)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

/// Removes whatever entries the players hold.
pub async fn remove_players(conn: &mut PgConnection, players: [i64; 2]) -> PvpResult<()> {
    sqlx::query("DELETE FROM pvp_queue WHERE player_id = ANY($1)")
        .bind(players.to_vec())
        .execute(conn)
        .await?;
    Ok(())
}
