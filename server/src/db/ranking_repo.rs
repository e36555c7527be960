use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::{
    db::models::PlayerRanking,
    error::{PvpError, PvpResult},
    ranking::new_ranking,
};

#[derive(sqlx::FromRow)]
struct RankingRow {
    player_id: i64,
    season_number: i32,
    elo: i32,
    tier: String,
    division: Option<i32>,
    wins: i32,
    losses: i32,
    win_streak: i32,
    peak_elo: i32,
    peak_tier: String,
}

impl TryFrom<RankingRow> for PlayerRanking {
    type Error = PvpError;

    fn try_from(r: RankingRow) -> PvpResult<Self> {
        Ok(PlayerRanking {
            player_id: r.player_id,
            season_number: r.season_number,
            elo: r.elo,
            tier: r.tier.parse()?,
            division: r.division,
            wins: r.wins,
            losses: r.losses,
            win_streak: r.win_streak,
            peak_elo: r.peak_elo,
            peak_tier: r.peak_tier.parse()?,
        })
    }
}

/// Inserts a starting row unless one exists. Safe under concurrency: the
/// loser of an insert race simply reads the winner's row afterwards.
pub async fn ensure<'e, E: PgExecutor<'e>>(
    db: E,
    player_id: i64,
    season_number: i32,
    starting_elo: i32,
) -> PvpResult<()> {
    let r = new_ranking(player_id, season_number, starting_elo);
    sqlx::query(
        r#"
        INSERT INTO pvp_rankings (player_id, season_number, elo, tier, division,
                                  wins, losses, win_streak, peak_elo, peak_tier)
        VALUES ($1, $2, $3, $4, $5, 0, 0, 0, $3, $4)
        ON CONFLICT (player_id, season_number) DO NOTHING
        "#,
    )
    .bind(r.player_id)
    .bind(r.season_number)
    .bind(r.elo)
    .bind(r.tier.as_str())
    .bind(r.division)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find<'e, E: PgExecutor<'e>>(
    db: E,
    player_id: i64,
    season_number: i32,
) -> PvpResult<Option<PlayerRanking>> {
    sqlx::query_as::<_, RankingRow>(
        "SELECT player_id, season_number, elo, tier, division, wins, losses,
                win_streak, peak_elo, peak_tier
           FROM pvp_rankings
          WHERE player_id = $1 AND season_number = $2",
    )
    .bind(player_id)
    .bind(season_number)
    .fetch_optional(db)
    .await?
    .map(PlayerRanking::try_from)
    .transpose()
}

pub async fn get_or_create(
    db: &PgPool,
    player_id: i64,
    season_number: i32,
    starting_elo: i32,
) -> PvpResult<PlayerRanking> {
    ensure(db, player_id, season_number, starting_elo).await?;
    find(db, player_id, season_number)
        .await?
        .ok_or_else(|| PvpError::Store(format!("ranking row for {player_id} vanished")))
}

/// Locks both rows in player-id order, so two settlements touching the same
/// pair cannot deadlock.
pub async fn lock_pair(
    conn: &mut PgConnection,
    players: [i64; 2],
    season_number: i32,
) -> PvpResult<Vec<PlayerRanking>> {
    let rows = sqlx::query_as::<_, RankingRow>(
        "SELECT player_id, season_number, elo, tier, division, wins, losses,
                win_streak, peak_elo, peak_tier
           FROM pvp_rankings
          WHERE season_number = $1 AND player_id = ANY($2)
          ORDER BY player_id
            FOR UPDATE",
    )
    .bind(season_number)
    .bind(players.to_vec())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(PlayerRanking::try_from).collect()
}

pub async fn update(conn: &mut PgConnection, r: &PlayerRanking) -> PvpResult<()> {
    sqlx::query(
        r#"
        UPDATE pvp_rankings
           SET elo        = GREATEST(0, $3),
               tier       = $4,
               division   = $5,
               wins       = $6,
               losses     = $7,
               win_streak = $8,
               peak_elo   = $9,
               peak_tier  = $10,
               updated_at = NOW()
         WHERE player_id = $1 AND season_number = $2
        "#,
    )
    .bind(r.player_id)
    .bind(r.season_number)
    .bind(r.elo)
    .bind(r.tier.as_str())
    .bind(r.division)
    .bind(r.wins)
    .bind(r.losses)
    .bind(r.win_streak)
    .bind(r.peak_elo)
    .bind(r.peak_tier.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn leaderboard(
    db: &PgPool,
    season_number: i32,
    limit: i64,
) -> PvpResult<Vec<PlayerRanking>> {
    let rows = sqlx::query_as::<_, RankingRow>(
        "SELECT player_id, season_number, elo, tier, division, wins, losses,
                win_streak, peak_elo, peak_tier
           FROM pvp_rankings
          WHERE season_number = $1
          ORDER BY elo DESC, wins DESC, player_id
          LIMIT $2",
    )
    .bind(season_number)
    .bind(limit)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(PlayerRanking::try_from).collect()
}

pub async fn rank_of(db: &PgPool, player_id: i64, season_number: i32) -> PvpResult<Option<i64>> {
    Ok(sqlx::query_scalar::<_, i64>(
        r#"
        SELECT pos FROM (
            SELECT player_id,
                   ROW_NUMBER() OVER (ORDER BY elo DESC, wins DESC, player_id) AS pos
              FROM pvp_rankings
             WHERE season_number = $2
        ) ladder
        WHERE player_id = $1
        "#,
    )
    .bind(player_id)
    .bind(season_number)
    .fetch_optional(db)
    .await?)
}
