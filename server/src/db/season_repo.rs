use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::{
    db::models::Season,
    error::{PvpError, PvpResult},
    season::season_name,
};

#[derive(sqlx::FromRow)]
struct SeasonRow {
    number: i32,
    name: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    rewards_config: serde_json::Value,
}

impl TryFrom<SeasonRow> for Season {
    type Error = PvpError;

    fn try_from(r: SeasonRow) -> PvpResult<Self> {
        Ok(Season {
            number: r.number,
            name: r.name,
            start_date: r.start_date,
            end_date: r.end_date,
            status: r.status.parse()?,
            rewards_config: r.rewards_config,
        })
    }
}

pub async fn active<'e, E: PgExecutor<'e>>(db: E) -> PvpResult<Option<Season>> {
    sqlx::query_as::<_, SeasonRow>(
        "SELECT number, name, start_date, end_date, status, rewards_config
           FROM pvp_seasons
          WHERE status = 'active'",
    )
    .fetch_optional(db)
    .await?
    .map(Season::try_from)
    .transpose()
}

pub async fn by_number(db: &PgPool, number: i32) -> PvpResult<Option<Season>> {
    sqlx::query_as::<_, SeasonRow>(
        "SELECT number, name, start_date, end_date, status, rewards_config
           FROM pvp_seasons
          WHERE number = $1",
    )
    .bind(number)
    .fetch_optional(db)
    .await?
    .map(Season::try_from)
    .transpose()
}

/// Ends `expired` and opens the next season. Concurrent callers converge on
/// whichever season got inserted first.
pub async fn open_next(
    db: &PgPool,
    expired: Option<i32>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> PvpResult<Season> {
    let mut tx = db.begin().await?;

    if let Some(n) = expired {
        sqlx::query("UPDATE pvp_seasons SET status = 'ended' WHERE number = $1 AND status = 'active'")
            .bind(n)
            .execute(&mut *tx)
            .await?;
    }
    if let Some(current) = active(&mut *tx).await? {
        tx.commit().await?;
        return Ok(current);
    }

    let next: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) + 1 FROM pvp_seasons")
        .fetch_one(&mut *tx)
        .await?;
    let inserted = sqlx::query_as::<_, SeasonRow>(
        r#"
        INSERT INTO pvp_seasons (number, name, start_date, end_date, status)
        VALUES ($1, $2, $3, $4, 'active')
        ON CONFLICT DO NOTHING
        RETURNING number, name, start_date, end_date, status, rewards_config
        "#,
    )
    .bind(next)
    .bind(season_name(next))
    .bind(start)
    .bind(end)
    .fetch_optional(&mut *tx)
    .await?;
    tx.commit().await?;

    match inserted {
        Some(row) => row.try_into(),
        // lost the race; the winner's season is visible now
        None => active(db).await?.ok_or(PvpError::NoActiveSeason),
    }
}

pub async fn set_rewards(db: &PgPool, number: i32, rewards: &serde_json::Value) -> PvpResult<()> {
    sqlx::query("UPDATE pvp_seasons SET rewards_config = $2 WHERE number = $1")
        .bind(number)
        .bind(rewards)
        .execute(db)
        .await?;
    Ok(())
}
