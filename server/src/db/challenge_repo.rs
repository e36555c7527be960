use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::{
    db::{
        match_repo,
        models::{ChallengeStatus, DirectChallenge, Match, NewChallenge, NewMatch},
        queue_repo,
    },
    error::{PvpError, PvpResult},
    game::types::MatchType,
};

#[derive(sqlx::FromRow)]
struct ChallengeRow {
    id: i64,
    challenger_id: i64,
    challenged_id: i64,
    challenger_beast_id: i64,
    challenged_beast_id: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    match_id: Option<i64>,
}

impl TryFrom<ChallengeRow> for DirectChallenge {
    type Error = PvpError;

    fn try_from(r: ChallengeRow) -> PvpResult<Self> {
        Ok(DirectChallenge {
            id: r.id,
            challenger_id: r.challenger_id,
            challenged_id: r.challenged_id,
            challenger_beast_id: r.challenger_beast_id,
            challenged_beast_id: r.challenged_beast_id,
            status: r.status.parse()?,
            created_at: r.created_at,
            expires_at: r.expires_at,
            match_id: r.match_id,
        })
    }
}

pub async fn insert(db: &PgPool, new: &NewChallenge) -> PvpResult<DirectChallenge> {
    let mut tx = db.begin().await?;

    // An overdue pending row would otherwise hold the unique slot.
    sqlx::query(
        "UPDATE pvp_challenges SET status = 'expired'
          WHERE challenger_id = $1 AND challenged_id = $2
            AND status = 'pending' AND expires_at <= $3",
    )
    .bind(new.challenger_id)
    .bind(new.challenged_id)
    .bind(new.created_at)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query_as::<_, ChallengeRow>(
        r#"
        INSERT INTO pvp_challenges (challenger_id, challenged_id, challenger_beast_id,
                                    status, created_at, expires_at)
        VALUES ($1, $2, $3, 'pending', $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING id, challenger_id, challenged_id, challenger_beast_id,
                  challenged_beast_id, status, created_at, expires_at, match_id
        "#,
    )
    .bind(new.challenger_id)
    .bind(new.challenged_id)
    .bind(new.challenger_beast_id)
    .bind(new.created_at)
    .bind(new.expires_at)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(PvpError::InvalidChallenge("a challenge to this player is already pending"))?;

    tx.commit().await?;
    row.try_into()
}

pub async fn find<'e, E: PgExecutor<'e>>(db: E, id: i64) -> PvpResult<Option<DirectChallenge>> {
    sqlx::query_as::<_, ChallengeRow>(
        "SELECT id, challenger_id, challenged_id, challenger_beast_id,
                challenged_beast_id, status, created_at, expires_at, match_id
           FROM pvp_challenges
          WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .map(DirectChallenge::try_from)
    .transpose()
}

fn ensure_pending(c: &DirectChallenge, now: DateTime<Utc>) -> PvpResult<()> {
    if c.status != ChallengeStatus::Pending || c.expires_at <= now {
        return Err(PvpError::InvalidChallenge("challenge is no longer pending"));
    }
    Ok(())
}

pub async fn accept(
    db: &PgPool,
    id: i64,
    challenged_beast_id: i64,
    season_number: i32,
    now: DateTime<Utc>,
) -> PvpResult<(DirectChallenge, Match)> {
    let mut tx = db.begin().await?;

    let challenge = sqlx::query_as::<_, ChallengeRow>(
        "SELECT id, challenger_id, challenged_id, challenger_beast_id,
                challenged_beast_id, status, created_at, expires_at, match_id
           FROM pvp_challenges
          WHERE id = $1
            FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .map(DirectChallenge::try_from)
    .transpose()?
    .ok_or(PvpError::ChallengeNotFound)?;
    ensure_pending(&challenge, now)?;

    let players = [challenge.challenger_id, challenge.challenged_id];
    queue_repo::remove_players(&mut tx, players).await?;
    let m = match_repo::insert(
        &mut tx,
        &NewMatch {
            season_number,
            player1_id: challenge.challenger_id,
            player2_id: challenge.challenged_id,
            player1_beast_id: challenge.challenger_beast_id,
            player2_beast_id: challenged_beast_id,
            match_type: MatchType::DirectChallenge,
        },
    )
    .await?;

    let accepted = sqlx::query_as::<_, ChallengeRow>(
        r#"
        UPDATE pvp_challenges
           SET status = 'accepted', challenged_beast_id = $2, match_id = $3
         WHERE id = $1
        RETURNING id, challenger_id, challenged_id, challenger_beast_id,
                  challenged_beast_id, status, created_at, expires_at, match_id
        "#,
    )
    .bind(id)
    .bind(challenged_beast_id)
    .bind(m.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((accepted.try_into()?, m))
}

pub async fn decline(db: &PgPool, id: i64, now: DateTime<Utc>) -> PvpResult<DirectChallenge> {
    let row = sqlx::query_as::<_, ChallengeRow>(
        r#"
        UPDATE pvp_challenges
           SET status = 'declined'
         WHERE id = $1 AND status = 'pending' AND expires_at > $2
        RETURNING id, challenger_id, challenged_id, challenger_beast_id,
                  challenged_beast_id, status, created_at, expires_at, match_id
        "#,
    )
    .bind(id)
    .bind(now)
    .fetch_optional(db)
    .await?;
    match row {
        Some(r) => r.try_into(),
        None => match find(db, id).await? {
            Some(_) => Err(PvpError::InvalidChallenge("challenge is no longer pending")),
            None => Err(PvpError::ChallengeNotFound),
        },
    }
}

pub async fn pending_for(
    db: &PgPool,
    player_id: i64,
    now: DateTime<Utc>,
) -> PvpResult<Vec<DirectChallenge>> {
    let rows = sqlx::query_as::<_, ChallengeRow>(
        "SELECT id, challenger_id, challenged_id, challenger_beast_id,
                challenged_beast_id, status, created_at, expires_at, match_id
           FROM pvp_challenges
          WHERE challenged_id = $1 AND status = 'pending' AND expires_at > $2
          ORDER BY created_at, id",
    )
    .bind(player_id)
    .bind(now)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(DirectChallenge::try_from).collect()
}

pub async fn expire_overdue(db: &PgPool, now: DateTime<Utc>) -> PvpResult<u64> {
    let done = sqlx::query(
        "UPDATE pvp_challenges SET status = 'expired'
          WHERE status = 'pending' AND expires_at <= $1",
    )
    .bind(now)
    .execute(db)
    .await?;
    Ok(done.rows_affected())
}
