use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgExecutor, PgPool};

use crate::{
    db::{
        models::{ActionLogEntry, Match, NewMatch, RankedSettlement, RewardGrant, Settlement},
        queue_repo, ranking_repo,
        store::QueueRemoval,
    },
    error::{PvpError, PvpResult},
    ranking::{apply_result, compute_elo_delta},
};

#[derive(sqlx::FromRow)]
struct MatchRow {
    id: i64,
    season_number: i32,
    player1_id: i64,
    player2_id: i64,
    player1_beast_id: i64,
    player2_beast_id: i64,
    match_type: String,
    winner_id: Option<i64>,
    loser_id: Option<i64>,
    elo_change_player1: Option<i32>,
    elo_change_player2: Option<i32>,
    duration_seconds: Option<i32>,
    action_log: Json<Vec<ActionLogEntry>>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<MatchRow> for Match {
    type Error = PvpError;

    fn try_from(r: MatchRow) -> PvpResult<Self> {
        Ok(Match {
            id: r.id,
            season_number: r.season_number,
            player1_id: r.player1_id,
            player2_id: r.player2_id,
            player1_beast_id: r.player1_beast_id,
            player2_beast_id: r.player2_beast_id,
            match_type: r.match_type.parse()?,
            winner_id: r.winner_id,
            loser_id: r.loser_id,
            elo_change_player1: r.elo_change_player1,
            elo_change_player2: r.elo_change_player2,
            duration_seconds: r.duration_seconds,
            action_log: r.action_log.0,
            created_at: r.created_at,
            finished_at: r.finished_at,
        })
    }
}

pub async fn insert(conn: &mut PgConnection, new: &NewMatch) -> PvpResult<Match> {
    sqlx::query_as::<_, MatchRow>(
        r#"
        INSERT INTO pvp_matches (season_number, player1_id, player2_id,
                                 player1_beast_id, player2_beast_id, match_type)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, season_number, player1_id, player2_id, player1_beast_id,
                  player2_beast_id, match_type, winner_id, loser_id,
                  elo_change_player1, elo_change_player2, duration_seconds,
                  action_log, created_at, finished_at
        "#,
    )
    .bind(new.season_number)
    .bind(new.player1_id)
    .bind(new.player2_id)
    .bind(new.player1_beast_id)
    .bind(new.player2_beast_id)
    .bind(new.match_type.as_str())
    .fetch_one(conn)
    .await?
    .try_into()
}

/// Creates the match and consumes the players' queue entries in one tx.
pub async fn create(db: &PgPool, new: &NewMatch, removal: QueueRemoval) -> PvpResult<Match> {
    let players = [new.player1_id, new.player2_id];
    let mut tx = db.begin().await?;
    match removal {
        QueueRemoval::Required => {
            let taken = queue_repo::take_live_pair(&mut tx, players, Utc::now()).await?;
            if taken != 2 {
                // dropping `tx` rolls back the partial delete
                return Err(PvpError::NotInQueue);
            }
        }
        QueueRemoval::BestEffort => queue_repo::remove_players(&mut tx, players).await?,
    }
    let m = insert(&mut tx, new).await?;
    tx.commit().await?;
    Ok(m)
}

pub async fn find<'e, E: PgExecutor<'e>>(db: E, match_id: i64) -> PvpResult<Option<Match>> {
    sqlx::query_as::<_, MatchRow>(
        "SELECT id, season_number, player1_id, player2_id, player1_beast_id,
                player2_beast_id, match_type, winner_id, loser_id,
                elo_change_player1, elo_change_player2, duration_seconds,
                action_log, created_at, finished_at
           FROM pvp_matches
          WHERE id = $1",
    )
    .bind(match_id)
    .fetch_optional(db)
    .await?
    .map(Match::try_from)
    .transpose()
}

pub async fn append_action(db: &PgPool, match_id: i64, entry: &ActionLogEntry) -> PvpResult<()> {
    let done = sqlx::query(
        "UPDATE pvp_matches
            SET action_log = action_log || $2
          WHERE id = $1 AND finished_at IS NULL",
    )
    .bind(match_id)
    .bind(Json(vec![entry]))
    .execute(db)
    .await?;
    if done.rows_affected() == 1 {
        return Ok(());
    }
    match find(db, match_id).await? {
        Some(_) => Err(PvpError::AlreadyFinished),
        None => Err(PvpError::MatchNotFound),
    }
}

async fn credit(
    conn: &mut PgConnection,
    player_id: i64,
    beast_id: i64,
    grant: RewardGrant,
) -> PvpResult<()> {
    if grant.currency != 0 {
        sqlx::query(
            "INSERT INTO players (id, currency) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET currency = players.currency + EXCLUDED.currency",
        )
        .bind(player_id)
        .bind(grant.currency)
        .execute(&mut *conn)
        .await?;
    }
    if grant.experience != 0 {
        sqlx::query("UPDATE beasts SET experience = experience + $2 WHERE id = $1")
            .bind(beast_id)
            .bind(grant.experience)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Finish + ELO + rewards, all or nothing.
pub async fn settle(db: &PgPool, s: &Settlement) -> PvpResult<Match> {
    let mut tx = db.begin().await?;

    let m = sqlx::query_as::<_, MatchRow>(
        "SELECT id, season_number, player1_id, player2_id, player1_beast_id,
                player2_beast_id, match_type, winner_id, loser_id,
                elo_change_player1, elo_change_player2, duration_seconds,
                action_log, created_at, finished_at
           FROM pvp_matches
          WHERE id = $1
            FOR UPDATE",
    )
    .bind(s.match_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(Match::try_from)
    .transpose()?
    .ok_or(PvpError::MatchNotFound)?;

    if m.is_finished() {
        return Err(PvpError::AlreadyFinished);
    }
    let loser_id = m.opponent_of(s.winner_id).ok_or(PvpError::InvalidWinner)?;

    let (change1, change2) = match s.elo {
        Some(RankedSettlement {
            season_number,
            rules,
        }) => {
            let players = [m.player1_id, m.player2_id];
            for p in players {
                ranking_repo::ensure(&mut *tx, p, season_number, rules.starting_elo).await?;
            }
            let rows = ranking_repo::lock_pair(&mut tx, players, season_number).await?;
            let row_of = |id: i64| {
                rows.iter()
                    .find(|r| r.player_id == id)
                    .ok_or_else(|| PvpError::Store(format!("ranking row for {id} missing")))
            };
            let winner = row_of(s.winner_id)?;
            let loser = row_of(loser_id)?;
            let (win_delta, lose_delta) = compute_elo_delta(winner.elo, loser.elo, rules.k_factor);
            let next_winner = apply_result(winner, win_delta, true);
            let next_loser = apply_result(loser, lose_delta, false);
            ranking_repo::update(&mut tx, &next_winner).await?;
            ranking_repo::update(&mut tx, &next_loser).await?;
            if s.winner_id == m.player1_id {
                (Some(win_delta), Some(lose_delta))
            } else {
                (Some(lose_delta), Some(win_delta))
            }
        }
        None => (None, None),
    };

    credit(&mut tx, m.player1_id, m.player1_beast_id, s.player1_rewards).await?;
    credit(&mut tx, m.player2_id, m.player2_beast_id, s.player2_rewards).await?;

    let settled = sqlx::query_as::<_, MatchRow>(
        r#"
        UPDATE pvp_matches
           SET winner_id          = $2,
               loser_id           = $3,
               elo_change_player1 = $4,
               elo_change_player2 = $5,
               duration_seconds   = $6,
               finished_at        = $7
         WHERE id = $1 AND finished_at IS NULL
        RETURNING id, season_number, player1_id, player2_id, player1_beast_id,
                  player2_beast_id, match_type, winner_id, loser_id,
                  elo_change_player1, elo_change_player2, duration_seconds,
                  action_log, created_at, finished_at
        "#,
    )
    .bind(s.match_id)
    .bind(s.winner_id)
    .bind(loser_id)
    .bind(change1)
    .bind(change2)
    .bind(s.duration_seconds)
    .bind(s.finished_at)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(PvpError::AlreadyFinished)?;

    tx.commit().await?;
    settled.try_into()
}

pub async fn history(db: &PgPool, player_id: i64, limit: i64) -> PvpResult<Vec<Match>> {
    let rows = sqlx::query_as::<_, MatchRow>(
        "SELECT id, season_number, player1_id, player2_id, player1_beast_id,
                player2_beast_id, match_type, winner_id, loser_id,
                elo_change_player1, elo_change_player2, duration_seconds,
                action_log, created_at, finished_at
           FROM pvp_matches
          WHERE player1_id = $1 OR player2_id = $1
          ORDER BY created_at DESC, id DESC
          LIMIT $2",
    )
    .bind(player_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    rows.into_iter().map(Match::try_from).collect()
}
