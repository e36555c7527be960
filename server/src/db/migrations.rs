//! PostgreSQL schema for the PVP engine.
//!
//! `players` and `beasts` are owned by the wider game; only the columns this
//! engine reads or credits are declared here.

use sqlx::PgPool;

use crate::error::PvpResult;

pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id          BIGSERIAL PRIMARY KEY,
    currency    BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS beasts (
    id          BIGSERIAL PRIMARY KEY,
    owner_id    BIGINT NOT NULL REFERENCES players(id),
    level       INTEGER NOT NULL DEFAULT 1,
    experience  BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pvp_seasons (
    number          INTEGER PRIMARY KEY,
    name            TEXT NOT NULL,
    start_date      TIMESTAMPTZ NOT NULL,
    end_date        TIMESTAMPTZ NOT NULL,
    status          TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'ended')),
    rewards_config  JSONB NOT NULL DEFAULT 'null'::jsonb
);

-- at most one active season
CREATE UNIQUE INDEX IF NOT EXISTS pvp_seasons_one_active
    ON pvp_seasons ((status)) WHERE status = 'active';

CREATE TABLE IF NOT EXISTS pvp_queue (
    id              BIGSERIAL PRIMARY KEY,
    player_id       BIGINT NOT NULL UNIQUE,
    beast_id        BIGINT NOT NULL,
    queue_type      TEXT NOT NULL CHECK (queue_type IN ('ranked', 'casual')),
    elo_snapshot    INTEGER,
    tier_snapshot   TEXT,
    queued_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    expires_at      TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS pvp_queue_pool ON pvp_queue (queue_type, queued_at);
CREATE INDEX IF NOT EXISTS pvp_queue_elo ON pvp_queue (queue_type, elo_snapshot);

CREATE TABLE IF NOT EXISTS pvp_matches (
    id                  BIGSERIAL PRIMARY KEY,
    season_number       INTEGER NOT NULL,
    player1_id          BIGINT NOT NULL,
    player2_id          BIGINT NOT NULL,
    player1_beast_id    BIGINT NOT NULL,
    player2_beast_id    BIGINT NOT NULL,
    match_type          TEXT NOT NULL,
    winner_id           BIGINT,
    loser_id            BIGINT,
    elo_change_player1  INTEGER,
    elo_change_player2  INTEGER,
    duration_seconds    INTEGER,
    action_log          JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    finished_at         TIMESTAMPTZ,
    CHECK (player1_id <> player2_id)
);

CREATE INDEX IF NOT EXISTS pvp_matches_player1 ON pvp_matches (player1_id, created_at DESC);
CREATE INDEX IF NOT EXISTS pvp_matches_player2 ON pvp_matches (player2_id, created_at DESC);

CREATE TABLE IF NOT EXISTS pvp_rankings (
    player_id       BIGINT NOT NULL,
    season_number   INTEGER NOT NULL,
    elo             INTEGER NOT NULL CHECK (elo >= 0),
    tier            TEXT NOT NULL,
    division        INTEGER,
    wins            INTEGER NOT NULL DEFAULT 0,
    losses          INTEGER NOT NULL DEFAULT 0,
    win_streak      INTEGER NOT NULL DEFAULT 0,
    peak_elo        INTEGER NOT NULL,
    peak_tier       TEXT NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (player_id, season_number)
);

CREATE INDEX IF NOT EXISTS pvp_rankings_ladder
    ON pvp_rankings (season_number, elo DESC, wins DESC, player_id);

CREATE TABLE IF NOT EXISTS pvp_challenges (
    id                  BIGSERIAL PRIMARY KEY,
    challenger_id       BIGINT NOT NULL,
    challenged_id       BIGINT NOT NULL,
    challenger_beast_id BIGINT NOT NULL,
    challenged_beast_id BIGINT,
    status              TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'accepted', 'declined', 'expired')),
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    expires_at          TIMESTAMPTZ NOT NULL,
    match_id            BIGINT REFERENCES pvp_matches(id),
    CHECK (challenger_id <> challenged_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS pvp_challenges_one_pending
    ON pvp_challenges (challenger_id, challenged_id) WHERE status = 'pending';
CREATE INDEX IF NOT EXISTS pvp_challenges_inbox
    ON pvp_challenges (challenged_id, status, created_at);
"#;

/// Idempotent; safe to run on every boot.
pub async fn run(db: &PgPool) -> PvpResult<()> {
    sqlx::raw_sql(SCHEMA_V1).execute(db).await?;
    log::info!("pvp schema up to date");
    Ok(())
}
