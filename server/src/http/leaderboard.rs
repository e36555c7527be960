// src/http/leaderboard.rs

use actix_web::{get, web, HttpResponse};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};

use crate::{error::PvpError, http::auth::JwtAuth, ranking::LeaderboardEntry, state::AppState};

const CACHE_TTL_SECS: u64 = 30;

#[derive(Deserialize)]
pub struct RankingParams {
    /// Maximum number of entries to return.
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub number: i32,
    pub name: String,
    pub stale: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResponse {
    pub rankings: Vec<LeaderboardEntry>,
    pub player_rank: Option<i64>,
    pub season: SeasonSummary,
}

pub fn cache_key(season: i32, limit: i64) -> String {
    format!("pvp:leaderboard:{season}:{limit}")
}

async fn cached(redis: &RedisClient, key: &str) -> Option<Vec<LeaderboardEntry>> {
    let mut conn = redis.get_multiplexed_async_connection().await.ok()?;
    let body: Option<String> = conn.get(key).await.ok()?;
    serde_json::from_str(&body?).ok()
}

async fn store_cache(redis: &RedisClient, key: &str, rows: &[LeaderboardEntry]) {
    let Ok(body) = serde_json::to_string(rows) else {
        return;
    };
    match redis.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let res: redis::RedisResult<()> = conn.set_ex(key, body, CACHE_TTL_SECS).await;
            if let Err(e) = res {
                log::debug!("leaderboard cache write failed: {e}");
            }
        }
        Err(e) => log::debug!("leaderboard cache unavailable: {e}"),
    }
}

/// GET /api/pvp/ranking
#[get("/pvp/ranking")]
pub async fn ranking(
    auth: JwtAuth,
    state: web::Data<AppState>,
    web::Query(params): web::Query<RankingParams>,
) -> Result<HttpResponse, PvpError> {
    let current = state.seasons.current_season().await?;
    let season = current.season.number;
    let limit = params
        .limit
        .unwrap_or(state.settings.leaderboard_limit)
        .clamp(1, state.settings.leaderboard_limit);

    // 1) Redis, if we have it
    let key = cache_key(season, limit);
    let hit = match &state.redis {
        Some(redis) => cached(redis, &key).await,
        None => None,
    };

    // 2) store, then refill the cache
    let rankings = match hit {
        Some(rows) => rows,
        None => {
            let rows = state.rankings.leaderboard(season, limit).await?;
            if let Some(redis) = &state.redis {
                store_cache(redis, &key, &rows).await;
            }
            rows
        }
    };

    let player_rank = state.rankings.player_rank(auth.player_id, season).await?;

    Ok(HttpResponse::Ok().json(RankingResponse {
        rankings,
        player_rank,
        season: SeasonSummary {
            number: season,
            name: current.season.name,
            stale: current.stale,
        },
    }))
}

/// Mounts the ranking route under `/api`
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(ranking);
}
