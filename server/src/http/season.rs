use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

use crate::{error::PvpError, http::auth::JwtAuth, state::AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsQuery {
    pub season_number: i32,
}

/// GET /api/pvp/season/current
#[get("/pvp/season/current")]
pub async fn current(state: web::Data<AppState>) -> Result<HttpResponse, PvpError> {
    Ok(HttpResponse::Ok().json(state.seasons.current_season().await?))
}

/// GET /api/pvp/season/rewards?seasonNumber=N
#[get("/pvp/season/rewards")]
pub async fn rewards(
    auth: JwtAuth,
    web::Query(q): web::Query<RewardsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let reward = state
        .seasons
        .player_season_reward(q.season_number, auth.player_id)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "seasonNumber": q.season_number,
        "reward": reward,
    })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(current).service(rewards);
}
