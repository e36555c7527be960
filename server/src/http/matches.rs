//! Match view, action relay, settlement and history.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::{
    error::PvpError,
    game::types::{BeastSnapshot, PvpAction},
    http::auth::JwtAuth,
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: PvpAction,
    pub beast_state: BeastSnapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub winner_id: i64,
    pub duration_seconds: i32,
}

/// GET /api/pvp/matches/history
#[get("/pvp/matches/history")]
pub async fn history(auth: JwtAuth, state: web::Data<AppState>) -> Result<HttpResponse, PvpError> {
    Ok(HttpResponse::Ok().json(state.matches.history(auth.player_id).await?))
}

/// GET /api/pvp/match/{id}
#[get("/pvp/match/{id}")]
pub async fn get_match(
    auth: JwtAuth,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let m = state
        .matches
        .get_match(path.into_inner(), auth.player_id)
        .await?;
    Ok(HttpResponse::Ok().json(m))
}

/// POST /api/pvp/match/{id}/action
#[post("/pvp/match/{id}/action")]
pub async fn action(
    auth: JwtAuth,
    path: web::Path<i64>,
    body: web::Json<ActionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let ActionRequest {
        action,
        beast_state,
    } = body.into_inner();
    // combat resolves client-side, so there is no server damage figure
    state
        .matches
        .relay_action(path.into_inner(), auth.player_id, action, &beast_state, None)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "relayed": true })))
}

/// POST /api/pvp/match/{id}/finish
#[post("/pvp/match/{id}/finish")]
pub async fn finish(
    auth: JwtAuth,
    path: web::Path<i64>,
    body: web::Json<FinishRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let m = state
        .matches
        .finish_reported_by(
            auth.player_id,
            path.into_inner(),
            body.winner_id,
            body.duration_seconds,
        )
        .await?;
    Ok(HttpResponse::Ok().json(m))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(history)
        .service(get_match)
        .service(action)
        .service(finish);
}
