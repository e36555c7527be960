use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::{
    error::PvpError, game::types::QueueKind, http::auth::JwtAuth,
    matchmaking::EnqueueOutcome, state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub beast_id: i64,
    pub match_type: QueueKind,
}

/// POST /api/pvp/matchmaking/join
#[post("/pvp/matchmaking/join")]
async fn join_queue(
    auth: JwtAuth,
    info: web::Json<JoinRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let outcome = state
        .queue
        .enqueue(auth.player_id, info.beast_id, info.match_type)
        .await?;
    Ok(match outcome {
        EnqueueOutcome::Queued(entry) => HttpResponse::Ok().json(serde_json::json!({
            "status": "queued",
            "entry": entry,
        })),
        EnqueueOutcome::Matched(m) => HttpResponse::Ok().json(serde_json::json!({
            "status": "matched",
            "match": m,
        })),
    })
}

/// POST /api/pvp/matchmaking/leave
#[post("/pvp/matchmaking/leave")]
async fn leave_queue(auth: JwtAuth, state: web::Data<AppState>) -> Result<HttpResponse, PvpError> {
    let removed = state.queue.dequeue(auth.player_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "left": removed })))
}

/// GET /api/pvp/matchmaking/status
#[get("/pvp/matchmaking/status")]
async fn queue_status(auth: JwtAuth, state: web::Data<AppState>) -> Result<HttpResponse, PvpError> {
    Ok(HttpResponse::Ok().json(state.queue.status(auth.player_id).await?))
}

/// Mount
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(join_queue)
        .service(leave_queue)
        .service(queue_status);
}
