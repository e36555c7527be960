//! Direct challenge endpoints.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;

use crate::{error::PvpError, http::auth::JwtAuth, state::AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub challenged_id: i64,
    pub beast_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub challenge_id: i64,
    pub beast_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclineRequest {
    pub challenge_id: i64,
}

#[post("/pvp/challenge/send")]
async fn send(
    auth: JwtAuth,
    body: web::Json<SendRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let challenge = state
        .challenges
        .send(auth.player_id, body.challenged_id, body.beast_id)
        .await?;
    Ok(HttpResponse::Ok().json(challenge))
}

#[post("/pvp/challenge/accept")]
async fn accept(
    auth: JwtAuth,
    body: web::Json<AcceptRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let (challenge, m) = state
        .challenges
        .accept(body.challenge_id, auth.player_id, body.beast_id)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "challenge": challenge,
        "match": m,
    })))
}

#[post("/pvp/challenge/decline")]
async fn decline(
    auth: JwtAuth,
    body: web::Json<DeclineRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, PvpError> {
    let challenge = state
        .challenges
        .decline(body.challenge_id, auth.player_id)
        .await?;
    Ok(HttpResponse::Ok().json(challenge))
}

#[get("/challenges/pending")]
async fn pending(auth: JwtAuth, state: web::Data<AppState>) -> Result<HttpResponse, PvpError> {
    Ok(HttpResponse::Ok().json(state.challenges.pending(auth.player_id).await?))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(send)
        .service(accept)
        .service(decline)
        .service(pending);
}
