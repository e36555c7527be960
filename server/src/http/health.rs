//! Simple liveness / readiness probe

use actix_web::{get, web, HttpResponse, Responder};
use redis::AsyncCommands;

use crate::state::AppState;

#[get("/healthz")]
pub async fn healthz(state: web::Data<AppState>) -> impl Responder {
    // Check the store
    if let Err(e) = state.store.ping().await {
        log::warn!("healthz: store check failed: {e}");
        return HttpResponse::ServiceUnavailable().body("db");
    }

    // Check Redis, when configured
    if let Some(redis) = &state.redis {
        let mut conn = match redis.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(_) => return HttpResponse::ServiceUnavailable().body("redis"),
        };
        // Annotate ping return type so compiler can infer RV
        if conn.ping::<String>().await.is_err() {
            return HttpResponse::ServiceUnavailable().body("redis");
        }
    }

    HttpResponse::Ok().body("ok")
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
