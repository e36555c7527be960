use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use pvp_server::{
    config::settings,
    db::{memory_store::MemoryStore, pg_store::PgStore, store::PvpStore},
    http, metrics,
    state::AppState,
    ws,
};
use redis::Client as RedisClient;
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    // Configuration
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
    let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());

    // Store: Postgres when configured, in-process otherwise
    let store: Arc<dyn PvpStore> = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await
                .context("creating Postgres pool")?;
            let pg = PgStore::new(db_pool);
            pg.migrate().await.context("running migrations")?;
            Arc::new(pg)
        }
        Err(_) => {
            log::warn!("DATABASE_URL not set; using the in-memory store (state is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    // Redis client (leaderboard cache); optional
    let redis_client = match RedisClient::open(redis_url.as_str()) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("invalid REDIS_URL ({e}); leaderboard cache disabled");
            None
        }
    };

    let state = AppState::new(store, settings().clone(), redis_client);

    // Start the background matchmaking sweep
    state.sweeper().start();

    // Start HTTP + WS server
    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(metrics::METRICS.clone())
            .app_data(data.clone())
            .configure(http::routes::init_routes)
            .configure(ws::routes::init_routes)
    })
    .bind(&server_addr)
    .with_context(|| format!("binding {server_addr}"))?
    .run()
    .await?;
    Ok(())
}
