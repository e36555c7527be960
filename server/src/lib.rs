pub mod challenge;
pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod notify;
pub mod protocol;
pub mod ranking;
pub mod season;
pub mod state;

pub mod db {
    pub mod challenge_repo;
    pub mod match_repo;
    pub mod memory_store;
    pub mod migrations;
    pub mod models;
    pub mod pg_store;
    pub mod queue_repo;
    pub mod ranking_repo;
    pub mod season_repo;
    pub mod store;
}

pub mod game {
    pub mod lifecycle;
    pub mod rewards;
    pub mod scoring;
    pub mod tier;
    pub mod types;
    pub mod validation;
}

pub mod http {
    pub mod auth;
    pub mod challenges;
    pub mod health;
    pub mod leaderboard;
    pub mod matches;
    pub mod matchmaking;
    pub mod routes;
    pub mod season;
}

pub mod ws {
    pub mod index;
    pub mod routes;
}
