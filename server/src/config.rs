//! Runtime configuration for the PVP server.

use once_cell::sync::Lazy;
use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Seconds between two matchmaking sweeps.
    pub sweep_interval: u64,
    /// Lifetime of a queue entry (seconds).
    pub queue_ttl: u64,
    /// Rating given to a player on first access in a season.
    pub starting_elo: i32,
    /// ELO K-factor.
    pub k_factor: f64,
    /// Initial ranked search window (± ELO).
    pub search_window_start: i32,
    /// Window growth per failed attempt.
    pub search_window_step: i32,
    /// Window cap.
    pub search_window_max: i32,
    /// How long the active season is served from cache (seconds).
    pub season_cache_ttl: u64,
    /// Consecutive connection failures before the sweep pauses.
    pub sweep_max_failures: u32,
    /// Length of a sweep pause (seconds).
    pub sweep_pause: u64,
    /// Lifetime of a pending direct challenge (seconds).
    pub challenge_ttl: u64,
    /// Essence a beast needs to fire any technique.
    pub min_technique_essence: i32,
    /// Accepted |server - reported| damage difference.
    pub damage_tolerance: i32,
    /// Number of rows served by the leaderboard.
    pub leaderboard_limit: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            sweep_interval: 10,
            queue_ttl: 5 * 60,
            starting_elo: 1000,
            k_factor: 32.0,
            search_window_start: 100,
            search_window_step: 50,
            search_window_max: 500,
            season_cache_ttl: 30,
            sweep_max_failures: 5,
            sweep_pause: 5 * 60,
            challenge_ttl: 5 * 60,
            min_technique_essence: 10,
            damage_tolerance: 5,
            leaderboard_limit: 100,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Settings::default();
        Settings {
            sweep_interval: env_or("SWEEP_INTERVAL_SECS", d.sweep_interval).max(1),
            queue_ttl: env_or("QUEUE_TTL_SECS", d.queue_ttl),
            starting_elo: env_or("STARTING_ELO", d.starting_elo),
            k_factor: env_or("ELO_K_FACTOR", d.k_factor),
            search_window_start: d.search_window_start,
            search_window_step: d.search_window_step,
            search_window_max: d.search_window_max,
            season_cache_ttl: env_or("SEASON_CACHE_TTL_SECS", d.season_cache_ttl),
            sweep_max_failures: env_or("SWEEP_MAX_FAILURES", d.sweep_max_failures).max(1),
            sweep_pause: env_or("SWEEP_PAUSE_SECS", d.sweep_pause),
            challenge_ttl: env_or("CHALLENGE_TTL_SECS", d.challenge_ttl),
            min_technique_essence: env_or("MIN_TECHNIQUE_ESSENCE", d.min_technique_essence),
            damage_tolerance: env_or("DAMAGE_TOLERANCE", d.damage_tolerance),
            leaderboard_limit: env_or("LEADERBOARD_LIMIT", d.leaderboard_limit),
        }
    }

    pub fn queue_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.queue_ttl as i64)
    }

    pub fn challenge_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.challenge_ttl as i64)
    }

    pub fn season_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.season_cache_ttl)
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
