//! Service graph shared by HTTP handlers, the WS endpoint and the sweep.

use redis::Client as RedisClient;
use std::sync::Arc;

use crate::{
    challenge::ChallengeService,
    config::Settings,
    db::store::PvpStore,
    game::lifecycle::MatchLifecycle,
    matchmaking::{sweep::Sweeper, MatchmakingQueue},
    notify::ConnectionRegistry,
    ranking::RankingEngine,
    season::SeasonRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PvpStore>,
    pub settings: Settings,
    pub notifier: Arc<ConnectionRegistry>,
    pub seasons: Arc<SeasonRegistry>,
    pub rankings: Arc<RankingEngine>,
    pub matches: Arc<MatchLifecycle>,
    pub queue: Arc<MatchmakingQueue>,
    pub challenges: Arc<ChallengeService>,
    /// Leaderboard cache; the API works without it.
    pub redis: Option<RedisClient>,
}

impl AppState {
    pub fn new(store: Arc<dyn PvpStore>, settings: Settings, redis: Option<RedisClient>) -> Self {
        let notifier = Arc::new(ConnectionRegistry::new());
        let seasons = Arc::new(SeasonRegistry::new(
            store.clone(),
            settings.season_cache_ttl(),
        ));
        let rankings = Arc::new(RankingEngine::new(store.clone(), settings.starting_elo));
        let matches = Arc::new(MatchLifecycle::new(
            store.clone(),
            rankings.clone(),
            seasons.clone(),
            notifier.clone(),
            &settings,
        ));
        let queue = Arc::new(MatchmakingQueue::new(
            store.clone(),
            seasons.clone(),
            rankings.clone(),
            matches.clone(),
            notifier.clone(),
            &settings,
        ));
        let challenges = Arc::new(ChallengeService::new(
            store.clone(),
            seasons.clone(),
            matches.clone(),
            notifier.clone(),
            &settings,
        ));
        AppState {
            store,
            settings,
            notifier,
            seasons,
            rankings,
            matches,
            queue,
            challenges,
            redis,
        }
    }

    pub fn sweeper(&self) -> Arc<Sweeper> {
        Arc::new(Sweeper::new(
            self.queue.clone(),
            self.challenges.clone(),
            &self.settings,
        ))
    }
}
