//! Match lifecycle: creation, action relay, settlement.
//!
//! A match is created unfinished and settled exactly once. Settlement is a
//! single store unit (finish + ELO + rewards); a second attempt fails with
//! `AlreadyFinished` before anything is recomputed.

use chrono::Utc;
use std::sync::Arc;

use crate::{
    config::Settings,
    db::{
        models::{
            ActionLogEntry, EloRules, Match, NewMatch, QueueEntry, RankedSettlement, Settlement,
        },
        store::{PvpStore, QueueRemoval},
    },
    error::{PvpError, PvpResult},
    game::{
        rewards::{compute_rewards, RewardContext},
        types::{BeastSnapshot, MatchType, PvpAction},
        validation::{validate_action, ValidationRules},
    },
    metrics,
    notify::ConnectionRegistry,
    protocol::{OpponentInfo, ServerMsg},
    ranking::RankingEngine,
    season::SeasonRegistry,
};

/// Beasts the store cannot resolve any more are paid as level 1.
const FALLBACK_BEAST_LEVEL: i32 = 1;

/// Matches shown by the history endpoint.
pub const HISTORY_LIMIT: i64 = 20;

pub struct MatchLifecycle {
    store: Arc<dyn PvpStore>,
    rankings: Arc<RankingEngine>,
    seasons: Arc<SeasonRegistry>,
    notifier: Arc<ConnectionRegistry>,
    rules: ValidationRules,
    elo: EloRules,
}

impl MatchLifecycle {
    pub fn new(
        store: Arc<dyn PvpStore>,
        rankings: Arc<RankingEngine>,
        seasons: Arc<SeasonRegistry>,
        notifier: Arc<ConnectionRegistry>,
        settings: &Settings,
    ) -> Self {
        MatchLifecycle {
            store,
            rankings,
            seasons,
            notifier,
            rules: ValidationRules::from(settings),
            elo: EloRules {
                k_factor: settings.k_factor,
                starting_elo: settings.starting_elo,
            },
        }
    }

    /// Pairs two queue entries; both must still be live or nothing happens.
    pub async fn create_from_queue(
        &self,
        a: &QueueEntry,
        b: &QueueEntry,
        season_number: i32,
    ) -> PvpResult<Match> {
        let m = self
            .store
            .create_match(
                NewMatch {
                    season_number,
                    player1_id: a.player_id,
                    player2_id: b.player_id,
                    player1_beast_id: a.beast_id,
                    player2_beast_id: b.beast_id,
                    match_type: MatchType::from(a.kind),
                },
                QueueRemoval::Required,
            )
            .await?;

        for (me, them, beast) in [
            (m.player1_id, m.player2_id, m.player2_beast_id),
            (m.player2_id, m.player1_id, m.player1_beast_id),
        ] {
            self.notifier.notify(
                me,
                ServerMsg::MatchFound {
                    match_id: m.id,
                    opponent: OpponentInfo {
                        player_id: them,
                        beast_id: beast,
                    },
                },
            );
        }
        self.announce(&m);
        Ok(m)
    }

    /// Bookkeeping for a match that already exists in the store.
    pub fn announce(&self, m: &Match) {
        metrics::MATCHES_CREATED.inc();
        log::info!(
            "match {} created ({}): {} vs {} in season {}",
            m.id,
            m.match_type.as_str(),
            m.player1_id,
            m.player2_id,
            m.season_number
        );
        let start = ServerMsg::MatchStart {
            match_id: m.id,
            match_type: m.match_type,
            player1_id: m.player1_id,
            player2_id: m.player2_id,
            player1_beast_id: m.player1_beast_id,
            player2_beast_id: m.player2_beast_id,
        };
        self.notifier.notify(m.player1_id, start.clone());
        self.notifier.notify(m.player2_id, start);
    }

    /// Participant-only read. Unknown ids and other players' matches get the
    /// same rejection.
    pub async fn get_match(&self, match_id: i64, caller: i64) -> PvpResult<Match> {
        match self.store.get_match(match_id).await? {
            Some(m) if m.is_participant(caller) => Ok(m),
            _ => Err(PvpError::NotAParticipant),
        }
    }

    pub async fn history(&self, player_id: i64) -> PvpResult<Vec<Match>> {
        self.store.match_history(player_id, HISTORY_LIMIT).await
    }

    /// Validates, logs and forwards one action to the opponent.
    /// `server_damage` is checked against the reported damage when given.
    pub async fn relay_action(
        &self,
        match_id: i64,
        from_player: i64,
        action: PvpAction,
        beast_state: &BeastSnapshot,
        server_damage: Option<i32>,
    ) -> PvpResult<()> {
        let m = self.get_match(match_id, from_player).await?;
        if m.is_finished() {
            return Err(PvpError::AlreadyFinished);
        }
        let (Some(opponent), Some(beast_id)) = (m.opponent_of(from_player), m.beast_of(from_player))
        else {
            return Err(PvpError::NotAParticipant);
        };

        validate_action(&action, beast_state, beast_id, server_damage, &self.rules)?;

        self.store
            .append_action(
                match_id,
                ActionLogEntry {
                    player_id: from_player,
                    action: action.clone(),
                    at: Utc::now(),
                },
            )
            .await?;

        self.notifier.notify(
            opponent,
            ServerMsg::MatchAction {
                match_id,
                action,
                from_player,
            },
        );
        Ok(())
    }

    /// Finish requested over the API: the caller must be in the match.
    pub async fn finish_reported_by(
        &self,
        reporter: i64,
        match_id: i64,
        winner_id: i64,
        duration_seconds: i32,
    ) -> PvpResult<Match> {
        self.get_match(match_id, reporter).await?;
        self.finish_match(match_id, winner_id, duration_seconds).await
    }

    pub async fn finish_match(
        &self,
        match_id: i64,
        winner_id: i64,
        duration_seconds: i32,
    ) -> PvpResult<Match> {
        let m = self
            .store
            .get_match(match_id)
            .await?
            .ok_or(PvpError::MatchNotFound)?;
        if m.is_finished() {
            return Err(PvpError::AlreadyFinished);
        }
        let Some(loser_id) = m.opponent_of(winner_id) else {
            return Err(PvpError::InvalidWinner);
        };
        if duration_seconds < 0 {
            return Err(PvpError::invalid_request("duration must not be negative"));
        }

        // Ranked results always land on the ladder of the running season,
        // even when the match was created before a rollover.
        let (loser_tier, elo) = if m.match_type == MatchType::Ranked {
            let season_number = self.seasons.current_number().await?;
            // Both rows must exist before the store locks them.
            self.rankings
                .get_or_create_ranking(winner_id, season_number)
                .await?;
            let loser = self
                .rankings
                .get_or_create_ranking(loser_id, season_number)
                .await?;
            (
                Some(loser.tier),
                Some(RankedSettlement {
                    season_number,
                    rules: self.elo,
                }),
            )
        } else {
            (None, None)
        };

        let ctx = RewardContext {
            loser_tier,
            winner_beast_level: self.beast_level(m.beast_of(winner_id)).await?,
            loser_beast_level: self.beast_level(m.beast_of(loser_id)).await?,
        };
        let rewards = compute_rewards(&m, winner_id, &ctx, &mut rand::rng());

        let settled = self
            .store
            .settle_match(Settlement {
                match_id,
                winner_id,
                duration_seconds,
                finished_at: Utc::now(),
                player1_rewards: rewards.player1,
                player2_rewards: rewards.player2,
                elo,
            })
            .await?;

        metrics::MATCHES_FINISHED.inc();
        log::info!(
            "match {match_id} finished: {winner_id} beat {loser_id} in {duration_seconds}s (elo {:?}/{:?})",
            settled.elo_change_player1,
            settled.elo_change_player2
        );

        for player in [settled.player1_id, settled.player2_id] {
            self.notifier.notify(
                player,
                ServerMsg::MatchState {
                    match_id,
                    finished: true,
                    winner_id: settled.winner_id,
                    loser_id: settled.loser_id,
                    elo_change: settled.elo_change_of(player),
                    rewards: rewards.for_player(&settled, player),
                    duration_seconds: settled.duration_seconds,
                },
            );
        }
        Ok(settled)
    }

    async fn beast_level(&self, beast_id: Option<i64>) -> PvpResult<i32> {
        let Some(id) = beast_id else {
            return Ok(FALLBACK_BEAST_LEVEL);
        };
        Ok(self
            .store
            .beast(id)
            .await?
            .map_or(FALLBACK_BEAST_LEVEL, |b| b.level))
    }
}
