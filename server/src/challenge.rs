//! Direct challenges: one player invites another to an unranked match.

use chrono::Utc;
use std::sync::Arc;

use crate::{
    config::Settings,
    db::{
        models::{ChallengeStatus, DirectChallenge, Match, NewChallenge},
        store::PvpStore,
    },
    error::{PvpError, PvpResult},
    game::lifecycle::MatchLifecycle,
    notify::ConnectionRegistry,
    protocol::ServerMsg,
    season::SeasonRegistry,
};

pub struct ChallengeService {
    store: Arc<dyn PvpStore>,
    seasons: Arc<SeasonRegistry>,
    lifecycle: Arc<MatchLifecycle>,
    notifier: Arc<ConnectionRegistry>,
    ttl: chrono::Duration,
}

impl ChallengeService {
    pub fn new(
        store: Arc<dyn PvpStore>,
        seasons: Arc<SeasonRegistry>,
        lifecycle: Arc<MatchLifecycle>,
        notifier: Arc<ConnectionRegistry>,
        settings: &Settings,
    ) -> Self {
        ChallengeService {
            store,
            seasons,
            lifecycle,
            notifier,
            ttl: settings.challenge_ttl(),
        }
    }

    async fn owned_beast(&self, player_id: i64, beast_id: i64) -> PvpResult<()> {
        match self.store.beast(beast_id).await? {
            Some(b) if b.owner_id == player_id => Ok(()),
            _ => Err(PvpError::InvalidBeast),
        }
    }

    pub async fn send(
        &self,
        challenger_id: i64,
        challenged_id: i64,
        beast_id: i64,
    ) -> PvpResult<DirectChallenge> {
        if challenger_id == challenged_id {
            return Err(PvpError::InvalidChallenge("cannot challenge yourself"));
        }
        self.owned_beast(challenger_id, beast_id).await?;

        let now = Utc::now();
        let challenge = self
            .store
            .insert_challenge(NewChallenge {
                challenger_id,
                challenged_id,
                challenger_beast_id: beast_id,
                created_at: now,
                expires_at: now + self.ttl,
            })
            .await?;
        log::info!(
            "challenge {}: {challenger_id} challenged {challenged_id}",
            challenge.id
        );
        self.notifier.notify(
            challenged_id,
            ServerMsg::ChallengeReceived {
                challenge_id: challenge.id,
                challenger_id,
                expires_at: challenge.expires_at,
            },
        );
        Ok(challenge)
    }

    /// Only the challenged player may accept, and only while pending.
    pub async fn accept(
        &self,
        challenge_id: i64,
        caller: i64,
        beast_id: i64,
    ) -> PvpResult<(DirectChallenge, Match)> {
        let now = Utc::now();
        let challenge = self.pending_for(challenge_id, caller, now).await?;
        self.owned_beast(caller, beast_id).await?;

        let season = self.seasons.current_number().await?;
        let (challenge, m) = self
            .store
            .accept_challenge(challenge.id, beast_id, season, now)
            .await?;
        for player in [challenge.challenger_id, challenge.challenged_id] {
            self.notifier.notify(
                player,
                ServerMsg::ChallengeAccepted {
                    challenge_id,
                    match_id: m.id,
                },
            );
        }
        self.lifecycle.announce(&m);
        Ok((challenge, m))
    }

    pub async fn decline(&self, challenge_id: i64, caller: i64) -> PvpResult<DirectChallenge> {
        let now = Utc::now();
        self.pending_for(challenge_id, caller, now).await?;
        let challenge = self.store.decline_challenge(challenge_id, now).await?;
        log::info!("challenge {challenge_id} declined by {caller}");
        self.notifier.notify(
            challenge.challenger_id,
            ServerMsg::ChallengeDeclined { challenge_id },
        );
        Ok(challenge)
    }

    /// Live challenges addressed to `player_id`.
    pub async fn pending(&self, player_id: i64) -> PvpResult<Vec<DirectChallenge>> {
        self.store.pending_challenges(player_id, Utc::now()).await
    }

    pub async fn expire_stale(&self) -> PvpResult<u64> {
        let n = self.store.expire_challenges(Utc::now()).await?;
        if n > 0 {
            log::debug!("expired {n} direct challenges");
        }
        Ok(n)
    }

    async fn pending_for(
        &self,
        challenge_id: i64,
        caller: i64,
        now: chrono::DateTime<Utc>,
    ) -> PvpResult<DirectChallenge> {
        let challenge = self
            .store
            .challenge(challenge_id)
            .await?
            .ok_or(PvpError::ChallengeNotFound)?;
        if challenge.challenged_id != caller {
            return Err(PvpError::ChallengeNotFound);
        }
        if challenge.status != ChallengeStatus::Pending {
            return Err(PvpError::InvalidChallenge("challenge is no longer pending"));
        }
        if challenge.expires_at <= now {
            self.store.expire_challenges(now).await?;
            return Err(PvpError::InvalidChallenge("challenge is no longer pending"));
        }
        Ok(challenge)
    }
}
