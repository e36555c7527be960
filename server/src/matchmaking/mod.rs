//! Matchmaking queue: one live entry per player, ranked or casual.
//
//  Ranked entries carry the player's ELO/tier as of enqueue time; pairing
//  compares those snapshots, so a rating that moves while queued does not
//  change who the entry can meet. Expired entries are invisible to pairing
//  and removed by the sweep.

pub mod sweep;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashSet, sync::Arc};

use crate::{
    config::Settings,
    db::{
        models::{Match, NewQueueEntry, QueueEntry},
        store::PvpStore,
    },
    error::{PvpError, PvpResult},
    game::{lifecycle::MatchLifecycle, types::QueueKind},
    metrics,
    notify::ConnectionRegistry,
    protocol::ServerMsg,
    ranking::RankingEngine,
    season::SeasonRegistry,
};

/// Expanding ±ELO window used by ranked search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: i32,
    pub step: i32,
    pub max: i32,
}

impl Default for SearchWindow {
    fn default() -> Self {
        SearchWindow {
            start: 100,
            step: 50,
            max: 500,
        }
    }
}

impl SearchWindow {
    pub fn from_settings(s: &Settings) -> Self {
        SearchWindow {
            start: s.search_window_start,
            step: s.search_window_step.max(1),
            max: s.search_window_max.max(s.search_window_start),
        }
    }

    /// Successive half-widths: start, start+step, … capped at max.
    pub fn widths(&self) -> impl Iterator<Item = i32> {
        let (start, step, max) = (self.start, self.step, self.max);
        std::iter::successors(Some(start), move |w| {
            (*w < max).then(|| (w + step).min(max))
        })
    }
}

/// Closest snapshot ELO to `elo`; ties go to the earliest queued entry.
pub fn pick_closest(elo: i32, candidates: Vec<QueueEntry>) -> Option<QueueEntry> {
    candidates.into_iter().min_by_key(|c| {
        let snap = c.elo_snapshot.unwrap_or(elo);
        ((snap - elo).abs(), c.queued_at, c.id)
    })
}

/// A compatible opponent and, for ranked search, the window it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct Opponent {
    pub entry: QueueEntry,
    pub window: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// Waiting for the sweep.
    Queued(QueueEntry),
    /// An opponent was already waiting; the match exists.
    Matched(Match),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub in_queue: bool,
    pub status: &'static str,
    pub match_type: Option<QueueKind>,
    pub queued_at: Option<DateTime<Utc>>,
    pub waited_seconds: Option<i64>,
}

pub struct MatchmakingQueue {
    store: Arc<dyn PvpStore>,
    seasons: Arc<SeasonRegistry>,
    rankings: Arc<RankingEngine>,
    lifecycle: Arc<MatchLifecycle>,
    notifier: Arc<ConnectionRegistry>,
    window: SearchWindow,
    ttl: chrono::Duration,
}

impl MatchmakingQueue {
    pub fn new(
        store: Arc<dyn PvpStore>,
        seasons: Arc<SeasonRegistry>,
        rankings: Arc<RankingEngine>,
        lifecycle: Arc<MatchLifecycle>,
        notifier: Arc<ConnectionRegistry>,
        settings: &Settings,
    ) -> Self {
        MatchmakingQueue {
            store,
            seasons,
            rankings,
            lifecycle,
            notifier,
            window: SearchWindow::from_settings(settings),
            ttl: settings.queue_ttl(),
        }
    }

    pub async fn enqueue(
        &self,
        player_id: i64,
        beast_id: i64,
        kind: QueueKind,
    ) -> PvpResult<EnqueueOutcome> {
        let beast = self
            .store
            .beast(beast_id)
            .await?
            .filter(|b| b.owner_id == player_id)
            .ok_or(PvpError::InvalidBeast)?;

        let now = Utc::now();
        if self.store.queue_entry(player_id, now).await?.is_some() {
            return Err(PvpError::AlreadyQueued);
        }

        let (elo_snapshot, tier_snapshot) = match kind {
            QueueKind::Ranked => {
                let season = self.seasons.current_number().await?;
                let ranking = self.rankings.get_or_create_ranking(player_id, season).await?;
                (Some(ranking.elo), Some(ranking.tier))
            }
            QueueKind::Casual => (None, None),
        };

        let entry = self
            .store
            .insert_queue_entry(NewQueueEntry {
                player_id,
                beast_id: beast.id,
                kind,
                elo_snapshot,
                tier_snapshot,
                queued_at: now,
                expires_at: now + self.ttl,
            })
            .await?;
        log::info!(
            "player {player_id} queued ({}) with beast {beast_id}",
            kind.as_str()
        );

        // Someone compatible may already be waiting; don't make both wait a tick.
        match self.try_pair(&entry, &HashSet::new()).await {
            Ok(Some(m)) => return Ok(EnqueueOutcome::Matched(m)),
            Ok(None) => {}
            Err(e) => log::warn!("inline pairing for player {player_id} failed: {e}"),
        }

        self.notifier.notify(
            player_id,
            ServerMsg::QueueJoined {
                match_type: kind,
                queued_at: entry.queued_at,
                expires_at: entry.expires_at,
            },
        );
        Ok(EnqueueOutcome::Queued(entry))
    }

    /// Idempotent: leaving when not queued is not an error.
    pub async fn dequeue(&self, player_id: i64) -> PvpResult<bool> {
        let removed = self.store.delete_queue_entry(player_id).await?;
        if removed {
            log::info!("player {player_id} left the queue");
        }
        Ok(removed)
    }

    pub async fn status(&self, player_id: i64) -> PvpResult<QueueStatus> {
        let now = Utc::now();
        Ok(match self.store.queue_entry(player_id, now).await? {
            Some(e) => QueueStatus {
                in_queue: true,
                status: "queued",
                match_type: Some(e.kind),
                queued_at: Some(e.queued_at),
                waited_seconds: Some((now - e.queued_at).num_seconds()),
            },
            None => QueueStatus {
                in_queue: false,
                status: "idle",
                match_type: None,
                queued_at: None,
                waited_seconds: None,
            },
        })
    }

    pub async fn live_entries(
        &self,
        kind: QueueKind,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>> {
        self.store.live_entries(kind, now).await
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> PvpResult<u64> {
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            metrics::QUEUE_PURGED.inc_by(purged);
            log::debug!("purged {purged} expired queue entries");
        }
        Ok(purged)
    }

    /// Searches for a partner for `entry`, skipping players in `exclude`.
    pub async fn find_opponent(
        &self,
        entry: &QueueEntry,
        exclude: &HashSet<i64>,
    ) -> PvpResult<Option<Opponent>> {
        let now = Utc::now();
        match entry.kind {
            QueueKind::Ranked => {
                let elo = entry
                    .elo_snapshot
                    .unwrap_or_else(|| self.rankings.starting_elo());
                for width in self.window.widths() {
                    let candidates: Vec<QueueEntry> = self
                        .store
                        .ranked_candidates(entry.player_id, elo - width, elo + width, now)
                        .await?
                        .into_iter()
                        .filter(|c| !exclude.contains(&c.player_id))
                        .collect();
                    if let Some(best) = pick_closest(elo, candidates) {
                        return Ok(Some(Opponent {
                            entry: best,
                            window: Some(width),
                        }));
                    }
                }
                Ok(None)
            }
            QueueKind::Casual => Ok(self
                .store
                .live_entries(QueueKind::Casual, now)
                .await?
                .into_iter()
                .find(|c| c.player_id != entry.player_id && !exclude.contains(&c.player_id))
                .map(|entry| Opponent {
                    entry,
                    window: None,
                })),
        }
    }

    /// Finds an opponent and turns the pair into a match. `Ok(None)` when no
    /// one fits or when another pass consumed one of the entries first.
    pub async fn try_pair(
        &self,
        entry: &QueueEntry,
        exclude: &HashSet<i64>,
    ) -> PvpResult<Option<Match>> {
        let Some(opponent) = self.find_opponent(entry, exclude).await? else {
            return Ok(None);
        };
        let season = self.seasons.current_number().await?;
        match self
            .lifecycle
            .create_from_queue(entry, &opponent.entry, season)
            .await
        {
            Ok(m) => Ok(Some(m)),
            Err(PvpError::NotInQueue) => {
                log::debug!(
                    "pairing {} with {} lost a race; skipping",
                    entry.player_id,
                    opponent.entry.player_id
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
