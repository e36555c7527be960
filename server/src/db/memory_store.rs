//! In-process `PvpStore`.
//!
//! Used when no `DATABASE_URL` is configured and by the test-suite. All state
//! sits behind one mutex, so every trait call is trivially atomic. Outages can
//! be injected to exercise the degraded paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::{
    db::{
        models::{
            ActionLogEntry, BeastRef, ChallengeStatus, DirectChallenge, Match, NewChallenge,
            NewMatch, NewQueueEntry, PlayerRanking, QueueEntry, RankedSettlement, Season,
            SeasonStatus, Settlement,
        },
        store::{PvpStore, QueueRemoval},
    },
    error::{Outage, PvpError, PvpResult},
    game::types::{MatchType, QueueKind},
    ranking::{apply_result, compute_elo_delta, new_ranking},
    season::season_name,
};

#[derive(Default)]
struct Inner {
    outage: Option<Outage>,
    currency: HashMap<i64, i64>,
    beasts: HashMap<i64, BeastRef>,
    experience: HashMap<i64, i64>,
    queue: HashMap<i64, QueueEntry>,
    matches: BTreeMap<i64, Match>,
    rankings: HashMap<(i64, i32), PlayerRanking>,
    seasons: BTreeMap<i32, Season>,
    challenges: BTreeMap<i64, DirectChallenge>,
    next_id: i64,
    ranking_writes: u64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active_season(&self) -> Option<&Season> {
        self.seasons
            .values()
            .find(|s| s.status == SeasonStatus::Active)
    }

    fn ladder(&self, season_number: i32) -> Vec<&PlayerRanking> {
        let mut rows: Vec<&PlayerRanking> = self
            .rankings
            .values()
            .filter(|r| r.season_number == season_number)
            .collect();
        rows.sort_by(|a, b| {
            b.elo
                .cmp(&a.elo)
                .then(b.wins.cmp(&a.wins))
                .then(a.player_id.cmp(&b.player_id))
        });
        rows
    }

    fn insert_match(&mut self, new: NewMatch) -> Match {
        let id = self.next_id();
        let m = Match {
            id,
            season_number: new.season_number,
            player1_id: new.player1_id,
            player2_id: new.player2_id,
            player1_beast_id: new.player1_beast_id,
            player2_beast_id: new.player2_beast_id,
            match_type: new.match_type,
            winner_id: None,
            loser_id: None,
            elo_change_player1: None,
            elo_change_player2: None,
            duration_seconds: None,
            action_log: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        };
        self.matches.insert(id, m.clone());
        m
    }

    fn ranking_entry(&mut self, player_id: i64, season_number: i32, starting_elo: i32) -> PlayerRanking {
        self.rankings
            .entry((player_id, season_number))
            .or_insert_with(|| new_ranking(player_id, season_number, starting_elo))
            .clone()
    }

    fn credit(&mut self, player_id: i64, beast_id: i64, currency: i64, experience: i64) {
        *self.currency.entry(player_id).or_default() += currency;
        if self.beasts.contains_key(&beast_id) {
            *self.experience.entry(beast_id).or_default() += experience;
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `StoreUnavailable(o)` while set.
    pub fn set_outage(&self, outage: Option<Outage>) {
        self.inner.lock().outage = outage;
    }

    pub fn insert_beast(&self, owner_id: i64, level: i32) -> BeastRef {
        let mut inner = self.inner.lock();
        let id = inner.next_id();
        let beast = BeastRef {
            id,
            owner_id,
            level,
        };
        inner.beasts.insert(id, beast);
        beast
    }

    pub fn insert_season(&self, season: Season) {
        self.inner.lock().seasons.insert(season.number, season);
    }

    /// Moves a queue entry's expiry, e.g. into the past.
    pub fn set_queue_expiry(&self, player_id: i64, expires_at: DateTime<Utc>) -> bool {
        match self.inner.lock().queue.get_mut(&player_id) {
            Some(e) => {
                e.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    pub fn set_challenge_expiry(&self, challenge_id: i64, expires_at: DateTime<Utc>) -> bool {
        match self.inner.lock().challenges.get_mut(&challenge_id) {
            Some(c) => {
                c.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Raw queue size, dead entries included.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn player_currency(&self, player_id: i64) -> i64 {
        self.inner.lock().currency.get(&player_id).copied().unwrap_or(0)
    }

    pub fn beast_experience(&self, beast_id: i64) -> i64 {
        self.inner.lock().experience.get(&beast_id).copied().unwrap_or(0)
    }

    /// How many settlements have written ranking rows.
    pub fn ranking_writes(&self) -> u64 {
        self.inner.lock().ranking_writes
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> PvpResult<T>) -> PvpResult<T> {
        let mut inner = self.inner.lock();
        if let Some(o) = inner.outage {
            return Err(PvpError::StoreUnavailable(o));
        }
        f(&mut inner)
    }
}

#[async_trait]
impl PvpStore for MemoryStore {
    async fn ping(&self) -> PvpResult<()> {
        self.with(|_| Ok(()))
    }

    async fn beast(&self, beast_id: i64) -> PvpResult<Option<BeastRef>> {
        self.with(|i| Ok(i.beasts.get(&beast_id).copied()))
    }

    async fn insert_queue_entry(&self, e: NewQueueEntry) -> PvpResult<QueueEntry> {
        self.with(|i| {
            if i.queue
                .get(&e.player_id)
                .is_some_and(|old| !old.is_expired(e.queued_at))
            {
                return Err(PvpError::AlreadyQueued);
            }
            let entry = QueueEntry {
                id: i.next_id(),
                player_id: e.player_id,
                beast_id: e.beast_id,
                kind: e.kind,
                elo_snapshot: e.elo_snapshot,
                tier_snapshot: e.tier_snapshot,
                queued_at: e.queued_at,
                expires_at: e.expires_at,
            };
            i.queue.insert(e.player_id, entry.clone());
            Ok(entry)
        })
    }

    async fn queue_entry(
        &self,
        player_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<Option<QueueEntry>> {
        self.with(|i| {
            Ok(i.queue
                .get(&player_id)
                .filter(|e| !e.is_expired(now))
                .cloned())
        })
    }

    async fn delete_queue_entry(&self, player_id: i64) -> PvpResult<bool> {
        self.with(|i| Ok(i.queue.remove(&player_id).is_some()))
    }

    async fn live_entries(
        &self,
        kind: QueueKind,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>> {
        self.with(|i| {
            let mut rows: Vec<QueueEntry> = i
                .queue
                .values()
                .filter(|e| e.kind == kind && !e.is_expired(now))
                .cloned()
                .collect();
            rows.sort_by_key(|e| (e.queued_at, e.id));
            Ok(rows)
        })
    }

    async fn ranked_candidates(
        &self,
        exclude_player: i64,
        min_elo: i32,
        max_elo: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<QueueEntry>> {
        self.with(|i| {
            let mut rows: Vec<QueueEntry> = i
                .queue
                .values()
                .filter(|e| {
                    e.kind == QueueKind::Ranked
                        && e.player_id != exclude_player
                        && !e.is_expired(now)
                        && e.elo_snapshot
                            .is_some_and(|elo| (min_elo..=max_elo).contains(&elo))
                })
                .cloned()
                .collect();
            rows.sort_by_key(|e| (e.queued_at, e.id));
            Ok(rows)
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> PvpResult<u64> {
        self.with(|i| {
            let before = i.queue.len();
            i.queue.retain(|_, e| !e.is_expired(now));
            Ok((before - i.queue.len()) as u64)
        })
    }

    async fn create_match(&self, new: NewMatch, removal: QueueRemoval) -> PvpResult<Match> {
        self.with(|i| {
            let players = [new.player1_id, new.player2_id];
            if removal == QueueRemoval::Required {
                let now = Utc::now();
                let both_live = players.iter().all(|p| {
                    i.queue
                        .get(p)
                        .is_some_and(|e| !e.is_expired(now))
                });
                if !both_live {
                    return Err(PvpError::NotInQueue);
                }
            }
            for p in players {
                i.queue.remove(&p);
            }
            Ok(i.insert_match(new))
        })
    }

    async fn get_match(&self, match_id: i64) -> PvpResult<Option<Match>> {
        self.with(|i| Ok(i.matches.get(&match_id).cloned()))
    }

    async fn append_action(&self, match_id: i64, entry: ActionLogEntry) -> PvpResult<()> {
        self.with(|i| {
            let m = i.matches.get_mut(&match_id).ok_or(PvpError::MatchNotFound)?;
            if m.is_finished() {
                return Err(PvpError::AlreadyFinished);
            }
            m.action_log.push(entry);
            Ok(())
        })
    }

    async fn settle_match(&self, s: Settlement) -> PvpResult<Match> {
        self.with(|i| {
            let m = i
                .matches
                .get(&s.match_id)
                .cloned()
                .ok_or(PvpError::MatchNotFound)?;
            if m.is_finished() {
                return Err(PvpError::AlreadyFinished);
            }
            let loser_id = m.opponent_of(s.winner_id).ok_or(PvpError::InvalidWinner)?;

            let (change1, change2) = match s.elo {
                Some(RankedSettlement {
                    season_number,
                    rules,
                }) => {
                    let winner = i.ranking_entry(s.winner_id, season_number, rules.starting_elo);
                    let loser = i.ranking_entry(loser_id, season_number, rules.starting_elo);
                    let (wd, ld) = compute_elo_delta(winner.elo, loser.elo, rules.k_factor);
                    i.rankings
                        .insert((s.winner_id, season_number), apply_result(&winner, wd, true));
                    i.rankings
                        .insert((loser_id, season_number), apply_result(&loser, ld, false));
                    i.ranking_writes += 1;
                    if s.winner_id == m.player1_id {
                        (Some(wd), Some(ld))
                    } else {
                        (Some(ld), Some(wd))
                    }
                }
                None => (None, None),
            };

            i.credit(
                m.player1_id,
                m.player1_beast_id,
                s.player1_rewards.currency,
                s.player1_rewards.experience,
            );
            i.credit(
                m.player2_id,
                m.player2_beast_id,
                s.player2_rewards.currency,
                s.player2_rewards.experience,
            );

            let settled = Match {
                winner_id: Some(s.winner_id),
                loser_id: Some(loser_id),
                elo_change_player1: change1,
                elo_change_player2: change2,
                duration_seconds: Some(s.duration_seconds),
                finished_at: Some(s.finished_at),
                ..m
            };
            i.matches.insert(settled.id, settled.clone());
            Ok(settled)
        })
    }

    async fn match_history(&self, player_id: i64, limit: i64) -> PvpResult<Vec<Match>> {
        self.with(|i| {
            let mut rows: Vec<Match> = i
                .matches
                .values()
                .filter(|m| m.is_participant(player_id))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        })
    }

    async fn get_or_create_ranking(
        &self,
        player_id: i64,
        season_number: i32,
        starting_elo: i32,
    ) -> PvpResult<PlayerRanking> {
        self.with(|i| Ok(i.ranking_entry(player_id, season_number, starting_elo)))
    }

    async fn ranking(
        &self,
        player_id: i64,
        season_number: i32,
    ) -> PvpResult<Option<PlayerRanking>> {
        self.with(|i| Ok(i.rankings.get(&(player_id, season_number)).cloned()))
    }

    async fn leaderboard(&self, season_number: i32, limit: i64) -> PvpResult<Vec<PlayerRanking>> {
        self.with(|i| {
            Ok(i.ladder(season_number)
                .into_iter()
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        })
    }

    async fn player_rank(&self, player_id: i64, season_number: i32) -> PvpResult<Option<i64>> {
        self.with(|i| {
            Ok(i.ladder(season_number)
                .iter()
                .position(|r| r.player_id == player_id)
                .map(|p| p as i64 + 1))
        })
    }

    async fn active_season(&self) -> PvpResult<Option<Season>> {
        self.with(|i| Ok(i.active_season().cloned()))
    }

    async fn season(&self, number: i32) -> PvpResult<Option<Season>> {
        self.with(|i| Ok(i.seasons.get(&number).cloned()))
    }

    async fn open_season(
        &self,
        expired: Option<i32>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PvpResult<Season> {
        self.with(|i| {
            if let Some(s) = expired.and_then(|n| i.seasons.get_mut(&n)) {
                s.status = SeasonStatus::Ended;
            }
            if let Some(active) = i.active_season() {
                return Ok(active.clone());
            }
            let number = i.seasons.keys().next_back().copied().unwrap_or(0) + 1;
            let season = Season {
                number,
                name: season_name(number),
                start_date: start,
                end_date: end,
                status: SeasonStatus::Active,
                rewards_config: serde_json::Value::Null,
            };
            i.seasons.insert(number, season.clone());
            Ok(season)
        })
    }

    async fn set_season_rewards(&self, number: i32, rewards: serde_json::Value) -> PvpResult<()> {
        self.with(|i| {
            if let Some(s) = i.seasons.get_mut(&number) {
                s.rewards_config = rewards;
            }
            Ok(())
        })
    }

    async fn insert_challenge(&self, new: NewChallenge) -> PvpResult<DirectChallenge> {
        self.with(|i| {
            let duplicate = i.challenges.values().any(|c| {
                c.challenger_id == new.challenger_id
                    && c.challenged_id == new.challenged_id
                    && c.status == ChallengeStatus::Pending
                    && c.expires_at > new.created_at
            });
            if duplicate {
                return Err(PvpError::InvalidChallenge(
                    "a challenge to this player is already pending",
                ));
            }
            let challenge = DirectChallenge {
                id: i.next_id(),
                challenger_id: new.challenger_id,
                challenged_id: new.challenged_id,
                challenger_beast_id: new.challenger_beast_id,
                challenged_beast_id: None,
                status: ChallengeStatus::Pending,
                created_at: new.created_at,
                expires_at: new.expires_at,
                match_id: None,
            };
            i.challenges.insert(challenge.id, challenge.clone());
            Ok(challenge)
        })
    }

    async fn challenge(&self, challenge_id: i64) -> PvpResult<Option<DirectChallenge>> {
        self.with(|i| Ok(i.challenges.get(&challenge_id).cloned()))
    }

    async fn accept_challenge(
        &self,
        challenge_id: i64,
        challenged_beast_id: i64,
        season_number: i32,
        now: DateTime<Utc>,
    ) -> PvpResult<(DirectChallenge, Match)> {
        self.with(|i| {
            let c = i
                .challenges
                .get(&challenge_id)
                .cloned()
                .ok_or(PvpError::ChallengeNotFound)?;
            if c.status != ChallengeStatus::Pending || c.expires_at <= now {
                return Err(PvpError::InvalidChallenge("challenge is no longer pending"));
            }
            i.queue.remove(&c.challenger_id);
            i.queue.remove(&c.challenged_id);
            let m = i.insert_match(NewMatch {
                season_number,
                player1_id: c.challenger_id,
                player2_id: c.challenged_id,
                player1_beast_id: c.challenger_beast_id,
                player2_beast_id: challenged_beast_id,
                match_type: MatchType::DirectChallenge,
            });
            let accepted = DirectChallenge {
                status: ChallengeStatus::Accepted,
                challenged_beast_id: Some(challenged_beast_id),
                match_id: Some(m.id),
                ..c
            };
            i.challenges.insert(challenge_id, accepted.clone());
            Ok((accepted, m))
        })
    }

    async fn decline_challenge(
        &self,
        challenge_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<DirectChallenge> {
        self.with(|i| {
            let c = i
                .challenges
                .get_mut(&challenge_id)
                .ok_or(PvpError::ChallengeNotFound)?;
            if c.status != ChallengeStatus::Pending || c.expires_at <= now {
                return Err(PvpError::InvalidChallenge("challenge is no longer pending"));
            }
            c.status = ChallengeStatus::Declined;
            Ok(c.clone())
        })
    }

    async fn pending_challenges(
        &self,
        player_id: i64,
        now: DateTime<Utc>,
    ) -> PvpResult<Vec<DirectChallenge>> {
        self.with(|i| {
            Ok(i.challenges
                .values()
                .filter(|c| {
                    c.challenged_id == player_id
                        && c.status == ChallengeStatus::Pending
                        && c.expires_at > now
                })
                .cloned()
                .collect())
        })
    }

    async fn expire_challenges(&self, now: DateTime<Utc>) -> PvpResult<u64> {
        self.with(|i| {
            let mut n = 0;
            for c in i.challenges.values_mut() {
                if c.status == ChallengeStatus::Pending && c.expires_at <= now {
                    c.status = ChallengeStatus::Expired;
                    n += 1;
                }
            }
            Ok(n)
        })
    }
}
