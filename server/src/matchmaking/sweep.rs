//! Periodic matchmaking sweep.
//!
//! One cycle: purge expired entries, expire stale challenges, then pair the
//! ranked pool and the casual pool. A player is matched at most once per
//! cycle. Store outages are counted; too many in a row (or an open circuit)
//! pause the sweep for a while instead of hammering a sick database.

use chrono::Utc;
use parking_lot::Mutex;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    challenge::ChallengeService,
    config::Settings,
    error::{Outage, PvpError, PvpResult},
    game::types::QueueKind,
    metrics,
};

use super::MatchmakingQueue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub purged: u64,
    pub challenges_expired: u64,
    pub ranked_matches: u32,
    pub casual_matches: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(SweepReport),
    /// A previous cycle is still running.
    Skipped,
    /// Backing off after repeated store failures.
    Paused,
    Failed,
}

/// Consecutive-failure counter and pause window.
#[derive(Debug)]
pub struct SweepHealth {
    consecutive_failures: u32,
    paused_until: Option<Instant>,
    max_failures: u32,
    pause: Duration,
}

impl SweepHealth {
    pub fn new(max_failures: u32, pause: Duration) -> Self {
        SweepHealth {
            consecutive_failures: 0,
            paused_until: None,
            max_failures: max_failures.max(1),
            pause,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// True while paused; clears an elapsed pause.
    pub fn is_paused(&mut self, now: Instant) -> bool {
        match self.paused_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.paused_until = None;
                self.consecutive_failures = 0;
                metrics::SWEEP_PAUSED.set(0);
                log::info!("matchmaking sweep resuming");
                false
            }
            None => false,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Returns whether this failure started a pause.
    pub fn record_failure(&mut self, err: &PvpError, now: Instant) -> bool {
        let pause = match err.outage() {
            Some(Outage::CircuitOpen) => true,
            Some(Outage::Connection | Outage::Timeout) => {
                self.consecutive_failures += 1;
                self.consecutive_failures >= self.max_failures
            }
            // Not a connectivity problem: retry on the next tick.
            None => false,
        };
        if pause {
            self.paused_until = Some(now + self.pause);
            metrics::SWEEP_PAUSED.set(1);
            log::warn!(
                "matchmaking sweep paused for {}s after {err}",
                self.pause.as_secs()
            );
        }
        pause
    }
}

pub struct Sweeper {
    queue: Arc<MatchmakingQueue>,
    challenges: Arc<ChallengeService>,
    interval: Duration,
    health: Mutex<SweepHealth>,
    running: AtomicBool,
}

impl Sweeper {
    pub fn new(
        queue: Arc<MatchmakingQueue>,
        challenges: Arc<ChallengeService>,
        settings: &Settings,
    ) -> Self {
        Sweeper {
            queue,
            challenges,
            interval: Duration::from_secs(settings.sweep_interval.max(1)),
            health: Mutex::new(SweepHealth::new(
                settings.sweep_max_failures,
                Duration::from_secs(settings.sweep_pause),
            )),
            running: AtomicBool::new(false),
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.lock().consecutive_failures()
    }

    pub fn is_paused(&self) -> bool {
        self.health.lock().is_paused(Instant::now())
    }

    /// One sweep, without the back-off bookkeeping.
    pub async fn run_cycle(&self) -> PvpResult<SweepReport> {
        let now = Utc::now();
        let mut report = SweepReport {
            purged: self.queue.purge_expired(now).await?,
            challenges_expired: self.challenges.expire_stale().await?,
            ..SweepReport::default()
        };

        let mut paired: HashSet<i64> = HashSet::new();
        for kind in [QueueKind::Ranked, QueueKind::Casual] {
            for entry in self.queue.live_entries(kind, now).await? {
                if paired.contains(&entry.player_id) {
                    continue;
                }
                if let Some(m) = self.queue.try_pair(&entry, &paired).await? {
                    paired.insert(m.player1_id);
                    paired.insert(m.player2_id);
                    match kind {
                        QueueKind::Ranked => report.ranked_matches += 1,
                        QueueKind::Casual => report.casual_matches += 1,
                    }
                }
            }
        }
        Ok(report)
    }

    /// A guarded cycle: never overlaps another, honours the pause window and
    /// never propagates a failure.
    pub async fn tick(&self) -> TickOutcome {
        if self.health.lock().is_paused(Instant::now()) {
            return TickOutcome::Paused;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return TickOutcome::Skipped;
        }

        let result = self.run_cycle().await;
        self.running.store(false, Ordering::Release);

        match result {
            Ok(report) => {
                self.health.lock().record_success();
                if report.ranked_matches + report.casual_matches > 0 {
                    log::info!(
                        "sweep paired {} ranked / {} casual",
                        report.ranked_matches,
                        report.casual_matches
                    );
                }
                TickOutcome::Completed(report)
            }
            Err(e) => {
                metrics::SWEEP_FAILURES.inc();
                log::error!("matchmaking sweep failed: {e}");
                if self.health.lock().record_failure(&e, Instant::now()) {
                    TickOutcome::Paused
                } else {
                    TickOutcome::Failed
                }
            }
        }
    }

    /// Runs `tick` forever on a fixed interval.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!(
                "matchmaking sweep every {}s",
                self.interval.as_secs()
            );
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
