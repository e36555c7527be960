// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{Duration, Utc};
use pvp_server::{
    config::Settings,
    db::{
        memory_store::MemoryStore,
        models::{BeastRef, Match, NewQueueEntry, QueueEntry, Season, SeasonStatus},
        store::PvpStore,
    },
    game::{
        tier::tier_for,
        types::{ActionKind, BeastSnapshot, PvpAction, QueueKind},
    },
    matchmaking::EnqueueOutcome,
    protocol::ServerMsg,
    state::AppState,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

pub fn season(number: i32, days_left: i64) -> Season {
    let now = Utc::now();
    Season {
        number,
        name: format!("Season {number}"),
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(days_left),
        status: SeasonStatus::Active,
        rewards_config: serde_json::Value::Null,
    }
}

pub fn harness() -> Harness {
    harness_with(Settings::default())
}

/// Memory store with season 1 active.
pub fn harness_with(settings: Settings) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.insert_season(season(1, 30));
    let state = AppState::new(store.clone(), settings, None);
    Harness { store, state }
}

impl Harness {
    pub fn beast(&self, owner: i64) -> BeastRef {
        self.store.insert_beast(owner, 10)
    }

    /// Ranked row for `player` at `elo` in the current season.
    pub async fn seed_elo(&self, player: i64, elo: i32) {
        let row = self
            .store
            .get_or_create_ranking(player, 1, elo)
            .await
            .expect("seed ranking");
        assert_eq!(row.elo, elo, "seed before any other ranking access");
    }

    /// Puts an entry straight into the store, bypassing inline pairing.
    pub async fn park(
        &self,
        player: i64,
        kind: QueueKind,
        elo: Option<i32>,
        secs_ago: i64,
    ) -> QueueEntry {
        let beast = self.beast(player);
        let queued_at = Utc::now() - Duration::seconds(secs_ago);
        self.store
            .insert_queue_entry(NewQueueEntry {
                player_id: player,
                beast_id: beast.id,
                kind,
                elo_snapshot: elo,
                tier_snapshot: elo.map(|e| tier_for(e).0),
                queued_at,
                expires_at: queued_at + Duration::minutes(5),
            })
            .await
            .expect("park entry")
    }

    /// Queues `a` then `b` through the engine and returns their match.
    pub async fn matched(&self, a: i64, b: i64, kind: QueueKind) -> Match {
        let ba = self.beast(a);
        let bb = self.beast(b);
        let first = self.state.queue.enqueue(a, ba.id, kind).await.unwrap();
        assert!(matches!(first, EnqueueOutcome::Queued(_)));
        match self.state.queue.enqueue(b, bb.id, kind).await.unwrap() {
            EnqueueOutcome::Matched(m) => m,
            EnqueueOutcome::Queued(_) => panic!("{a} and {b} should pair"),
        }
    }
}

/// Everything pushed to `rx` so far.
pub fn drain(rx: &mut UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

pub fn snapshot(beast_id: i64) -> BeastSnapshot {
    BeastSnapshot {
        beast_id,
        hp: 80,
        max_hp: 100,
        essence: 40,
        max_essence: 50,
        technique_ids: vec!["vine_lash".into(), "spore_burst".into()],
    }
}

pub fn technique(id: &str) -> PvpAction {
    PvpAction {
        kind: ActionKind::Technique,
        technique_id: Some(id.into()),
        reported_damage: Some(12),
    }
}
