//! Player-id → live connection registry and the push fan-out built on it.
//!
//! A player may hold several sockets (tabs, devices); every event addressed
//! to the player goes to all of them. Senders whose socket has gone away are
//! pruned on the next delivery attempt.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerMsg;

pub type ConnectionId = Uuid;

type Outbox = mpsc::UnboundedSender<ServerMsg>;

#[derive(Default)]
pub struct ConnectionRegistry {
    conns: DashMap<i64, Vec<(ConnectionId, Outbox)>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection; the receiver yields every event for `player_id`.
    pub fn register(&self, player_id: i64) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.conns.entry(player_id).or_default().push((id, tx));
        log::debug!("connection {id} registered for player {player_id}");
        (id, rx)
    }

    /// Returns whether the connection was known.
    pub fn unregister(&self, player_id: i64, conn: ConnectionId) -> bool {
        let removed = match self.conns.get_mut(&player_id) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(id, _)| *id != conn);
                list.len() != before
            }
            None => false,
        };
        self.conns.remove_if(&player_id, |_, list| list.is_empty());
        removed
    }

    pub fn connection_count(&self, player_id: i64) -> usize {
        self.conns.get(&player_id).map_or(0, |l| l.len())
    }

    pub fn is_online(&self, player_id: i64) -> bool {
        self.connection_count(player_id) > 0
    }

    /// Pushes `msg` to every socket of `player_id`; returns how many took it.
    pub fn notify(&self, player_id: i64, msg: ServerMsg) -> usize {
        let delivered = match self.conns.get_mut(&player_id) {
            Some(mut list) => {
                list.retain(|(_, tx)| tx.send(msg.clone()).is_ok());
                list.len()
            }
            None => 0,
        };
        self.conns.remove_if(&player_id, |_, list| list.is_empty());
        if delivered == 0 {
            log::debug!("player {player_id} offline; dropped push");
        }
        delivered
    }
}
