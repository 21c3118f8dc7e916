use std::collections::VecDeque;

use tokio::sync::broadcast;

use gagaball_core::net::messages::{MatchOverMsg, StartMatchMsg};
use gagaball_core::player::{PlayerId, RosterPlayer};

/// Default number of events kept for late subscribers.
const DEFAULT_HISTORY: usize = 64;

/// Default broadcast channel capacity for event fan-out.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Lobby and match notifications a session publishes to any number of
/// listeners (lobby UI, HUD, logging).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Full roster after a snapshot from the host.
    RosterChanged(Vec<RosterPlayer>),
    PlayerJoined(RosterPlayer),
    PlayerLeft(PlayerId),
    ReadyChanged { player_id: PlayerId, ready: bool },
    MatchStarted(StartMatchMsg),
    PlayerEliminated(PlayerId),
    MatchOver(MatchOverMsg),
    /// The link to the host dropped. Terminal for a client.
    HostLost,
}

/// Bounded event history with broadcast fan-out.
pub struct EventBus {
    history: VecDeque<SessionEvent>,
    tx: broadcast::Sender<SessionEvent>,
    max_history: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY, DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(max_history: usize, broadcast_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            history: VecDeque::new(),
            tx,
            max_history,
        }
    }

    /// Record `event` and hand it to every subscriber. Having no subscribers
    /// is fine.
    pub fn publish(&mut self, event: SessionEvent) {
        let _ = self.tx.send(event.clone());
        self.history.push_back(event);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// The most recent `count` events, newest first.
    pub fn recent(&self, count: usize) -> Vec<&SessionEvent> {
        self.history.iter().rev().take(count).collect()
    }
}
