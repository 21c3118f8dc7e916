use gagaball_core::player::{PlayerColor, PlayerId, RosterPlayer};
use gagaball_core::room::MAX_PLAYERS;

/// Why a join was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    RoomFull,
    DuplicateId,
}

/// Room roster in join order. The first entry is the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    players: Vec<RosterPlayer>,
    /// Colors are handed out by join count so a rejoin never steals one.
    joined: usize,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster as received from a host snapshot.
    pub fn from_players(players: Vec<RosterPlayer>) -> Self {
        let joined = players.len();
        Self { players, joined }
    }

    /// Add a player with the next palette color.
    pub fn add(
        &mut self,
        id: PlayerId,
        display_name: impl Into<String>,
        is_host: bool,
    ) -> Result<RosterPlayer, JoinRejection> {
        if self.contains(id) {
            return Err(JoinRejection::DuplicateId);
        }
        if self.is_full() {
            return Err(JoinRejection::RoomFull);
        }
        let mut player = RosterPlayer::new(id, display_name, PlayerColor::palette(self.joined));
        player.is_host = is_host;
        self.joined += 1;
        self.players.push(player.clone());
        Ok(player)
    }

    /// Insert an entry announced by the host, keeping its color.
    pub fn insert(&mut self, player: RosterPlayer) -> bool {
        if self.contains(player.id) {
            return false;
        }
        self.joined += 1;
        self.players.push(player);
        true
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<RosterPlayer> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    /// Returns whether the flag changed.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> bool {
        match self.players.iter_mut().find(|p| p.id == id) {
            Some(p) if p.ready != ready => {
                p.ready = ready;
                true
            },
            _ => false,
        }
    }

    pub fn get(&self, id: PlayerId) -> Option<&RosterPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn players(&self) -> &[RosterPlayer] {
        &self.players
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn all_ready(&self) -> bool {
        self.players.iter().all(|p| p.is_host || p.ready)
    }
}
