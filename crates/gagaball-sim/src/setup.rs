use serde::{Deserialize, Serialize};

use gagaball_core::player::PlayerId;
use gagaball_core::room::MAX_PLAYERS;

use crate::ai::DifficultyAssignment;
use crate::arena::ArenaError;
use crate::config::MatchConfig;

/// Host-simulated bots get ids from here upward so they never collide with
/// human ids handed out by a room.
pub const AI_PLAYER_ID_BASE: PlayerId = 1_000;

/// Everything needed to lay out a match. Every peer builds the same setup from
/// the host's `StartMatch`, so spawn positions and the kickoff agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSetup {
    pub seed: u64,
    pub local_player_id: PlayerId,
    /// Human players in join order, local player included.
    pub humans: Vec<(PlayerId, String)>,
    pub ai_opponents: usize,
    pub difficulty: DifficultyAssignment,
    /// Run the AI controllers in this process. Peers that don't mirror the
    /// host's bots as network-driven players.
    pub simulate_ai: bool,
}

impl MatchSetup {
    /// Local human against `ai_opponents` bots.
    pub fn single_player(name: impl Into<String>, ai_opponents: usize, seed: u64) -> Self {
        Self {
            seed,
            local_player_id: 1,
            humans: vec![(1, name.into())],
            ai_opponents,
            difficulty: DifficultyAssignment::default(),
            simulate_ai: true,
        }
    }

    pub fn total_players(&self) -> usize {
        self.humans.len() + self.ai_opponents
    }

    /// Id of the `index`-th bot.
    pub fn ai_player_id(index: usize) -> PlayerId {
        AI_PLAYER_ID_BASE + index as PlayerId
    }

    pub fn validate(&self, config: &MatchConfig) -> Result<(), MatchSetupError> {
        config.validate().map_err(MatchSetupError::InvalidConfig)?;
        if self.ai_opponents > config.max_ai_opponents {
            return Err(MatchSetupError::TooManyAi {
                requested: self.ai_opponents,
                max: config.max_ai_opponents,
            });
        }
        if self.total_players() > MAX_PLAYERS {
            return Err(MatchSetupError::TooManyPlayers {
                count: self.total_players(),
                max: MAX_PLAYERS,
            });
        }
        if !self.humans.iter().any(|(id, _)| *id == self.local_player_id) {
            return Err(MatchSetupError::MissingLocalPlayer(self.local_player_id));
        }
        for (i, (id, _)) in self.humans.iter().enumerate() {
            if *id >= AI_PLAYER_ID_BASE || self.humans[..i].iter().any(|(other, _)| other == id) {
                return Err(MatchSetupError::DuplicatePlayer(*id));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchSetupError {
    InvalidConfig(String),
    Arena(ArenaError),
    TooManyAi { requested: usize, max: usize },
    TooManyPlayers { count: usize, max: usize },
    MissingLocalPlayer(PlayerId),
    /// Repeated id, or a human id inside the bot id range.
    DuplicatePlayer(PlayerId),
}

impl std::fmt::Display for MatchSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "Invalid match config: {msg}"),
            Self::Arena(e) => write!(f, "Invalid arena: {e}"),
            Self::TooManyAi { requested, max } => {
                write!(f, "Requested {requested} AI opponents, max is {max}")
            },
            Self::TooManyPlayers { count, max } => {
                write!(f, "Match has {count} players, max is {max}")
            },
            Self::MissingLocalPlayer(id) => write!(f, "Local player {id} is not in the match"),
            Self::DuplicatePlayer(id) => write!(f, "Player id {id} is not unique"),
        }
    }
}

impl std::error::Error for MatchSetupError {}

impl From<ArenaError> for MatchSetupError {
    fn from(e: ArenaError) -> Self {
        Self::Arena(e)
    }
}
