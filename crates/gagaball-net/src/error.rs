use gagaball_core::net::protocol::ProtocolError;
use gagaball_sim::setup::MatchSetupError;

use crate::transport::TransportError;

/// A room or link could not be set up. Not recoverable here; the caller
/// reports it to whoever asked to host or join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    PeerIdTaken(String),
    PeerNotFound(String),
    Signaling(String),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerIdTaken(id) => write!(f, "peer id {id:?} is already in use"),
            Self::PeerNotFound(id) => write!(f, "no peer with id {id:?}"),
            Self::Signaling(msg) => write!(f, "signaling error: {msg}"),
        }
    }
}

impl std::error::Error for SetupError {}

#[derive(Debug)]
pub enum SessionError {
    NotHost,
    NotEnoughPlayers { have: usize, need: usize },
    AlreadyStarted,
    Protocol(ProtocolError),
    Transport(TransportError),
    MatchSetup(MatchSetupError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotHost => write!(f, "only the host can do that"),
            Self::NotEnoughPlayers { have, need } => {
                write!(f, "need {need} players to start, have {have}")
            },
            Self::AlreadyStarted => write!(f, "match already started"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::MatchSetup(e) => write!(f, "match setup failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::MatchSetup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<MatchSetupError> for SessionError {
    fn from(e: MatchSetupError) -> Self {
        Self::MatchSetup(e)
    }
}
