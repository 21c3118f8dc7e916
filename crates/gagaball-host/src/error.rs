use gagaball_core::player::PlayerId;
use gagaball_net::{SessionError, SetupError};
use gagaball_sim::setup::MatchSetupError;

#[derive(Debug)]
pub enum HostError {
    Config(String),
    Setup(SetupError),
    Session(SessionError),
    MatchSetup(MatchSetupError),
    /// A loopback client never received `StartMatch`.
    StartNotDelivered(PlayerId),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(m) => write!(f, "invalid configuration: {m}"),
            Self::Setup(e) => write!(f, "room setup failed: {e}"),
            Self::Session(e) => write!(f, "session error: {e}"),
            Self::MatchSetup(e) => write!(f, "match setup failed: {e}"),
            Self::StartNotDelivered(id) => write!(f, "player {id} never saw the match start"),
        }
    }
}

impl std::error::Error for HostError {}

impl From<SetupError> for HostError {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

impl From<SessionError> for HostError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<MatchSetupError> for HostError {
    fn from(e: MatchSetupError) -> Self {
        Self::MatchSetup(e)
    }
}
