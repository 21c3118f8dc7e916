use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, RosterPlayer};
use crate::powerup::PowerupKind;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Any peer
    Join = 0x01,
    ReadyState = 0x02,
    PlayerPositionUpdate = 0x03,
    PlayerEliminated = 0x04,

    // Host -> Client
    PlayerListSnapshot = 0x10,
    PlayerJoined = 0x11,
    PlayerLeft = 0x12,
    StartMatch = 0x13,
    BallStateUpdate = 0x14,
    MatchOver = 0x15,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Join),
            0x02 => Some(Self::ReadyState),
            0x03 => Some(Self::PlayerPositionUpdate),
            0x04 => Some(Self::PlayerEliminated),
            0x10 => Some(Self::PlayerListSnapshot),
            0x11 => Some(Self::PlayerJoined),
            0x12 => Some(Self::PlayerLeft),
            0x13 => Some(Self::StartMatch),
            0x14 => Some(Self::BallStateUpdate),
            0x15 => Some(Self::MatchOver),
            _ => None,
        }
    }

    /// Messages only the host may send. A host drops these when they arrive
    /// from a client; a client accepts them only from its host link.
    pub fn is_host_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub player_id: PlayerId,
    pub display_name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyStateMsg {
    pub player_id: PlayerId,
    pub ready: bool,
}

/// Extra per-player state carried alongside a position update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionFlags {
    pub parry_pressed: bool,
    pub active_powerup: Option<PowerupKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPositionUpdateMsg {
    pub player_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub flags: PositionFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEliminatedMsg {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerListSnapshotMsg {
    pub room_code: String,
    pub players: Vec<RosterPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player: RosterPlayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
}

/// Everything a peer needs to build the same initial match state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMatchMsg {
    pub seed: u64,
    pub players: Vec<RosterPlayer>,
    /// AI opponents simulated by the host on top of the roster.
    pub ai_opponents: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallStateUpdateMsg {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub speed_multiplier: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOverMsg {
    pub winner_id: Option<PlayerId>,
    pub elimination_count: u32,
    pub duration_secs: f32,
}

/// Every message exchanged between peers.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    Join(JoinMsg),
    ReadyState(ReadyStateMsg),
    PlayerPositionUpdate(PlayerPositionUpdateMsg),
    PlayerEliminated(PlayerEliminatedMsg),
    PlayerListSnapshot(PlayerListSnapshotMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    StartMatch(StartMatchMsg),
    BallStateUpdate(BallStateUpdateMsg),
    MatchOver(MatchOverMsg),
}

impl PeerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Join(_) => MessageType::Join,
            Self::ReadyState(_) => MessageType::ReadyState,
            Self::PlayerPositionUpdate(_) => MessageType::PlayerPositionUpdate,
            Self::PlayerEliminated(_) => MessageType::PlayerEliminated,
            Self::PlayerListSnapshot(_) => MessageType::PlayerListSnapshot,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
            Self::StartMatch(_) => MessageType::StartMatch,
            Self::BallStateUpdate(_) => MessageType::BallStateUpdate,
            Self::MatchOver(_) => MessageType::MatchOver,
        }
    }
}
