use serde::{Deserialize, Serialize};

use crate::player::MAX_DISPLAY_NAME_LEN;

use super::messages::{
    BallStateUpdateMsg, JoinMsg, MatchOverMsg, MessageType, PeerMessage, PlayerEliminatedMsg,
    PlayerJoinedMsg, PlayerLeftMsg, PlayerListSnapshotMsg, PlayerPositionUpdateMsg, ReadyStateMsg,
    StartMatchMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

/// Largest coordinate magnitude accepted from the wire. Spectators are parked
/// outside the arena, so this is well beyond the arena radius.
pub const MAX_WIRE_COORDINATE: f32 = 100_000.0;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
    InvalidPayload(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
            Self::InvalidPayload(e) => write!(f, "invalid payload: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `PeerMessage` to wire format.
pub fn encode_peer_message(msg: &PeerMessage) -> Result<Vec<u8>, ProtocolError> {
    let ty = msg.message_type();
    match msg {
        PeerMessage::Join(m) => encode_message(ty, m),
        PeerMessage::ReadyState(m) => encode_message(ty, m),
        PeerMessage::PlayerPositionUpdate(m) => encode_message(ty, m),
        PeerMessage::PlayerEliminated(m) => encode_message(ty, m),
        PeerMessage::PlayerListSnapshot(m) => encode_message(ty, m),
        PeerMessage::PlayerJoined(m) => encode_message(ty, m),
        PeerMessage::PlayerLeft(m) => encode_message(ty, m),
        PeerMessage::StartMatch(m) => encode_message(ty, m),
        PeerMessage::BallStateUpdate(m) => encode_message(ty, m),
        PeerMessage::MatchOver(m) => encode_message(ty, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `PeerMessage` and reject payloads that would
/// corrupt the simulation (non-finite or absurd coordinates, bad names).
pub fn decode_peer_message(data: &[u8]) -> Result<PeerMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    let msg = match decode_message_type(data)? {
        MessageType::Join => PeerMessage::Join(decode_payload::<JoinMsg>(data)?),
        MessageType::ReadyState => PeerMessage::ReadyState(decode_payload::<ReadyStateMsg>(data)?),
        MessageType::PlayerPositionUpdate => {
            PeerMessage::PlayerPositionUpdate(decode_payload::<PlayerPositionUpdateMsg>(data)?)
        },
        MessageType::PlayerEliminated => {
            PeerMessage::PlayerEliminated(decode_payload::<PlayerEliminatedMsg>(data)?)
        },
        MessageType::PlayerListSnapshot => {
            PeerMessage::PlayerListSnapshot(decode_payload::<PlayerListSnapshotMsg>(data)?)
        },
        MessageType::PlayerJoined => {
            PeerMessage::PlayerJoined(decode_payload::<PlayerJoinedMsg>(data)?)
        },
        MessageType::PlayerLeft => PeerMessage::PlayerLeft(decode_payload::<PlayerLeftMsg>(data)?),
        MessageType::StartMatch => PeerMessage::StartMatch(decode_payload::<StartMatchMsg>(data)?),
        MessageType::BallStateUpdate => {
            PeerMessage::BallStateUpdate(decode_payload::<BallStateUpdateMsg>(data)?)
        },
        MessageType::MatchOver => PeerMessage::MatchOver(decode_payload::<MatchOverMsg>(data)?),
    };
    validate_peer_message(&msg)?;
    Ok(msg)
}

/// Reject messages whose contents must never reach the simulation.
pub fn validate_peer_message(msg: &PeerMessage) -> Result<(), ProtocolError> {
    match msg {
        PeerMessage::Join(m) => check_name(&m.display_name),
        PeerMessage::PlayerPositionUpdate(m) => {
            check_coord("x", m.x)?;
            check_coord("y", m.y)
        },
        PeerMessage::BallStateUpdate(m) => {
            check_coord("x", m.x)?;
            check_coord("y", m.y)?;
            check_coord("vx", m.vx)?;
            check_coord("vy", m.vy)?;
            if !m.speed_multiplier.is_finite() || m.speed_multiplier < 1.0 {
                return Err(ProtocolError::InvalidPayload(format!(
                    "speed_multiplier out of range: {}",
                    m.speed_multiplier
                )));
            }
            Ok(())
        },
        PeerMessage::PlayerListSnapshot(m) => {
            m.players.iter().try_for_each(|p| check_name(&p.display_name))
        },
        PeerMessage::PlayerJoined(m) => check_name(&m.player.display_name),
        PeerMessage::StartMatch(m) => m.players.iter().try_for_each(|p| check_name(&p.display_name)),
        PeerMessage::MatchOver(m) => {
            if !m.duration_secs.is_finite() || m.duration_secs < 0.0 {
                return Err(ProtocolError::InvalidPayload(format!(
                    "duration out of range: {}",
                    m.duration_secs
                )));
            }
            Ok(())
        },
        PeerMessage::ReadyState(_) | PeerMessage::PlayerEliminated(_) | PeerMessage::PlayerLeft(_) => {
            Ok(())
        },
    }
}

fn check_coord(field: &str, v: f32) -> Result<(), ProtocolError> {
    if !v.is_finite() || v.abs() > MAX_WIRE_COORDINATE {
        return Err(ProtocolError::InvalidPayload(format!(
            "{field} out of range: {v}"
        )));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), ProtocolError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_DISPLAY_NAME_LEN {
        return Err(ProtocolError::InvalidPayload(format!(
            "display name length {len} not in 1..={MAX_DISPLAY_NAME_LEN}"
        )));
    }
    Ok(())
}
