use serde::{Deserialize, Serialize};

/// Network-stable player identifier. Unique within a room.
pub type PlayerId = u64;

/// Longest display name accepted from the wire.
pub const MAX_DISPLAY_NAME_LEN: usize = 24;

/// A player entry in a room roster, as shared between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub color: PlayerColor,
    pub is_host: bool,
    pub ready: bool,
}

impl RosterPlayer {
    pub fn new(id: PlayerId, display_name: impl Into<String>, color: PlayerColor) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            color,
            is_host: false,
            ready: false,
        }
    }
}

/// Avatar color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::CLASSIC_BLUE
    }
}

impl PlayerColor {
    pub const CLASSIC_BLUE: PlayerColor = PlayerColor::from_rgb(0x3b82f6);

    /// Colors handed out to opponents, in assignment order.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor::from_rgb(0xef4444), // Red
        PlayerColor::from_rgb(0x10b981), // Green
        PlayerColor::from_rgb(0x3b82f6), // Blue
        PlayerColor::from_rgb(0xa855f7), // Purple
        PlayerColor::from_rgb(0xf59e0b), // Amber
        PlayerColor::from_rgb(0x06b6d4), // Cyan
        PlayerColor::from_rgb(0xec4899), // Pink
    ];

    pub const fn from_rgb(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub fn palette(index: usize) -> Self {
        Self::PALETTE[index % Self::PALETTE.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_splits_channels() {
        let c = PlayerColor::from_rgb(0x3b82f6);
        assert_eq!((c.r, c.g, c.b), (0x3b, 0x82, 0xf6));
    }

    #[test]
    fn palette_wraps() {
        let n = PlayerColor::PALETTE.len();
        assert_eq!(PlayerColor::palette(n), PlayerColor::palette(0));
    }
}
