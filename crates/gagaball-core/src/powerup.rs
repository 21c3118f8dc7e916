use serde::{Deserialize, Serialize};

use crate::time::Millis;

/// The five power-up kinds that can spawn in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    /// Pulls the ball toward the holder when it is close.
    Magnet,
    /// Deflections by the holder hit harder.
    DoubleBounce,
    /// Holder cannot be eliminated.
    Invincibility,
    /// Holder moves faster.
    SpeedBoost,
    /// Every other living player is frozen in place.
    FreezeTime,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 5] = [
        PowerupKind::Magnet,
        PowerupKind::DoubleBounce,
        PowerupKind::Invincibility,
        PowerupKind::SpeedBoost,
        PowerupKind::FreezeTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Magnet => "Magnet",
            Self::DoubleBounce => "Double Bounce",
            Self::Invincibility => "Invincible",
            Self::SpeedBoost => "Speed Boost",
            Self::FreezeTime => "Freeze Time",
        }
    }
}

/// A power-up effect held by a player until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerup {
    pub kind: PowerupKind,
    pub expires_at: Millis,
}

impl ActivePowerup {
    pub fn new(kind: PowerupKind, now: Millis, duration_ms: Millis) -> Self {
        Self {
            kind,
            expires_at: now.saturating_add(duration_ms),
        }
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at
    }

    pub fn remaining_ms(&self, now: Millis) -> Millis {
        self.expires_at.saturating_sub(now)
    }
}
