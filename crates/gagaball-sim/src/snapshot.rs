use glam::Vec2;
use serde::{Deserialize, Serialize};

use gagaball_core::player::PlayerId;
use gagaball_core::powerup::PowerupKind;
use gagaball_core::time::Millis;

use crate::entity::{Ball, Player, Powerup};
use crate::lifecycle::MatchPhase;

/// Read-only view of one player for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub alive: bool,
    pub departed: bool,
    pub is_local: bool,
    pub is_targeted: bool,
    pub invulnerable: bool,
    pub frozen: bool,
    pub active_powerup: Option<PowerupKind>,
    pub powerup_remaining_ms: Millis,
    pub parry_ready: bool,
}

impl PlayerView {
    pub fn of(player: &Player, now: Millis) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            position: player.position,
            alive: player.alive,
            departed: player.departed,
            is_local: player.is_local(),
            is_targeted: player.is_targeted,
            invulnerable: player.is_invulnerable(now),
            frozen: player.is_frozen(now),
            active_powerup: player.active_powerup.map(|p| p.kind),
            powerup_remaining_ms: player.active_powerup.map_or(0, |p| p.remaining_ms(now)),
            parry_ready: player.parry.can_parry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub speed_multiplier: f32,
    pub target: Option<PlayerId>,
}

impl From<&Ball> for BallView {
    fn from(ball: &Ball) -> Self {
        Self {
            position: ball.position,
            velocity: ball.velocity,
            speed_multiplier: ball.speed_multiplier,
            target: ball.current_target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerupView {
    pub id: u32,
    pub kind: PowerupKind,
    pub position: Vec2,
}

impl From<&Powerup> for PowerupView {
    fn from(p: &Powerup) -> Self {
        Self {
            id: p.id,
            kind: p.kind,
            position: p.position,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub phase: MatchPhase,
    pub elapsed_ms: Millis,
    pub remaining_ms: Millis,
    pub elimination_count: u32,
    pub winner_id: Option<PlayerId>,
    pub slow_motion: bool,
    pub arena_center: Vec2,
    pub arena_radius: f32,
    pub players: Vec<PlayerView>,
    pub ball: BallView,
    pub powerups: Vec<PowerupView>,
}

impl MatchSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive && !p.departed).count()
    }
}
