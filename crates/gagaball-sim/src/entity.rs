use glam::Vec2;
use serde::{Deserialize, Serialize};

use gagaball_core::player::PlayerId;
use gagaball_core::powerup::{ActivePowerup, PowerupKind};
use gagaball_core::time::Millis;

use crate::ai::AiState;
use crate::arena::Arena;
use crate::config::MatchConfig;

/// Who drives a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Controlled by this process's input device. Exactly one per process.
    LocalHuman,
    /// Driven by position updates from the network. On clients this also
    /// covers bots the host simulates.
    RemoteHuman(RemoteTrack),
    /// Driven by the local AI controller.
    Ai(AiState),
}

/// Interpolation track for a network-driven player: glide from `from` to `to`
/// over `duration_ms` starting at `received_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub from: Vec2,
    pub to: Vec2,
    pub received_at: Millis,
    pub duration_ms: Millis,
}

impl RemoteTrack {
    pub fn at_rest(position: Vec2, duration_ms: Millis) -> Self {
        Self {
            from: position,
            to: position,
            received_at: 0,
            duration_ms,
        }
    }

    pub fn position_at(&self, now: Millis) -> Vec2 {
        if self.duration_ms == 0 {
            return self.to;
        }
        let t = now.saturating_sub(self.received_at) as f32 / self.duration_ms as f32;
        self.from.lerp(self.to, t.clamp(0.0, 1.0))
    }

    /// Implied velocity while gliding, zero once the target is reached.
    pub fn velocity_at(&self, now: Millis) -> Vec2 {
        if self.duration_ms == 0 || now >= self.received_at + self.duration_ms {
            return Vec2::ZERO;
        }
        (self.to - self.from) / (self.duration_ms as f32 / 1000.0)
    }

    /// Restart the glide from wherever the player is drawn now.
    pub fn retarget(&mut self, current: Vec2, target: Vec2, now: Millis) {
        self.from = current;
        self.to = target;
        self.received_at = now;
    }
}

/// Parry timing for one player. A press arms the parry for a short window and
/// starts the cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParryState {
    pub can_parry: bool,
    pub last_parry_time: Option<Millis>,
    pub cooldown_ms: Millis,
    pub armed_until: Option<Millis>,
}

impl ParryState {
    pub fn new(cooldown_ms: Millis) -> Self {
        Self {
            can_parry: true,
            last_parry_time: None,
            cooldown_ms,
            armed_until: None,
        }
    }

    /// Register a parry press. Returns false while on cooldown.
    pub fn press(&mut self, now: Millis, window_ms: Millis) -> bool {
        self.refresh(now);
        if !self.can_parry {
            return false;
        }
        self.can_parry = false;
        self.last_parry_time = Some(now);
        self.armed_until = Some(now + window_ms);
        true
    }

    pub fn is_armed(&self, now: Millis) -> bool {
        self.armed_until.is_some_and(|until| now <= until)
    }

    /// Spend the armed parry on a deflection.
    pub fn consume(&mut self) {
        self.armed_until = None;
    }

    pub fn refresh(&mut self, now: Millis) {
        if let Some(until) = self.armed_until
            && now > until
        {
            self.armed_until = None;
        }
        self.can_parry = self
            .last_parry_time
            .is_none_or(|t| now >= t + self.cooldown_ms);
    }
}

/// A participant in the match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub alive: bool,
    pub role: PlayerRole,
    pub invulnerable_until: Option<Millis>,
    pub frozen_until: Option<Millis>,
    pub active_powerup: Option<ActivePowerup>,
    pub is_targeted: bool,
    pub parry: ParryState,
    pub eliminated_at: Option<Millis>,
    /// Disconnected mid-match. Counts as out, not as an elimination.
    pub departed: bool,
}

/// Create a living player with a fresh spawn-protection window.
pub fn spawn_player(
    id: PlayerId,
    name: impl Into<String>,
    position: Vec2,
    role: PlayerRole,
    now: Millis,
    config: &MatchConfig,
) -> Player {
    Player {
        id,
        name: name.into(),
        position,
        velocity: Vec2::ZERO,
        radius: config.player_radius,
        alive: true,
        role,
        invulnerable_until: Some(now + config.invulnerability_ms),
        frozen_until: None,
        active_powerup: None,
        is_targeted: false,
        parry: ParryState::new(config.parry_cooldown_ms),
        eliminated_at: None,
        departed: false,
    }
}

impl Player {
    pub fn is_invulnerable(&self, now: Millis) -> bool {
        self.invulnerable_until.is_some_and(|until| now < until)
    }

    pub fn is_frozen(&self, now: Millis) -> bool {
        self.frozen_until.is_some_and(|until| now < until)
    }

    pub fn has_powerup(&self, kind: PowerupKind) -> bool {
        self.active_powerup.is_some_and(|p| p.kind == kind)
    }

    /// Neither spawn protection nor an invincibility power-up applies.
    pub fn is_vulnerable(&self, now: Millis) -> bool {
        !self.is_invulnerable(now) && !self.has_powerup(PowerupKind::Invincibility)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.role, PlayerRole::LocalHuman)
    }

    pub fn is_ai(&self) -> bool {
        matches!(self.role, PlayerRole::Ai(_))
    }

    /// Moved by another peer's updates rather than by this process.
    pub fn is_network_driven(&self) -> bool {
        matches!(self.role, PlayerRole::RemoteHuman(_))
    }

    /// Can be hit, targeted, or pick up power-ups.
    pub fn is_active(&self) -> bool {
        self.alive && !self.departed
    }

    /// Take the player out of play. Returns false if already out, so repeated
    /// calls (local detection plus a network echo) are harmless.
    ///
    /// The player is parked just outside the arena wall for spectating; this
    /// happens once, on the transition.
    pub fn eliminate(&mut self, now: Millis, arena: &Arena) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.eliminated_at = Some(now);
        self.velocity = Vec2::ZERO;
        self.is_targeted = false;
        self.active_powerup = None;
        self.frozen_until = None;
        self.parry.consume();
        self.position = arena.center
            + arena.outward_normal(self.position) * (arena.radius + self.radius * 2.0);
        true
    }

    /// Clear timed flags whose expiry has passed. Returns the power-up kind
    /// that expired this call, if any.
    pub fn expire_transient_states(&mut self, now: Millis) -> Option<PowerupKind> {
        if self.invulnerable_until.is_some_and(|until| now >= until) {
            self.invulnerable_until = None;
        }
        if self.frozen_until.is_some_and(|until| now >= until) {
            self.frozen_until = None;
        }
        self.parry.refresh(now);
        match self.active_powerup {
            Some(p) if p.is_expired(now) => {
                self.active_powerup = None;
                Some(p.kind)
            },
            _ => None,
        }
    }
}

/// The single ball.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub base_speed: f32,
    /// Grows with each parry, within `[1.0, cap]`. Scales the speed cap.
    pub speed_multiplier: f32,
    pub hit_count: u32,
    pub current_target: Option<PlayerId>,
    /// No new target is picked before this time.
    pub target_lock_time: Millis,
    /// Player that last deflected the ball. Ignored for contact until the
    /// target lock lapses.
    pub last_deflector: Option<PlayerId>,
}

impl Ball {
    pub fn new(position: Vec2, velocity: Vec2, config: &MatchConfig) -> Self {
        Self {
            position,
            velocity,
            radius: config.ball_radius,
            base_speed: config.ball_launch_speed,
            speed_multiplier: 1.0,
            hit_count: 0,
            current_target: None,
            target_lock_time: 0,
            last_deflector: None,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn max_speed(&self, config: &MatchConfig) -> f32 {
        config.ball_max_speed * self.speed_multiplier
    }

    /// Raise the speed multiplier by `increment`, never past `cap`.
    pub fn bump_multiplier(&mut self, increment: f32, cap: f32) {
        self.speed_multiplier = (self.speed_multiplier + increment).clamp(1.0, cap.max(1.0));
    }

    pub fn is_locked(&self, now: Millis) -> bool {
        now < self.target_lock_time
    }
}

/// A power-up lying in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Powerup {
    pub id: u32,
    pub kind: PowerupKind,
    pub position: Vec2,
    pub collected: bool,
    pub spawn_time: Millis,
}
