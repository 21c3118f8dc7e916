use glam::Vec2;
use rand::Rng;
use rand::seq::IndexedRandom;

use gagaball_core::powerup::{ActivePowerup, PowerupKind};
use gagaball_core::time::Millis;

use crate::arena::Arena;
use crate::config::MatchConfig;
use crate::entity::{Ball, Player, Powerup};

/// Timed power-up spawner. One power-up appears after the first delay, then
/// one per interval until the match is over.
#[derive(Debug, Clone)]
pub struct PowerupSpawner {
    pub next_spawn_at: Millis,
    next_id: u32,
}

impl PowerupSpawner {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            next_spawn_at: config.powerup_first_spawn_ms,
            next_id: 1,
        }
    }

    /// Spawn a power-up if one is due. A finished match never spawns, and the
    /// schedule is not advanced either.
    pub fn poll(
        &mut self,
        now: Millis,
        game_over: bool,
        arena: &Arena,
        rng: &mut impl Rng,
        config: &MatchConfig,
    ) -> Option<Powerup> {
        if game_over || now < self.next_spawn_at {
            return None;
        }
        self.next_spawn_at = now + config.powerup_spawn_interval_ms.max(1);

        let kind = *PowerupKind::ALL.choose(rng)?;
        let position = arena.random_point_within(config.powerup_spawn_radius_fraction, rng);
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        Some(Powerup {
            id,
            kind,
            position,
            collected: false,
            spawn_time: now,
        })
    }
}

/// Whether `player` is close enough to collect `powerup`. Players driven by
/// another peer collect on that peer and report the result in their updates.
pub fn touching(powerup: &Powerup, player: &Player, config: &MatchConfig) -> bool {
    !powerup.collected
        && player.is_active()
        && !player.is_network_driven()
        && powerup.position.distance(player.position) < config.powerup_radius + player.radius
}

/// Give `holder_index` the effect of `kind`. Replaces any power-up the holder
/// already had. Freeze Time freezes every other active player instead of
/// granting the holder anything lasting beyond the indicator.
pub fn apply_effect(
    players: &mut [Player],
    holder_index: usize,
    kind: PowerupKind,
    now: Millis,
    config: &MatchConfig,
) {
    let duration = config.powerup_duration_ms;
    let Some(holder) = players.get_mut(holder_index) else {
        return;
    };
    holder.active_powerup = Some(ActivePowerup::new(kind, now, duration));
    let holder_id = holder.id;

    if kind == PowerupKind::FreezeTime {
        for other in players.iter_mut() {
            if other.id != holder_id && other.is_active() {
                other.frozen_until = Some(now + duration);
                other.velocity = Vec2::ZERO;
            }
        }
    }
}

/// Velocity change per second the magnets in play exert on the ball.
pub fn magnet_acceleration(ball: &Ball, players: &[Player], config: &MatchConfig) -> Vec2 {
    players
        .iter()
        .filter(|p| p.is_active() && p.has_powerup(PowerupKind::Magnet))
        .filter_map(|p| {
            let offset = p.position - ball.position;
            let distance = offset.length();
            if distance >= config.magnet_range {
                return None;
            }
            let pull = config.magnet_strength / distance.max(1.0);
            Some(offset.normalize_or_zero() * pull)
        })
        .sum()
}

/// Movement speed for `player`, including a speed boost.
pub fn movement_speed(player: &Player, config: &MatchConfig) -> f32 {
    let base = if player.is_ai() {
        config.player_speed * config.ai_speed_factor
    } else {
        config.player_speed
    };
    if player.has_powerup(PowerupKind::SpeedBoost) {
        base * config.speed_boost_multiplier
    } else {
        base
    }
}
