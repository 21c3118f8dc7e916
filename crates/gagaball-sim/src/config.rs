use serde::{Deserialize, Serialize};

use gagaball_core::time::Millis;

/// Data-driven tuning for a match. Distances are arena units, speeds are
/// units per second, times are milliseconds unless suffixed otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub arena_radius: f32,
    pub ball_radius: f32,
    pub player_radius: f32,
    /// Fraction of the arena radius on which players spawn.
    pub spawn_ring_fraction: f32,

    /// Human movement speed.
    pub player_speed: f32,
    /// AI movement speed as a fraction of `player_speed`.
    pub ai_speed_factor: f32,
    /// Multiplier while holding a speed-boost power-up.
    pub speed_boost_multiplier: f32,

    /// Ball speed at kickoff.
    pub ball_launch_speed: f32,
    /// Ball speed cap before the per-match multiplier is applied.
    pub ball_max_speed: f32,
    /// Wall bounce energy retained (0..1).
    pub wall_damping: f32,
    /// The ball is never allowed to slow below this after a wall bounce.
    pub min_ball_speed: f32,

    /// Deflection speed before modifiers.
    pub hit_power: f32,
    pub parry_multiplier: f32,
    pub double_bounce_multiplier: f32,
    /// Added to the ball's speed multiplier on each parry.
    pub speed_multiplier_increment: f32,
    pub speed_multiplier_cap: f32,
    /// Player speed above which a touch counts as a swing.
    pub swing_velocity_threshold: f32,
    /// Ball speed above which a touch eliminates.
    pub elimination_speed_threshold: f32,
    /// Distance from player centre to ball centre at which an armed parry fires.
    pub parry_range: f32,
    /// How long a parry press stays armed.
    pub parry_window_ms: Millis,
    pub parry_cooldown_ms: Millis,
    /// Delay before the ball picks a new target after a deflection.
    pub retarget_delay_ms: Millis,
    pub invulnerability_ms: Millis,

    pub powerup_radius: f32,
    pub powerup_first_spawn_ms: Millis,
    pub powerup_spawn_interval_ms: Millis,
    pub powerup_duration_ms: Millis,
    /// Power-ups spawn within this fraction of the arena radius.
    pub powerup_spawn_radius_fraction: f32,
    pub magnet_range: f32,
    /// Within range the ball accelerates toward the holder at
    /// `magnet_strength / distance` units per second squared.
    pub magnet_strength: f32,

    pub round_duration_secs: f32,
    /// Time between the end condition and the match being final.
    pub ending_delay_ms: Millis,
    pub slow_motion_ms: Millis,
    pub slow_motion_scale: f32,
    pub max_ai_opponents: usize,
    /// Window over which a remote player glides to its latest reported position.
    pub remote_interpolation_ms: Millis,

    pub coins_per_win: u32,
    pub coins_per_elimination: u32,
    pub coins_per_survival: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            arena_radius: 300.0,
            ball_radius: 12.0,
            player_radius: 20.0,
            spawn_ring_fraction: 0.7,
            player_speed: 200.0,
            ai_speed_factor: 0.9,
            speed_boost_multiplier: 1.5,
            ball_launch_speed: 400.0,
            ball_max_speed: 800.0,
            wall_damping: 0.9,
            min_ball_speed: 120.0,
            hit_power: 350.0,
            parry_multiplier: 2.0,
            double_bounce_multiplier: 1.5,
            speed_multiplier_increment: 0.1,
            speed_multiplier_cap: 2.0,
            swing_velocity_threshold: 50.0,
            elimination_speed_threshold: 150.0,
            parry_range: 60.0,
            parry_window_ms: 200,
            parry_cooldown_ms: 1_000,
            retarget_delay_ms: 300,
            invulnerability_ms: 1_500,
            powerup_radius: 15.0,
            powerup_first_spawn_ms: 10_000,
            powerup_spawn_interval_ms: 15_000,
            powerup_duration_ms: 5_000,
            powerup_spawn_radius_fraction: 0.6,
            magnet_range: 100.0,
            magnet_strength: 12_000.0,
            round_duration_secs: 45.0,
            ending_delay_ms: 1_500,
            slow_motion_ms: 800,
            slow_motion_scale: 0.3,
            max_ai_opponents: 7,
            remote_interpolation_ms: 50,
            coins_per_win: 100,
            coins_per_elimination: 25,
            coins_per_survival: 10,
        }
    }
}

impl MatchConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("GAGABALL_MATCH_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        if let Ok(contents) = std::fs::read_to_string("config/match.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }

    /// Check the values the simulation relies on. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("arena_radius", self.arena_radius),
            ("ball_radius", self.ball_radius),
            ("player_radius", self.player_radius),
            ("player_speed", self.player_speed),
            ("hit_power", self.hit_power),
            ("min_ball_speed", self.min_ball_speed),
            ("ball_max_speed", self.ball_max_speed),
            ("round_duration_secs", self.round_duration_secs),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(format!("{name} must be > 0 (got {v})"));
            }
        }
        if self.player_radius >= self.arena_radius || self.ball_radius >= self.arena_radius {
            return Err("entities must fit inside the arena".to_string());
        }
        if !(0.0..=1.0).contains(&self.wall_damping) {
            return Err(format!("wall_damping must be in 0..=1 (got {})", self.wall_damping));
        }
        if self.speed_multiplier_cap < 1.0 {
            return Err(format!(
                "speed_multiplier_cap must be >= 1 (got {})",
                self.speed_multiplier_cap
            ));
        }
        if self.min_ball_speed > self.ball_max_speed {
            return Err("min_ball_speed must not exceed ball_max_speed".to_string());
        }
        if !(0.0..=1.0).contains(&self.slow_motion_scale) {
            return Err(format!(
                "slow_motion_scale must be in 0..=1 (got {})",
                self.slow_motion_scale
            ));
        }
        Ok(())
    }

    pub fn round_duration_ms(&self) -> Millis {
        (self.round_duration_secs * 1000.0) as Millis
    }
}
