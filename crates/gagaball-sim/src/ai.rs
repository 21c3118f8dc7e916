use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use gagaball_core::player::PlayerId;
use gagaball_core::time::Millis;

use crate::arena::Arena;

/// Ball closer than this may trigger a dodge.
const DANGER_RADIUS: f32 = 150.0;
/// Ball must be at least this fast to be worth dodging.
const DODGE_SPEED: f32 = 100.0;
/// Half-angle of the cone in which the ball counts as heading at the bot.
const DODGE_CONE: f32 = std::f32::consts::FRAC_PI_4;
/// How far sideways a dodge aims.
const DODGE_DISTANCE: f32 = 100.0;
/// Ball within this distance and below `SLOW_BALL_SPEED` invites an attack.
const ATTACK_RADIUS: f32 = 60.0;
const SLOW_BALL_SPEED: f32 = 100.0;
/// Aim jitter at zero accuracy when attacking.
const ATTACK_JITTER: f32 = 50.0;
const CHASE_RADIUS: f32 = 200.0;
/// Beyond this fraction of the radius an idle bot drifts back toward centre.
const IDLE_WALL_FRACTION: f32 = 0.7;
const IDLE_JITTER: f32 = 50.0;
/// Close enough to the target to stop moving.
const ARRIVE_RADIUS: f32 = 5.0;

/// AI difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// Tuning tuple for a difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyProfile {
    pub reaction_delay_ms: Millis,
    /// Probability of dodging the right way, and how tightly attacks aim.
    pub accuracy: f32,
    /// Probability of going for an opponent when the ball is at the bot's feet.
    pub aggression: f32,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// Draw weights for [`DifficultyAssignment::Weighted`].
    const WEIGHTS: [f32; 4] = [0.3, 0.4, 0.2, 0.1];

    pub fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => DifficultyProfile {
                reaction_delay_ms: 800,
                accuracy: 0.4,
                aggression: 0.3,
            },
            Self::Medium => DifficultyProfile {
                reaction_delay_ms: 500,
                accuracy: 0.6,
                aggression: 0.5,
            },
            Self::Hard => DifficultyProfile {
                reaction_delay_ms: 300,
                accuracy: 0.8,
                aggression: 0.7,
            },
            Self::Expert => DifficultyProfile {
                reaction_delay_ms: 150,
                accuracy: 0.9,
                aggression: 0.85,
            },
        }
    }

    /// Spread tiers across bots by position: the first quarter are easy, the
    /// last quarter expert.
    pub fn for_index(index: usize, total: usize) -> Self {
        let tiers = Self::ALL.len();
        let slot = (index * tiers) / total.max(1);
        Self::ALL[slot.min(tiers - 1)]
    }

    /// Weighted random tier (30/40/20/10).
    pub fn weighted(rng: &mut impl Rng) -> Self {
        let roll: f32 = rng.random();
        let mut cumulative = 0.0;
        for (tier, weight) in Self::ALL.iter().zip(Self::WEIGHTS) {
            cumulative += weight;
            if roll < cumulative {
                return *tier;
            }
        }
        Self::Medium
    }
}

/// How difficulty tiers are handed out to bots at match setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyAssignment {
    #[default]
    ByIndex,
    Weighted,
}

impl DifficultyAssignment {
    pub fn assign(self, index: usize, total: usize, rng: &mut impl Rng) -> Difficulty {
        match self {
            Self::ByIndex => Difficulty::for_index(index, total),
            Self::Weighted => Difficulty::weighted(rng),
        }
    }
}

/// What a bot decided to do at its last re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AiMode {
    #[default]
    Idle,
    Chasing,
    Dodging,
    Attacking,
}

/// Per-bot controller state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiState {
    pub difficulty: Difficulty,
    pub mode: AiMode,
    /// Point the bot walks toward between re-evaluations.
    pub target: Vec2,
    pub next_decision_at: Millis,
}

impl AiState {
    pub fn new(difficulty: Difficulty, position: Vec2) -> Self {
        Self {
            difficulty,
            mode: AiMode::Idle,
            target: position,
            next_decision_at: 0,
        }
    }
}

/// Read-only view of the world a bot reasons about.
#[derive(Debug, Clone, Copy)]
pub struct AiWorld<'a> {
    pub now: Millis,
    pub arena: &'a Arena,
    pub self_id: PlayerId,
    pub self_position: Vec2,
    pub ball_position: Vec2,
    pub ball_velocity: Vec2,
    /// Living players, in insertion order. May include the bot itself.
    pub players: &'a [(PlayerId, Vec2)],
}

/// Produce a unit (or zero) movement direction for one bot.
///
/// The decision is only re-evaluated once the bot's reaction delay has
/// elapsed; in between it keeps walking toward its previous target.
pub fn steer(ai: &mut AiState, world: &AiWorld<'_>, rng: &mut impl Rng) -> Vec2 {
    if world.now >= ai.next_decision_at {
        decide(ai, world, rng);
        ai.next_decision_at = world.now + ai.difficulty.profile().reaction_delay_ms;
    }
    move_direction(world.self_position, ai.target)
}

fn decide(ai: &mut AiState, world: &AiWorld<'_>, rng: &mut impl Rng) {
    let profile = ai.difficulty.profile();
    let to_self = world.self_position - world.ball_position;
    let distance = to_self.length();
    let ball_speed = world.ball_velocity.length();

    let heading_at_bot = ball_speed > f32::EPSILON
        && distance > f32::EPSILON
        && heading_angle(world.ball_velocity, to_self) < DODGE_CONE;

    if heading_at_bot && distance < DANGER_RADIUS && ball_speed > DODGE_SPEED {
        ai.mode = AiMode::Dodging;
        // Step sideways off the ball's line, away from it
        let mut side = world.ball_velocity.perp().normalize_or_zero();
        if side.dot(to_self) < 0.0 {
            side = -side;
        }
        if rng.random::<f32>() > profile.accuracy {
            side = -side;
        }
        ai.target = world.self_position + side * DODGE_DISTANCE;
    } else if distance < ATTACK_RADIUS && ball_speed < SLOW_BALL_SPEED {
        ai.mode = AiMode::Attacking;
        let opponent = nearest_opponent(world);
        match opponent {
            Some(target) if rng.random::<f32>() < profile.aggression => {
                let spread = (1.0 - profile.accuracy) * ATTACK_JITTER;
                let jitter = Vec2::new(rng.random::<f32>() - 0.5, rng.random::<f32>() - 0.5) * spread;
                ai.target = target + jitter;
            },
            _ => ai.target = world.ball_position,
        }
    } else if distance < CHASE_RADIUS {
        ai.mode = AiMode::Chasing;
        ai.target = world.ball_position;
    } else {
        ai.mode = AiMode::Idle;
        let from_center = world.self_position - world.arena.center;
        if from_center.length() > world.arena.radius * IDLE_WALL_FRACTION {
            ai.target = world.arena.center + from_center * 0.5;
        } else {
            let jitter = Vec2::new(rng.random::<f32>() - 0.5, rng.random::<f32>() - 0.5) * IDLE_JITTER;
            ai.target = world.self_position + jitter;
        }
    }
}

fn nearest_opponent(world: &AiWorld<'_>) -> Option<Vec2> {
    let mut best: Option<(f32, Vec2)> = None;
    for &(id, pos) in world.players {
        if id == world.self_id {
            continue;
        }
        let d = pos.distance_squared(world.self_position);
        // Strict comparison keeps the earliest-inserted player on ties
        if best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, pos));
        }
    }
    best.map(|(_, pos)| pos)
}

/// Unsigned angle between two non-zero vectors.
fn heading_angle(a: Vec2, b: Vec2) -> f32 {
    let cos = a.dot(b) / (a.length() * b.length());
    cos.clamp(-1.0, 1.0).acos()
}

fn move_direction(from: Vec2, to: Vec2) -> Vec2 {
    let delta = to - from;
    if delta.length() < ARRIVE_RADIUS {
        Vec2::ZERO
    } else {
        delta.normalize()
    }
}
