use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;

use gagaball_core::player::PlayerId;
use gagaball_sim::ai::{AiState, AiWorld, Difficulty, steer};
use gagaball_sim::{MatchSim, PlayerIntent};

/// Drives a local human with the bot controller, so a headless host has
/// humans that actually dodge. Parries when the ball is inbound and in range.
pub struct Autopilot {
    ai: AiState,
    rng: StdRng,
}

impl Autopilot {
    pub fn new(difficulty: Difficulty, seed: u64) -> Self {
        Self {
            ai: AiState::new(difficulty, Vec2::ZERO),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn intent(&mut self, sim: &MatchSim) -> PlayerIntent {
        let Some(me) = sim.local_player().filter(|p| p.is_active()) else {
            return PlayerIntent::default();
        };
        let state = sim.state();
        let ball = &state.ball;
        let living: Vec<(PlayerId, Vec2)> = state
            .players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| (p.id, p.position))
            .collect();
        let world = AiWorld {
            now: state.elapsed_ms,
            arena: &state.arena,
            self_id: me.id,
            self_position: me.position,
            ball_position: ball.position,
            ball_velocity: ball.velocity,
            players: &living,
        };
        let movement = steer(&mut self.ai, &world, &mut self.rng);

        let to_me = me.position - ball.position;
        let parry_pressed = me.parry.can_parry
            && to_me.length() < sim.config().parry_range
            && ball.velocity.dot(to_me) > 0.0;
        PlayerIntent {
            movement,
            parry_pressed,
        }
    }
}
