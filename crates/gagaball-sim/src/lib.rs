pub mod ai;
pub mod arena;
pub mod collision;
pub mod config;
pub mod entity;
pub mod lifecycle;
pub mod powerups;
pub mod setup;
pub mod snapshot;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use gagaball_core::net::messages::PositionFlags;
use gagaball_core::player::PlayerId;
use gagaball_core::powerup::{ActivePowerup, PowerupKind};
use gagaball_core::progression::ProgressionStore;
use gagaball_core::time::{Millis, secs_to_millis};

use ai::{AiState, AiWorld};
use arena::Arena;
use collision::ContactOutcome;
use config::MatchConfig;
use entity::{Ball, Player, PlayerRole, Powerup, RemoteTrack, spawn_player};
use lifecycle::{
    EndDecision, EndReason, MatchLifecycle, MatchOutcome, MatchPhase, MatchReport,
    compute_rewards, evaluate_end,
};
use powerups::PowerupSpawner;
use setup::{MatchSetup, MatchSetupError};
use snapshot::{BallView, MatchSnapshot, PlayerView, PowerupView};

/// Aggregate match state, owned by one [`MatchSim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    pub arena: Arena,
    pub ball: Ball,
    /// Insertion order is join order and breaks every tie.
    pub players: Vec<Player>,
    pub powerups: Vec<Powerup>,
    pub elapsed_ms: Millis,
    pub elimination_count: u32,
    pub game_over: bool,
    pub winner_id: Option<PlayerId>,
    pub slow_motion_until: Option<Millis>,
}

impl MatchState {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Ids of players still in play, in insertion order.
    pub fn living_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.id)
            .collect()
    }
}

/// Per-frame input for the local human.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerIntent {
    /// Desired direction; longer than one is clamped, non-finite is ignored.
    pub movement: Vec2,
    pub parry_pressed: bool,
}

impl PlayerIntent {
    pub fn moving(direction: Vec2) -> Self {
        Self {
            movement: direction,
            parry_pressed: false,
        }
    }

    fn direction(&self) -> Vec2 {
        if self.movement.is_finite() {
            self.movement.clamp_length_max(1.0)
        } else {
            Vec2::ZERO
        }
    }
}

/// Things that happened during a step, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    ParryArmed {
        player_id: PlayerId,
    },
    WallBounce {
        stall_reset: bool,
    },
    BallDeflected {
        player_id: PlayerId,
        parry: bool,
        speed: f32,
    },
    /// Detected by this process's own collision pass.
    PlayerEliminated {
        player_id: PlayerId,
    },
    PowerupSpawned {
        id: u32,
        kind: PowerupKind,
        position: Vec2,
    },
    PowerupCollected {
        id: u32,
        kind: PowerupKind,
        player_id: PlayerId,
    },
    PowerupExpired {
        player_id: PlayerId,
        kind: PowerupKind,
    },
    TargetChanged {
        target: Option<PlayerId>,
    },
    MatchEnding {
        outcome: MatchOutcome,
        reason: EndReason,
        winner_id: Option<PlayerId>,
    },
    MatchEnded(MatchReport),
}

/// The match simulation core. Single-threaded; advanced once per frame by
/// [`MatchSim::step`], with network truth merged in between steps.
pub struct MatchSim {
    config: MatchConfig,
    state: MatchState,
    local_id: PlayerId,
    lifecycle: MatchLifecycle,
    spawner: PowerupSpawner,
    rng: StdRng,
    /// Eliminations of others seen while the local human was still alive.
    witnessed_eliminations: u32,
}

impl MatchSim {
    pub fn new(config: MatchConfig, setup: &MatchSetup) -> Result<Self, MatchSetupError> {
        setup.validate(&config)?;
        let arena = Arena::new(Vec2::ZERO, config.arena_radius)?;
        let mut rng = StdRng::seed_from_u64(setup.seed);

        // Kickoff is drawn first so every peer agrees on it regardless of who
        // runs the bots
        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let ball = Ball::new(
            arena.center,
            Vec2::from_angle(angle) * config.ball_launch_speed,
            &config,
        );

        let mut spawns = arena
            .spawn_points(setup.total_players(), config.spawn_ring_fraction)
            .into_iter();
        let mut players = Vec::with_capacity(setup.total_players());

        for (id, name) in &setup.humans {
            let position = spawns.next().unwrap_or(arena.center);
            let role = if *id == setup.local_player_id {
                PlayerRole::LocalHuman
            } else {
                PlayerRole::RemoteHuman(RemoteTrack::at_rest(
                    position,
                    config.remote_interpolation_ms,
                ))
            };
            players.push(spawn_player(*id, name.clone(), position, role, 0, &config));
        }

        for i in 0..setup.ai_opponents {
            let position = spawns.next().unwrap_or(arena.center);
            let role = if setup.simulate_ai {
                let difficulty = setup.difficulty.assign(i, setup.ai_opponents, &mut rng);
                PlayerRole::Ai(AiState::new(difficulty, position))
            } else {
                PlayerRole::RemoteHuman(RemoteTrack::at_rest(
                    position,
                    config.remote_interpolation_ms,
                ))
            };
            players.push(spawn_player(
                MatchSetup::ai_player_id(i),
                format!("Bot {}", i + 1),
                position,
                role,
                0,
                &config,
            ));
        }

        Ok(Self {
            spawner: PowerupSpawner::new(&config),
            state: MatchState {
                arena,
                ball,
                players,
                powerups: Vec::new(),
                elapsed_ms: 0,
                elimination_count: 0,
                game_over: false,
                winner_id: None,
                slow_motion_until: None,
            },
            local_id: setup.local_player_id,
            lifecycle: MatchLifecycle::new(),
            rng,
            witnessed_eliminations: 0,
            config,
        })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> MatchPhase {
        self.lifecycle.phase()
    }

    pub fn local_player_id(&self) -> PlayerId {
        self.local_id
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.state.player(self.local_id)
    }

    pub fn report(&self) -> Option<&MatchReport> {
        self.lifecycle.report()
    }

    /// Past RUNNING; physics is frozen.
    pub fn is_over(&self) -> bool {
        self.lifecycle.is_over()
    }

    pub fn is_ended(&self) -> bool {
        self.lifecycle.phase() == MatchPhase::Ended
    }

    /// SETUP -> RUNNING.
    pub fn start(&mut self) -> bool {
        let started = self.lifecycle.start();
        if started {
            tracing::info!(
                players = self.state.players.len(),
                local_player = self.local_id,
                "Match started"
            );
        }
        started
    }

    pub fn is_slow_motion(&self) -> bool {
        self.state
            .slow_motion_until
            .is_some_and(|until| self.state.elapsed_ms < until)
    }

    /// Advance the match by `dt` seconds of wall-clock time.
    ///
    /// Phases run in a fixed order: expire timed flags, control, move
    /// players, move the ball, ball contacts, power-ups, targeting, end
    /// conditions. While ENDING only the clock runs.
    pub fn step(&mut self, dt: f32, intent: &PlayerIntent) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        let real_ms = secs_to_millis(dt);

        match self.lifecycle.phase() {
            MatchPhase::Setup | MatchPhase::Ended => return events,
            MatchPhase::Ending { .. } => {
                self.state.elapsed_ms += real_ms;
                self.finish_if_due(&mut events);
                return events;
            },
            MatchPhase::Running => {},
        }

        let now = self.state.elapsed_ms + real_ms;
        self.state.elapsed_ms = now;
        let dt = self.physics_dt(dt, now);

        self.expire_transient_states(now, &mut events);
        self.control_players(now, intent, &mut events);
        self.integrate_players(dt);
        self.integrate_ball(dt, &mut events);
        self.resolve_contacts(now, &mut events);
        self.resolve_powerups(now, &mut events);
        self.retarget_ball(now, &mut events);
        self.check_end_conditions(now, &mut events);
        events
    }

    /// Scale the frame for slow motion. Restoring normal speed is skipped once
    /// the match is over.
    fn physics_dt(&mut self, dt: f32, now: Millis) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        match self.state.slow_motion_until {
            Some(until) if now < until => dt * self.config.slow_motion_scale,
            Some(_) => {
                if !self.state.game_over {
                    self.state.slow_motion_until = None;
                }
                dt
            },
            None => dt,
        }
    }

    fn expire_transient_states(&mut self, now: Millis, events: &mut Vec<MatchEvent>) {
        for player in &mut self.state.players {
            if let Some(kind) = player.expire_transient_states(now) {
                events.push(MatchEvent::PowerupExpired {
                    player_id: player.id,
                    kind,
                });
            }
        }
    }

    fn control_players(&mut self, now: Millis, intent: &PlayerIntent, events: &mut Vec<MatchEvent>) {
        let arena = self.state.arena;
        let ball_position = self.state.ball.position;
        let ball_velocity = self.state.ball.velocity;
        let living: Vec<(PlayerId, Vec2)> = self
            .state
            .players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| (p.id, p.position))
            .collect();

        for player in &mut self.state.players {
            if !player.is_active() {
                continue;
            }
            let speed = powerups::movement_speed(player, &self.config);
            let frozen = player.is_frozen(now);
            let id = player.id;
            let position = player.position;

            match &mut player.role {
                PlayerRole::RemoteHuman(track) => {
                    player.position = track.position_at(now);
                    player.velocity = track.velocity_at(now);
                },
                _ if frozen => player.velocity = Vec2::ZERO,
                PlayerRole::LocalHuman => {
                    if intent.parry_pressed && player.parry.press(now, self.config.parry_window_ms) {
                        events.push(MatchEvent::ParryArmed { player_id: id });
                    }
                    player.velocity = intent.direction() * speed;
                },
                PlayerRole::Ai(ai) => {
                    let world = AiWorld {
                        now,
                        arena: &arena,
                        self_id: id,
                        self_position: position,
                        ball_position,
                        ball_velocity,
                        players: &living,
                    };
                    player.velocity = ai::steer(ai, &world, &mut self.rng) * speed;
                },
            }
        }
    }

    fn integrate_players(&mut self, dt: f32) {
        let arena = self.state.arena;
        for player in &mut self.state.players {
            if !player.is_active() {
                continue;
            }
            if !player.is_network_driven() {
                player.position += player.velocity * dt;
            }
            player.position = arena.clamp(player.position, player.radius);
        }
    }

    fn integrate_ball(&mut self, dt: f32, events: &mut Vec<MatchEvent>) {
        let pull =
            powerups::magnet_acceleration(&self.state.ball, &self.state.players, &self.config);
        let ball = &mut self.state.ball;
        ball.velocity += pull * dt;
        ball.velocity = ball.velocity.clamp_length_max(ball.max_speed(&self.config));
        ball.position += ball.velocity * dt;

        if let Some(contact) = arena::bounce_off_wall(
            &self.state.arena,
            ball.position,
            ball.velocity,
            ball.radius,
            self.config.wall_damping,
            self.config.min_ball_speed,
            &mut self.rng,
        ) {
            ball.position = contact.position;
            ball.velocity = contact.velocity;
            events.push(MatchEvent::WallBounce {
                stall_reset: contact.stall_reset,
            });
        }
    }

    /// Contacts resolve in insertion order. Every vulnerable player touching
    /// the ball is eliminated; a deflection sends the ball away and ends the
    /// pass.
    fn resolve_contacts(&mut self, now: Millis, events: &mut Vec<MatchEvent>) {
        for index in 0..self.state.players.len() {
            let outcome = collision::classify_contact(
                &self.state.ball,
                &self.state.players[index],
                now,
                &self.config,
            );
            match outcome {
                Some(ContactOutcome::Deflected { parry }) => {
                    let player = &mut self.state.players[index];
                    let speed =
                        collision::deflect(&mut self.state.ball, player, parry, now, &self.config);
                    tracing::debug!(player_id = player.id, parry, speed, "Ball deflected");
                    events.push(MatchEvent::BallDeflected {
                        player_id: player.id,
                        parry,
                        speed,
                    });
                    return;
                },
                Some(ContactOutcome::Eliminated) => {
                    if let Some(player_id) = self.eliminate_at(index, now) {
                        events.push(MatchEvent::PlayerEliminated { player_id });
                    }
                },
                Some(ContactOutcome::PassThrough) | None => {},
            }
        }
    }

    /// Shared by local detection and network reports. Returns the id on the
    /// ALIVE -> ELIMINATED transition, `None` if the player was already out.
    fn eliminate_at(&mut self, index: usize, now: Millis) -> Option<PlayerId> {
        let local_alive = self.local_player().is_some_and(Player::is_active);
        let player = self.state.players.get_mut(index)?;
        if player.departed || !player.eliminate(now, &self.state.arena) {
            return None;
        }
        let id = player.id;

        self.state.elimination_count += 1;
        if local_alive && id != self.local_id {
            self.witnessed_eliminations += 1;
        }
        if self.state.ball.current_target == Some(id) {
            self.state.ball.current_target = None;
        }
        if !self.state.game_over && !self.is_slow_motion() {
            self.state.slow_motion_until = Some(now + self.config.slow_motion_ms);
        }
        tracing::debug!(
            player_id = id,
            elimination_count = self.state.elimination_count,
            "Player eliminated"
        );
        Some(id)
    }

    fn resolve_powerups(&mut self, now: Millis, events: &mut Vec<MatchEvent>) {
        if let Some(powerup) = self.spawner.poll(
            now,
            self.state.game_over,
            &self.state.arena,
            &mut self.rng,
            &self.config,
        ) {
            events.push(MatchEvent::PowerupSpawned {
                id: powerup.id,
                kind: powerup.kind,
                position: powerup.position,
            });
            self.state.powerups.push(powerup);
        }

        for powerup in &mut self.state.powerups {
            let holder = self
                .state
                .players
                .iter()
                .position(|p| powerups::touching(powerup, p, &self.config));
            let Some(holder) = holder else {
                continue;
            };
            powerup.collected = true;
            powerups::apply_effect(&mut self.state.players, holder, powerup.kind, now, &self.config);
            let player_id = self.state.players[holder].id;
            tracing::debug!(player_id, kind = powerup.kind.label(), "Power-up collected");
            events.push(MatchEvent::PowerupCollected {
                id: powerup.id,
                kind: powerup.kind,
                player_id,
            });
        }
        self.state.powerups.retain(|p| !p.collected);
    }

    /// Drop a target that is out of play, then pick the nearest active player
    /// unless the post-deflection lock is still running.
    fn retarget_ball(&mut self, now: Millis, events: &mut Vec<MatchEvent>) {
        let players = &mut self.state.players;
        let ball = &mut self.state.ball;
        let before = ball.current_target;

        if let Some(id) = ball.current_target
            && !players.iter().any(|p| p.id == id && p.is_active())
        {
            ball.current_target = None;
        }

        if ball.current_target.is_none() && !ball.is_locked(now) {
            let mut nearest: Option<(f32, PlayerId)> = None;
            for p in players.iter().filter(|p| p.is_active()) {
                let d = p.position.distance_squared(ball.position);
                if nearest.is_none_or(|(best, _)| d < best) {
                    nearest = Some((d, p.id));
                }
            }
            ball.current_target = nearest.map(|(_, id)| id);
        }

        for p in players.iter_mut() {
            p.is_targeted = ball.current_target == Some(p.id);
        }
        if ball.current_target != before {
            events.push(MatchEvent::TargetChanged {
                target: ball.current_target,
            });
        }
    }

    fn check_end_conditions(&mut self, now: Millis, events: &mut Vec<MatchEvent>) {
        let living = self.state.living_ids();
        if let Some(decision) = evaluate_end(
            self.local_id,
            &living,
            now,
            self.config.round_duration_ms(),
        ) && self.lifecycle.begin_ending(now, decision.outcome, decision.reason)
        {
            self.enter_ending(decision, events);
        }
    }

    fn enter_ending(&mut self, decision: EndDecision, events: &mut Vec<MatchEvent>) {
        self.state.game_over = true;
        self.state.winner_id = decision.winner_id;
        for p in &mut self.state.players {
            p.velocity = Vec2::ZERO;
        }
        tracing::info!(
            outcome = ?decision.outcome,
            reason = ?decision.reason,
            winner_id = ?decision.winner_id,
            elapsed_ms = self.state.elapsed_ms,
            "Match ending"
        );
        events.push(MatchEvent::MatchEnding {
            outcome: decision.outcome,
            reason: decision.reason,
            winner_id: decision.winner_id,
        });
    }

    fn finish_if_due(&mut self, events: &mut Vec<MatchEvent>) {
        let MatchPhase::Ending {
            since,
            outcome,
            reason,
        } = self.lifecycle.phase()
        else {
            return;
        };
        if !self
            .lifecycle
            .ending_due(self.state.elapsed_ms, self.config.ending_delay_ms)
        {
            return;
        }

        let survived = self.local_player().is_some_and(Player::is_active);
        let report = MatchReport {
            outcome,
            reason,
            winner_id: self.state.winner_id,
            elimination_count: self.state.elimination_count,
            duration_secs: since as f32 / 1000.0,
            survived,
            rewards: compute_rewards(outcome, self.witnessed_eliminations, survived, &self.config),
        };
        if self.lifecycle.finish(report.clone()) {
            self.state.powerups.clear();
            tracing::info!(outcome = ?outcome, coins = report.total_coins(), "Match ended");
            events.push(MatchEvent::MatchEnded(report));
        }
    }

    /// How the local peer reads a host-declared result: a win when named the
    /// winner, or when no winner is named and the local human is still in.
    pub fn host_decision(&self, winner_id: Option<PlayerId>) -> EndDecision {
        let local_alive = self.local_player().is_some_and(Player::is_active);
        let won = match winner_id {
            Some(id) => id == self.local_id,
            None => local_alive,
        };
        EndDecision {
            outcome: if won {
                MatchOutcome::Won
            } else {
                MatchOutcome::Lost
            },
            reason: EndReason::HostDeclared,
            winner_id,
        }
    }

    /// End the match from outside the tick, e.g. on `MatchOver` or when the
    /// host is lost. Overrides a local result that is still playing out.
    pub fn declare_result(&mut self, decision: EndDecision) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if self
            .lifecycle
            .declare(self.state.elapsed_ms, decision.outcome, decision.reason)
        {
            self.enter_ending(decision, &mut events);
        }
        events
    }

    /// Overwrite the ball with host truth. The local result for this tick is
    /// discarded outright.
    pub fn apply_ball_state(&mut self, position: Vec2, velocity: Vec2, speed_multiplier: f32) -> bool {
        if self.is_ended() || !position.is_finite() || !velocity.is_finite() || !speed_multiplier.is_finite() {
            return false;
        }
        let ball = &mut self.state.ball;
        ball.position = self.state.arena.clamp(position, ball.radius);
        ball.velocity = velocity;
        ball.speed_multiplier = speed_multiplier.clamp(1.0, self.config.speed_multiplier_cap.max(1.0));
        true
    }

    /// Feed a network-driven player's reported position. Updates for unknown,
    /// out-of-play, or locally driven players are dropped.
    pub fn apply_remote_position(&mut self, id: PlayerId, position: Vec2, flags: &PositionFlags) -> bool {
        if self.is_ended() || !position.is_finite() {
            return false;
        }
        let now = self.state.elapsed_ms;
        let arena = self.state.arena;
        let Some(player) = self.state.players.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if !player.is_active() {
            return false;
        }
        let current = player.position;
        let target = arena.clamp(position, player.radius);
        let PlayerRole::RemoteHuman(track) = &mut player.role else {
            return false;
        };
        track.retarget(current, target, now);

        if flags.parry_pressed {
            player.parry.press(now, self.config.parry_window_ms);
        }
        match flags.active_powerup {
            Some(kind) if !player.has_powerup(kind) => {
                player.active_powerup =
                    Some(ActivePowerup::new(kind, now, self.config.powerup_duration_ms));
            },
            Some(_) => {},
            None => player.active_powerup = None,
        }
        true
    }

    /// Apply an elimination reported by a peer. Idempotent.
    pub fn apply_elimination(&mut self, id: PlayerId) -> bool {
        if self.is_ended() {
            return false;
        }
        let now = self.state.elapsed_ms;
        match self.state.players.iter().position(|p| p.id == id) {
            Some(index) => self.eliminate_at(index, now).is_some(),
            None => false,
        }
    }

    /// Take a disconnected player out of play without counting it as an
    /// elimination.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.state.players.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if player.departed {
            return false;
        }
        player.departed = true;
        player.velocity = Vec2::ZERO;
        player.is_targeted = false;
        if self.state.ball.current_target == Some(id) {
            self.state.ball.current_target = None;
        }
        tracing::info!(player_id = id, "Player left the match");
        true
    }

    /// Hand the final result to progression. At most once, after ENDED.
    pub fn settle(&mut self, store: &mut impl ProgressionStore) -> bool {
        self.lifecycle.settle(store)
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        let now = self.state.elapsed_ms;
        MatchSnapshot {
            phase: self.lifecycle.phase(),
            elapsed_ms: now,
            remaining_ms: self.config.round_duration_ms().saturating_sub(now),
            elimination_count: self.state.elimination_count,
            winner_id: self.state.winner_id,
            slow_motion: self.is_slow_motion(),
            arena_center: self.state.arena.center,
            arena_radius: self.state.arena.radius,
            players: self
                .state
                .players
                .iter()
                .map(|p| PlayerView::of(p, now))
                .collect(),
            ball: BallView::from(&self.state.ball),
            powerups: self.state.powerups.iter().map(PowerupView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gagaball_core::test_helpers::RecordingProgression;

    const DT: f32 = 1.0 / 60.0;

    fn sim_with(ai: usize, seed: u64) -> MatchSim {
        let mut sim = MatchSim::new(MatchConfig::default(), &MatchSetup::single_player("You", ai, seed))
            .expect("valid setup");
        sim.start();
        sim
    }

    /// Pin a bot in place: no spawn protection, no further decisions.
    fn park(sim: &mut MatchSim, id: PlayerId, position: Vec2) {
        let player = sim
            .state
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .expect("player exists");
        player.position = position;
        player.velocity = Vec2::ZERO;
        player.invulnerable_until = None;
        if let PlayerRole::Ai(ai) = &mut player.role {
            ai.target = position;
            ai.next_decision_at = Millis::MAX;
        }
    }

    fn player(sim: &MatchSim, id: PlayerId) -> &Player {
        sim.state().player(id).expect("player exists")
    }

    fn bot(i: usize) -> PlayerId {
        MatchSetup::ai_player_id(i)
    }

    #[test]
    fn setup_lays_out_players_on_ring() {
        let sim = sim_with(7, 1);
        let state = sim.state();
        assert_eq!(state.players.len(), 8);
        assert!(state.players[0].is_local());
        assert_eq!(state.players.iter().filter(|p| p.is_local()).count(), 1);
        for p in &state.players {
            assert!((p.position.length() - 210.0).abs() < 1e-2);
            assert!(p.is_invulnerable(0));
        }
        assert_eq!(state.ball.position, Vec2::ZERO);
        assert!((state.ball.speed() - 400.0).abs() < 1e-2);
    }

    #[test]
    fn nothing_moves_before_start() {
        let mut sim =
            MatchSim::new(MatchConfig::default(), &MatchSetup::single_player("You", 1, 1)).unwrap();
        let before = sim.state().ball.position;
        assert!(sim.step(DT, &PlayerIntent::default()).is_empty());
        assert_eq!(sim.state().ball.position, before);
        assert_eq!(sim.phase(), MatchPhase::Setup);
    }

    #[test]
    fn single_elimination() {
        let mut sim = sim_with(2, 3);
        park(&mut sim, 1, Vec2::new(-200.0, 0.0));
        park(&mut sim, bot(0), Vec2::new(50.0, 0.0));
        park(&mut sim, bot(1), Vec2::new(0.0, 200.0));
        sim.state.ball.position = Vec2::new(84.0, 0.0);
        sim.state.ball.velocity = Vec2::new(-200.0, 0.0);

        let events = sim.step(DT, &PlayerIntent::default());
        assert!(!player(&sim, bot(0)).alive);
        assert_eq!(sim.state().elimination_count, 1);
        assert!(events.contains(&MatchEvent::PlayerEliminated { player_id: bot(0) }));
        assert!(sim.is_slow_motion());
        assert!(!sim.is_over(), "Two players are still in");
    }

    #[test]
    fn clustered_players_are_all_hit() {
        let mut sim = sim_with(3, 3);
        park(&mut sim, 1, Vec2::new(-200.0, 0.0));
        park(&mut sim, bot(0), Vec2::new(50.0, 5.0));
        park(&mut sim, bot(1), Vec2::new(50.0, -5.0));
        park(&mut sim, bot(2), Vec2::new(0.0, 200.0));
        sim.state.ball.position = Vec2::new(84.0, 0.0);
        sim.state.ball.velocity = Vec2::new(-200.0, 0.0);

        let events = sim.step(DT, &PlayerIntent::default());
        assert!(!player(&sim, bot(0)).alive);
        assert!(!player(&sim, bot(1)).alive);
        assert_eq!(sim.state().elimination_count, 2);
        assert!(events.contains(&MatchEvent::PlayerEliminated { player_id: bot(1) }));
    }

    #[test]
    fn deflection_shields_players_behind() {
        let mut sim = sim_with(2, 3);
        park(&mut sim, 1, Vec2::new(-200.0, 0.0));
        park(&mut sim, bot(0), Vec2::new(50.0, 5.0));
        park(&mut sim, bot(1), Vec2::new(50.0, -5.0));
        sim.state.players[1].parry.press(0, 10_000);
        sim.state.ball.position = Vec2::new(84.0, 0.0);
        sim.state.ball.velocity = Vec2::new(-200.0, 0.0);

        let events = sim.step(DT, &PlayerIntent::default());
        assert!(events.iter().any(|e| matches!(
            e,
            MatchEvent::BallDeflected { player_id, parry: true, .. } if *player_id == bot(0)
        )));
        assert!(player(&sim, bot(1)).alive);
        assert_eq!(sim.state().elimination_count, 0);
    }

    #[test]
    fn magnet_bends_passing_ball() {
        let mut sim = sim_with(1, 5);
        park(&mut sim, 1, Vec2::ZERO);
        park(&mut sim, bot(0), Vec2::new(0.0, -250.0));
        sim.state.players[0].active_powerup =
            Some(ActivePowerup::new(PowerupKind::Magnet, 0, 100_000));
        sim.state.ball.position = Vec2::new(-60.0, 50.0);
        sim.state.ball.velocity = Vec2::new(300.0, 0.0);

        for _ in 0..5 {
            sim.step(DT, &PlayerIntent::default());
        }
        assert!(
            sim.state().ball.velocity.y < -5.0,
            "Ball should curve toward the holder, got {:?}",
            sim.state().ball.velocity
        );
    }

    #[test]
    fn spawn_protection_blocks_elimination() {
        let mut sim = sim_with(1, 3);
        park(&mut sim, bot(0), Vec2::new(50.0, 0.0));
        sim.state.players[1].invulnerable_until = Some(10_000);
        sim.state.ball.position = Vec2::new(84.0, 0.0);
        sim.state.ball.velocity = Vec2::new(-790.0, 0.0);

        for _ in 0..3 {
            sim.step(DT, &PlayerIntent::default());
        }
        assert!(player(&sim, bot(0)).alive);
        assert_eq!(sim.state().elimination_count, 0);
    }

    #[test]
    fn parry_deflection() {
        let mut sim = sim_with(1, 4);
        park(&mut sim, 1, Vec2::ZERO);
        park(&mut sim, bot(0), Vec2::new(-200.0, 0.0));
        sim.state.ball.position = Vec2::new(0.0, 66.0);
        sim.state.ball.velocity = Vec2::new(0.0, -400.0);

        let intent = PlayerIntent {
            movement: Vec2::ZERO,
            parry_pressed: true,
        };
        let events = sim.step(DT, &intent);

        assert!(events.contains(&MatchEvent::ParryArmed { player_id: 1 }));
        let ball = &sim.state().ball;
        assert!((ball.speed() - 700.0).abs() < 1e-2, "speed {}", ball.speed());
        assert!(ball.velocity.y > 0.0, "Ball leaves along player->ball");
        assert!((ball.speed_multiplier - 1.1).abs() < 1e-5);
        assert_eq!(ball.current_target, None, "Target locked out after deflection");
        assert_eq!(ball.last_deflector, Some(1));
    }

    #[test]
    fn parry_presses_respect_cooldown() {
        let mut sim = sim_with(1, 4);
        park(&mut sim, bot(0), Vec2::new(-200.0, 0.0));
        let press = PlayerIntent {
            movement: Vec2::ZERO,
            parry_pressed: true,
        };
        let first = sim.step(DT, &press);
        let second = sim.step(DT, &press);
        assert!(first.contains(&MatchEvent::ParryArmed { player_id: 1 }));
        assert!(!second.contains(&MatchEvent::ParryArmed { player_id: 1 }));
    }

    #[test]
    fn wall_anti_stall() {
        let mut sim = sim_with(1, 5);
        park(&mut sim, 1, Vec2::new(-200.0, 0.0));
        park(&mut sim, bot(0), Vec2::new(0.0, -200.0));
        sim.state.ball.position = Vec2::new(285.0, 0.0);
        sim.state.ball.velocity = Vec2::new(10.0, 0.0);

        sim.step(DT, &PlayerIntent::default());
        let speed = sim.state().ball.speed();
        assert!((speed - 120.0).abs() < 1e-3, "speed {speed}");
        let before = sim.state().ball.position;
        sim.step(DT, &PlayerIntent::default());
        assert_ne!(sim.state().ball.position, before, "Ball must keep moving");
    }

    #[test]
    fn last_player_standing() {
        let mut sim = sim_with(7, 6);
        for i in 0..7 {
            assert!(sim.apply_elimination(bot(i)));
        }
        assert_eq!(sim.state().elimination_count, 7);

        let events = sim.step(DT, &PlayerIntent::default());
        assert_eq!(sim.state().winner_id, Some(1));
        assert!(sim.state().game_over);
        assert!(events.contains(&MatchEvent::MatchEnding {
            outcome: MatchOutcome::Won,
            reason: EndReason::LastPlayerStanding,
            winner_id: Some(1),
        }));

        let mut report = None;
        for _ in 0..120 {
            for e in sim.step(DT, &PlayerIntent::default()) {
                if let MatchEvent::MatchEnded(r) = e {
                    report = Some(r);
                }
            }
        }
        let report = report.expect("match ended");
        assert_eq!(report.outcome, MatchOutcome::Won);
        assert!(report.survived);
        assert_eq!(report.total_coins(), 100 + 7 * 25 + 10);

        let mut store = RecordingProgression::default();
        assert!(sim.settle(&mut store));
        assert!(!sim.settle(&mut store));
        assert_eq!(store.wins(), 1);
        assert_eq!(store.coins, 285);
    }

    #[test]
    fn local_elimination_ends_in_loss() {
        let mut sim = sim_with(3, 7);
        assert!(sim.apply_elimination(bot(0)));
        assert!(sim.apply_elimination(1));
        let events = sim.step(DT, &PlayerIntent::default());
        assert!(matches!(
            events.last(),
            Some(MatchEvent::MatchEnding {
                outcome: MatchOutcome::Lost,
                reason: EndReason::LocalEliminated,
                winner_id: None,
            })
        ));
        for _ in 0..120 {
            sim.step(DT, &PlayerIntent::default());
        }
        let report = sim.report().expect("ended");
        assert!(!report.survived);
        assert_eq!(report.total_coins(), 25, "Only the bot seen go out while alive pays");

        let mut store = RecordingProgression::default();
        sim.settle(&mut store);
        assert_eq!(store.losses(), 1);
    }

    #[test]
    fn round_timer_ends_match() {
        let config = MatchConfig {
            round_duration_secs: 0.5,
            ..MatchConfig::default()
        };
        let mut sim = MatchSim::new(config, &MatchSetup::single_player("You", 3, 8)).unwrap();
        sim.start();
        for _ in 0..40 {
            sim.step(DT, &PlayerIntent::default());
        }
        assert!(matches!(
            sim.phase(),
            MatchPhase::Ending {
                reason: EndReason::TimeUp,
                outcome: MatchOutcome::Won,
                ..
            }
        ));
        assert_eq!(sim.state().winner_id, None);
    }

    #[test]
    fn physics_freezes_while_ending() {
        let mut sim = sim_with(1, 9);
        sim.apply_elimination(bot(0));
        sim.step(DT, &PlayerIntent::default());
        assert!(sim.is_over());
        let ball = sim.state().ball.position;
        sim.step(DT, &PlayerIntent::moving(Vec2::X));
        assert_eq!(sim.state().ball.position, ball);
    }

    #[test]
    fn elimination_is_idempotent_and_monotonic() {
        let mut sim = sim_with(2, 10);
        assert!(sim.apply_elimination(bot(0)));
        assert!(!sim.apply_elimination(bot(0)));
        assert!(!sim.apply_elimination(9_999), "Unknown ids are ignored");
        assert_eq!(sim.state().elimination_count, 1);
        for _ in 0..60 {
            sim.step(DT, &PlayerIntent::default());
            assert!(!player(&sim, bot(0)).alive);
        }
    }

    #[test]
    fn departure_is_not_an_elimination() {
        let mut sim = sim_with(1, 11);
        assert!(sim.remove_player(bot(0)));
        assert!(!sim.remove_player(bot(0)));
        assert!(!sim.apply_elimination(bot(0)));
        assert_eq!(sim.state().elimination_count, 0);

        sim.step(DT, &PlayerIntent::default());
        assert!(matches!(
            sim.phase(),
            MatchPhase::Ending {
                reason: EndReason::LastPlayerStanding,
                ..
            }
        ));
    }

    #[test]
    fn host_ball_state_wins() {
        let mut sim = sim_with(2, 12);
        sim.step(DT, &PlayerIntent::default());
        let local = sim.state().ball.position;
        let host = Vec2::new(-40.0, 25.0);
        assert_ne!(local, host);
        assert!(sim.apply_ball_state(host, Vec2::new(100.0, 0.0), 1.3));
        assert_eq!(sim.state().ball.position, host);
        assert_eq!(sim.state().ball.velocity, Vec2::new(100.0, 0.0));
        assert!((sim.state().ball.speed_multiplier - 1.3).abs() < 1e-6);

        assert!(!sim.apply_ball_state(Vec2::new(f32::NAN, 0.0), Vec2::ZERO, 1.0));
        assert_eq!(sim.state().ball.position, host);
    }

    fn two_human_client() -> MatchSim {
        let setup = MatchSetup {
            seed: 13,
            local_player_id: 2,
            humans: vec![(1, "Host".into()), (2, "Me".into())],
            ai_opponents: 1,
            difficulty: ai::DifficultyAssignment::ByIndex,
            simulate_ai: false,
        };
        let mut sim = MatchSim::new(MatchConfig::default(), &setup).unwrap();
        sim.start();
        sim
    }

    #[test]
    fn client_mirrors_host_bots_as_remote() {
        let sim = two_human_client();
        assert!(player(&sim, 1).is_network_driven());
        assert!(player(&sim, bot(0)).is_network_driven());
        assert!(player(&sim, 2).is_local());
    }

    #[test]
    fn remote_positions_interpolate() {
        let mut sim = two_human_client();
        let flags = PositionFlags::default();
        assert!(sim.apply_remote_position(1, Vec2::new(100.0, 0.0), &flags));
        assert!(!sim.apply_remote_position(2, Vec2::ZERO, &flags), "Local player is ours");
        assert!(!sim.apply_remote_position(77, Vec2::ZERO, &flags));

        // Spawned at (210, 0); halfway through the 50ms glide
        sim.step(0.025, &PlayerIntent::default());
        let halfway = player(&sim, 1).position;
        assert!((halfway - Vec2::new(155.0, 0.0)).length() < 1e-3, "halfway {halfway}");
        sim.step(0.05, &PlayerIntent::default());
        assert_eq!(player(&sim, 1).position, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn remote_flags_mirror_powerup() {
        let mut sim = two_human_client();
        let flags = PositionFlags {
            parry_pressed: true,
            active_powerup: Some(PowerupKind::Invincibility),
        };
        sim.apply_remote_position(1, Vec2::ZERO, &flags);
        let host = player(&sim, 1);
        assert!(host.has_powerup(PowerupKind::Invincibility));
        assert!(host.parry.is_armed(sim.state().elapsed_ms));

        sim.apply_remote_position(1, Vec2::ZERO, &PositionFlags::default());
        assert!(player(&sim, 1).active_powerup.is_none());
    }

    #[test]
    fn host_declared_result_for_client() {
        let mut sim = two_human_client();
        let decision = sim.host_decision(Some(1));
        assert_eq!(decision.outcome, MatchOutcome::Lost);
        let decision = sim.host_decision(None);
        assert_eq!(decision.outcome, MatchOutcome::Won);

        let events = sim.declare_result(decision);
        assert_eq!(events.len(), 1);
        assert!(sim.is_over());
        assert!(sim.declare_result(sim.host_decision(Some(2))).len() == 1);
        assert_eq!(sim.state().winner_id, Some(2));
    }

    #[test]
    fn freeze_time_pickup_stops_bots() {
        let mut sim = sim_with(2, 14);
        park(&mut sim, 1, Vec2::new(-100.0, 0.0));
        sim.state.ball.position = Vec2::new(0.0, 150.0);
        sim.state.powerups.push(Powerup {
            id: 99,
            kind: PowerupKind::FreezeTime,
            position: Vec2::new(-100.0, 0.0),
            collected: false,
            spawn_time: 0,
        });
        let events = sim.step(DT, &PlayerIntent::default());
        assert!(events.contains(&MatchEvent::PowerupCollected {
            id: 99,
            kind: PowerupKind::FreezeTime,
            player_id: 1,
        }));
        assert!(sim.state().powerups.is_empty());

        sim.step(DT, &PlayerIntent::default());
        for i in 0..2 {
            assert_eq!(player(&sim, bot(i)).velocity, Vec2::ZERO);
        }
    }

    #[test]
    fn powerups_spawn_on_schedule() {
        let mut sim = sim_with(1, 15);
        park(&mut sim, 1, Vec2::new(-250.0, 0.0));
        sim.state.players[0].invulnerable_until = Some(Millis::MAX);
        sim.state.players[1].invulnerable_until = Some(Millis::MAX);
        let mut spawned = 0;
        for _ in 0..(11 * 60) {
            for e in sim.step(DT, &PlayerIntent::default()) {
                if matches!(e, MatchEvent::PowerupSpawned { .. }) {
                    spawned += 1;
                }
            }
        }
        assert_eq!(spawned, 1);
    }

    #[test]
    fn targeting_picks_nearest_with_insertion_tiebreak() {
        let mut sim = sim_with(2, 16);
        park(&mut sim, 1, Vec2::new(-150.0, 0.0));
        park(&mut sim, bot(0), Vec2::new(100.0, 0.0));
        park(&mut sim, bot(1), Vec2::new(-100.0, 0.0));
        sim.state.ball.position = Vec2::ZERO;
        sim.state.ball.velocity = Vec2::new(0.0, 130.0);
        sim.state.ball.current_target = None;

        sim.step(DT, &PlayerIntent::default());
        assert_eq!(sim.state().ball.current_target, Some(bot(0)));
        assert!(player(&sim, bot(0)).is_targeted);
        assert!(!player(&sim, bot(1)).is_targeted);

        sim.remove_player(bot(0));
        sim.step(DT, &PlayerIntent::default());
        assert_eq!(sim.state().ball.current_target, Some(bot(1)));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut sim = sim_with(3, 17);
        sim.step(DT, &PlayerIntent::default());
        let snap = sim.snapshot();
        assert_eq!(snap.players.len(), 4);
        assert_eq!(snap.alive_count(), 4);
        assert!(snap.player(1).is_some_and(|p| p.is_local));
        assert_eq!(snap.remaining_ms, 45_000 - snap.elapsed_ms);
        assert_eq!(snap.phase, MatchPhase::Running);
    }

    #[test]
    fn same_seed_same_match() {
        let mut a = sim_with(7, 42);
        let mut b = sim_with(7, 42);
        let intent = PlayerIntent::moving(Vec2::new(0.3, -0.7));
        for _ in 0..600 {
            a.step(DT, &intent);
            b.step(DT, &intent);
        }
        assert_eq!(a.state().ball.position, b.state().ball.position);
        assert_eq!(a.state().living_ids(), b.state().living_ids());
        assert_eq!(a.state().elimination_count, b.state().elimination_count);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn invariants_hold_every_tick(
                seed in any::<u64>(),
                ai in 1usize..=7,
                moves in prop::collection::vec((-1.5f32..1.5, -1.5f32..1.5, any::<bool>()), 1..240),
            ) {
                let mut sim = sim_with(ai, seed);
                let cap = sim.config().speed_multiplier_cap;
                let mut dead: Vec<PlayerId> = Vec::new();

                for (x, y, parry) in moves {
                    let intent = PlayerIntent { movement: Vec2::new(x, y), parry_pressed: parry };
                    sim.step(DT, &intent);
                    let state = sim.state();

                    for p in state.players.iter().filter(|p| p.is_active()) {
                        prop_assert!(state.arena.contains(p.position, p.radius), "player {} escaped", p.id);
                    }
                    prop_assert!(state.arena.contains(state.ball.position, state.ball.radius));
                    prop_assert!(state.ball.speed_multiplier >= 1.0 && state.ball.speed_multiplier <= cap);

                    if let Some(target) = state.ball.current_target {
                        prop_assert!(state.player(target).is_some_and(Player::is_active));
                    }
                    for id in &dead {
                        prop_assert!(!state.player(*id).is_some_and(|p| p.alive));
                    }
                    dead = state.players.iter().filter(|p| !p.alive).map(|p| p.id).collect();
                }
            }
        }
    }
}
