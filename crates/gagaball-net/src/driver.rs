use glam::Vec2;

use gagaball_core::net::messages::{
    BallStateUpdateMsg, MatchOverMsg, PositionFlags, StartMatchMsg,
};
use gagaball_core::progression::ProgressionStore;
use gagaball_sim::ai::DifficultyAssignment;
use gagaball_sim::config::MatchConfig;
use gagaball_sim::lifecycle::{EndDecision, EndReason, MatchOutcome, MatchReport};
use gagaball_sim::setup::MatchSetup;
use gagaball_sim::snapshot::MatchSnapshot;
use gagaball_sim::{MatchEvent, MatchSim, PlayerIntent};

use crate::error::SessionError;
use crate::session::{MatchInput, NetworkSession};
use crate::transport::Transport;

/// A networked match on one peer: the local simulation plus the session that
/// keeps it in step with the room.
///
/// Every [`PeerMatch::tick`] drains inbound truth into the simulation, steps
/// it once, then ships whatever this peer is authoritative for.
pub struct PeerMatch<T: Transport> {
    session: NetworkSession<T>,
    sim: MatchSim,
    /// A parry press waiting for the next position update to carry it.
    pending_parry: bool,
}

impl<T: Transport> PeerMatch<T> {
    /// Build the match every peer agrees on from the host's `StartMatch`.
    /// Only the host runs the bots; everyone else mirrors them.
    pub fn from_start(
        session: NetworkSession<T>,
        config: MatchConfig,
        start: &StartMatchMsg,
    ) -> Result<Self, SessionError> {
        Self::from_start_with(session, config, start, DifficultyAssignment::default())
    }

    /// Like [`PeerMatch::from_start`], with the host's choice of bot tiers.
    /// Ignored on clients, which never run the bots.
    pub fn from_start_with(
        session: NetworkSession<T>,
        config: MatchConfig,
        start: &StartMatchMsg,
        difficulty: DifficultyAssignment,
    ) -> Result<Self, SessionError> {
        let setup = MatchSetup {
            seed: start.seed,
            local_player_id: session.local_player_id(),
            humans: start
                .players
                .iter()
                .map(|p| (p.id, p.display_name.clone()))
                .collect(),
            ai_opponents: usize::from(start.ai_opponents),
            difficulty,
            simulate_ai: session.is_host(),
        };
        let mut sim = MatchSim::new(config, &setup)?;
        sim.start();
        tracing::info!(
            player_id = session.local_player_id(),
            host = session.is_host(),
            players = setup.total_players(),
            "Peer match running"
        );
        Ok(Self {
            session,
            sim,
            pending_parry: false,
        })
    }

    pub fn sim(&self) -> &MatchSim {
        &self.sim
    }

    pub fn session(&self) -> &NetworkSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut NetworkSession<T> {
        &mut self.session
    }

    pub fn is_ended(&self) -> bool {
        self.sim.is_ended()
    }

    pub fn report(&self) -> Option<&MatchReport> {
        self.sim.report()
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.sim.snapshot()
    }

    pub fn settle(&mut self, store: &mut impl ProgressionStore) -> bool {
        self.sim.settle(store)
    }

    /// One frame: merge network truth, step the simulation, publish.
    pub fn tick(&mut self, dt: f32, intent: &PlayerIntent) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        for input in self.session.poll() {
            self.apply_input(input, &mut events);
        }

        self.pending_parry |= intent.parry_pressed;
        let stepped = self.sim.step(dt, intent);
        self.publish(&stepped);
        events.extend(stepped);
        events
    }

    fn apply_input(&mut self, input: MatchInput, events: &mut Vec<MatchEvent>) {
        let is_host = self.session.is_host();
        match input {
            MatchInput::RemotePosition {
                player_id,
                position,
                flags,
            } => {
                if !self.sim.apply_remote_position(player_id, position, &flags) {
                    tracing::debug!(player_id, "Ignored position for a player not in play");
                }
            },
            MatchInput::BallState(m) if !is_host => {
                self.sim.apply_ball_state(
                    Vec2::new(m.x, m.y),
                    Vec2::new(m.vx, m.vy),
                    m.speed_multiplier,
                );
            },
            MatchInput::BallState(_) => {},
            MatchInput::Eliminated(player_id) => {
                self.sim.apply_elimination(player_id);
            },
            MatchInput::PlayerLeft(player_id) => {
                self.sim.remove_player(player_id);
            },
            MatchInput::MatchOver(m) if !is_host => {
                let decision = self.sim.host_decision(m.winner_id);
                events.extend(self.sim.declare_result(decision));
            },
            MatchInput::MatchOver(_) => {},
            MatchInput::HostLost if self.sim.is_over() => {
                tracing::debug!("Host lost after the result was settled; keeping it");
            },
            MatchInput::HostLost => {
                events.extend(self.sim.declare_result(EndDecision {
                    outcome: MatchOutcome::Lost,
                    reason: EndReason::HostLost,
                    winner_id: None,
                }));
            },
        }
    }

    fn publish(&mut self, events: &[MatchEvent]) {
        for event in events {
            match event {
                MatchEvent::PlayerEliminated { player_id } => {
                    self.session.report_elimination(*player_id);
                },
                MatchEvent::MatchEnding { winner_id, .. } if self.session.is_host() => {
                    let state = self.sim.state();
                    let result = MatchOverMsg {
                        winner_id: *winner_id,
                        elimination_count: state.elimination_count,
                        duration_secs: state.elapsed_ms as f32 / 1000.0,
                    };
                    if let Err(e) = self.session.declare_match_over(result) {
                        tracing::warn!(error = %e, "Could not declare match over");
                    }
                },
                _ => {},
            }
        }

        if self.sim.is_over() {
            return;
        }
        let now = self.sim.state().elapsed_ms;

        if let Some(me) = self.sim.local_player()
            && me.is_active()
        {
            let flags = PositionFlags {
                parry_pressed: self.pending_parry,
                active_powerup: me.active_powerup.map(|p| p.kind),
            };
            if self.session.send_position(now, me.id, me.position, flags) {
                self.pending_parry = false;
            }
        }

        if !self.session.is_host() {
            return;
        }
        for bot in self.sim.state().players.iter().filter(|p| p.is_ai() && p.is_active()) {
            let flags = PositionFlags {
                parry_pressed: false,
                active_powerup: bot.active_powerup.map(|p| p.kind),
            };
            self.session.send_position(now, bot.id, bot.position, flags);
        }
        let ball = &self.sim.state().ball;
        self.session.send_ball_state(
            now,
            BallStateUpdateMsg {
                x: ball.position.x,
                y: ball.position.y,
                vx: ball.velocity.x,
                vy: ball.velocity.y,
                speed_multiplier: ball.speed_multiplier,
            },
        );
    }
}
