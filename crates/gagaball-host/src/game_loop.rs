use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gagaball_core::player::PlayerId;
use gagaball_net::{MemoryNetwork, MemoryTransport, NetworkSession, PeerMatch, SessionConfig};
use gagaball_sim::ai::Difficulty;
use gagaball_sim::config::MatchConfig;
use gagaball_sim::lifecycle::MatchReport;
use gagaball_sim::setup::MatchSetup;
use gagaball_sim::snapshot::MatchSnapshot;
use gagaball_sim::{MatchEvent, MatchSim, PlayerIntent};

use crate::autopilot::Autopilot;
use crate::config::{HostConfig, TickConfig};
use crate::error::HostError;
use crate::progression::MemoryProgression;

/// Commands sent to a running headless match.
#[derive(Debug)]
pub enum LoopCommand {
    Stop,
}

/// Updates sent from the tick loop.
#[derive(Debug, Clone)]
pub enum LoopUpdate {
    Snapshot { tick: u64, snapshot: MatchSnapshot },
    Finished(MatchSummary),
}

/// How one participant's match went.
#[derive(Debug, Clone, Serialize)]
pub struct PeerResult {
    pub player_id: PlayerId,
    pub report: Option<MatchReport>,
    pub progression: MemoryProgression,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub seed: u64,
    pub ticks: u64,
    /// Stopped by command or tick limit before every peer reached ENDED.
    pub stopped_early: bool,
    pub host: PeerResult,
    pub clients: Vec<PeerResult>,
}

/// One simulated participant and whoever is at its controls.
struct Seat<S> {
    sim: S,
    pilot: Option<Autopilot>,
    progression: MemoryProgression,
}

type PeerSeat = Seat<PeerMatch<MemoryTransport>>;

impl<S> Seat<S> {
    fn new(sim: S, pilot: Option<Autopilot>) -> Self {
        Self {
            sim,
            pilot,
            progression: MemoryProgression::default(),
        }
    }
}

/// Everything the loop ticks.
enum Lineup {
    /// Host against bots, no network.
    Solo(Seat<MatchSim>),
    /// Host plus loopback clients over the memory transport.
    Room {
        host: PeerSeat,
        clients: Vec<PeerSeat>,
        /// Keeps the signaling registry alive for the whole match.
        _net: MemoryNetwork,
    },
}

fn pilot(config: &HostConfig, seed: u64, player_id: PlayerId) -> Option<Autopilot> {
    config
        .game
        .autopilot
        .then(|| Autopilot::new(Difficulty::Hard, seed ^ player_id))
}

impl Lineup {
    fn build(config: &HostConfig, match_config: MatchConfig, seed: u64) -> Result<Self, HostError> {
        if config.lobby.loopback_clients == 0 {
            let mut setup = MatchSetup::single_player(
                config.lobby.host_name.clone(),
                usize::from(config.game.ai_opponents),
                seed,
            );
            setup.difficulty = config.game.difficulty;
            let mut sim = MatchSim::new(match_config, &setup)?;
            sim.start();
            tracing::info!(seed, ai_opponents = setup.ai_opponents, "Single-player match running");
            return Ok(Self::Solo(Seat::new(sim, pilot(config, seed, setup.local_player_id))));
        }

        let session_config = SessionConfig {
            update_interval_ms: config.lobby.update_interval_ms,
            ..SessionConfig::default()
        };
        let net = MemoryNetwork::new();
        let mut host = NetworkSession::host(
            net.listen("host")?,
            1,
            config.lobby.host_name.clone(),
            session_config.clone(),
        );

        let mut clients = Vec::with_capacity(config.lobby.loopback_clients);
        for i in 0..config.lobby.loopback_clients {
            let id = i as PlayerId + 2;
            let mut transport = net.listen(format!("loopback-{id}"))?;
            let conn = net.connect(&mut transport, "host")?;
            let client = NetworkSession::client(
                transport,
                conn,
                id,
                format!("Loopback {id}"),
                session_config.clone(),
            )?;
            clients.push(client);
            host.poll();
        }
        for client in &mut clients {
            client.poll();
            client.set_ready(true);
        }
        host.poll();

        let start = host.start_match(seed, config.game.ai_opponents)?;
        let host =
            PeerMatch::from_start_with(host, match_config.clone(), &start, config.game.difficulty)?;
        let mut seats = Vec::with_capacity(clients.len());
        for mut session in clients {
            session.poll();
            let id = session.local_player_id();
            let client_start = session
                .started()
                .cloned()
                .ok_or(HostError::StartNotDelivered(id))?;
            let peer = PeerMatch::from_start(session, match_config.clone(), &client_start)?;
            seats.push(Seat::new(peer, pilot(config, seed, id)));
        }

        Ok(Self::Room {
            host: Seat::new(host, pilot(config, seed, 1)),
            clients: seats,
            _net: net,
        })
    }

    fn tick(&mut self, dt: f32) {
        match self {
            Self::Solo(seat) => {
                let intent = seat
                    .pilot
                    .as_mut()
                    .map_or_else(PlayerIntent::default, |p| p.intent(&seat.sim));
                let events = seat.sim.step(dt, &intent);
                log_events(&events);
            },
            Self::Room { host, clients, .. } => {
                let events = tick_peer(host, dt);
                log_events(&events);
                for client in clients.iter_mut() {
                    tick_peer(client, dt);
                }
            },
        }
    }

    fn is_ended(&self) -> bool {
        match self {
            Self::Solo(seat) => seat.sim.is_ended(),
            Self::Room { host, clients, .. } => {
                host.sim.is_ended() && clients.iter().all(|c| c.sim.is_ended())
            },
        }
    }

    fn snapshot(&self) -> MatchSnapshot {
        match self {
            Self::Solo(seat) => seat.sim.snapshot(),
            Self::Room { host, .. } => host.sim.snapshot(),
        }
    }

    /// Settle every participant that reached ENDED and collect the results.
    fn finish(self, seed: u64, ticks: u64, stopped_early: bool) -> MatchSummary {
        match self {
            Self::Solo(mut seat) => {
                seat.sim.settle(&mut seat.progression);
                MatchSummary {
                    seed,
                    ticks,
                    stopped_early,
                    host: PeerResult {
                        player_id: seat.sim.local_player_id(),
                        report: seat.sim.report().cloned(),
                        progression: seat.progression,
                    },
                    clients: Vec::new(),
                }
            },
            Self::Room { host, clients, .. } => MatchSummary {
                seed,
                ticks,
                stopped_early,
                host: settle_peer(host),
                clients: clients.into_iter().map(settle_peer).collect(),
            },
        }
    }
}

fn tick_peer(seat: &mut PeerSeat, dt: f32) -> Vec<MatchEvent> {
    let intent = seat
        .pilot
        .as_mut()
        .map_or_else(PlayerIntent::default, |p| p.intent(seat.sim.sim()));
    seat.sim.tick(dt, &intent)
}

fn settle_peer(mut seat: PeerSeat) -> PeerResult {
    seat.sim.settle(&mut seat.progression);
    PeerResult {
        player_id: seat.sim.session().local_player_id(),
        report: seat.sim.report().cloned(),
        progression: seat.progression,
    }
}

fn log_events(events: &[MatchEvent]) {
    for event in events {
        match event {
            MatchEvent::PlayerEliminated { player_id } => {
                tracing::info!(player_id, "Eliminated");
            },
            MatchEvent::MatchEnding {
                outcome,
                reason,
                winner_id,
            } => {
                tracing::info!(outcome = ?outcome, reason = ?reason, winner_id = ?winner_id, "Match ending");
            },
            MatchEvent::PowerupCollected { kind, player_id, .. } => {
                tracing::debug!(player_id, kind = kind.label(), "Power-up collected");
            },
            _ => {},
        }
    }
}

/// Build the room and spawn its tick loop as a tokio task.
/// Returns the command sender, the update receiver and the task handle.
pub fn spawn_headless_match(
    config: HostConfig,
) -> Result<
    (
        mpsc::UnboundedSender<LoopCommand>,
        mpsc::UnboundedReceiver<LoopUpdate>,
        JoinHandle<MatchSummary>,
    ),
    HostError,
> {
    config.validate().map_err(HostError::Config)?;
    let match_config = config.game.match_config();
    let seed = config.game.seed.unwrap_or_else(rand::random);
    let lineup = Lineup::build(&config, match_config, seed)?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let tick = config.tick.clone();
    let handle = tokio::spawn(async move {
        run_tick_loop(lineup, tick, seed, cmd_rx, update_tx).await
    });

    Ok((cmd_tx, update_rx, handle))
}

/// Fixed-interval tick loop. Runs until every peer reaches ENDED, a stop
/// command arrives, or the tick limit is hit.
async fn run_tick_loop(
    mut lineup: Lineup,
    tick: TickConfig,
    seed: u64,
    mut cmd_rx: mpsc::UnboundedReceiver<LoopCommand>,
    update_tx: mpsc::UnboundedSender<LoopUpdate>,
) -> MatchSummary {
    let dt = tick.dt();
    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / tick.tick_rate_hz));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut ticks: u64 = 0;
    let mut stopped_early = false;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                lineup.tick(dt);
                ticks += 1;

                if tick.snapshot_every > 0 && ticks % u64::from(tick.snapshot_every) == 0 {
                    let _ = update_tx.send(LoopUpdate::Snapshot {
                        tick: ticks,
                        snapshot: lineup.snapshot(),
                    });
                }
                if lineup.is_ended() {
                    break;
                }
                if tick.max_ticks > 0 && ticks >= tick.max_ticks {
                    tracing::warn!(ticks, "Tick limit reached before the match ended");
                    stopped_early = true;
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(LoopCommand::Stop) | None => {
                        tracing::info!(ticks, "Match loop stopped");
                        stopped_early = true;
                        break;
                    },
                }
            }
        }
    }

    let summary = lineup.finish(seed, ticks, stopped_early);
    let _ = update_tx.send(LoopUpdate::Finished(summary.clone()));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(loopback_clients: usize) -> HostConfig {
        let mut config = HostConfig::default();
        config.tick.tick_rate_hz = 1000.0;
        config.tick.time_scale = 20.0;
        config.tick.snapshot_every = 0;
        config.tick.max_ticks = 10_000;
        config.game.seed = Some(99);
        config.lobby.loopback_clients = loopback_clients;
        config
    }

    #[test]
    fn solo_lineup_has_no_network() {
        let config = fast_config(0);
        let lineup = Lineup::build(&config, MatchConfig::default(), 1).unwrap();
        assert!(matches!(lineup, Lineup::Solo(_)));
        assert_eq!(lineup.snapshot().players.len(), 4);
    }

    #[test]
    fn room_lineup_joins_every_client() {
        let config = fast_config(2);
        let lineup = Lineup::build(&config, MatchConfig::default(), 1).unwrap();
        let Lineup::Room { host, clients, .. } = &lineup else {
            panic!("expected a room");
        };
        assert_eq!(clients.len(), 2);
        assert_eq!(host.sim.session().roster().ids(), vec![1, 2, 3]);
        assert!(host.sim.session().roster().all_ready());
        // Host, two clients, three bots.
        assert_eq!(lineup.snapshot().players.len(), 6);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = fast_config(1);
        config.tick.tick_rate_hz = 0.0;
        assert!(matches!(
            spawn_headless_match(config),
            Err(HostError::Config(_))
        ));
    }

    #[tokio::test]
    async fn stop_command_ends_loop_early() {
        let mut config = fast_config(1);
        config.tick.time_scale = 1.0;
        let (cmd_tx, _updates, handle) = spawn_headless_match(config).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cmd_tx.send(LoopCommand::Stop).unwrap();

        let summary = handle.await.unwrap();
        assert!(summary.stopped_early);
        assert!(summary.host.report.is_none());
        assert_eq!(summary.host.progression.wins + summary.host.progression.losses, 0);
    }

    #[tokio::test]
    async fn snapshots_are_streamed() {
        let mut config = fast_config(0);
        config.tick.snapshot_every = 5;
        let (_cmd_tx, mut updates, _handle) = spawn_headless_match(config).unwrap();

        match updates.recv().await.unwrap() {
            LoopUpdate::Snapshot { tick, snapshot } => {
                assert_eq!(tick, 5);
                assert!(snapshot.elapsed_ms >= 90 && snapshot.elapsed_ms <= 110);
            },
            other => panic!("Expected Snapshot, got: {other:?}"),
        }
    }
}
