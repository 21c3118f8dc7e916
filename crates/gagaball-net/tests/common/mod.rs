use gagaball_core::player::PlayerId;
use gagaball_net::{MemoryNetwork, MemoryTransport, NetworkSession, PeerMatch, SessionConfig};
use gagaball_sim::PlayerIntent;
use gagaball_sim::config::MatchConfig;

pub const DT: f32 = 1.0 / 60.0;

pub type Session = NetworkSession<MemoryTransport>;
pub type Peer = PeerMatch<MemoryTransport>;

/// A host plus `n` joined clients on one in-memory network. Client ids start
/// at 2.
pub struct TestRoom {
    pub net: MemoryNetwork,
    pub host: Session,
    pub clients: Vec<Session>,
}

impl TestRoom {
    pub fn new() -> Self {
        let net = MemoryNetwork::new();
        let transport = net.listen("host").unwrap();
        let host = NetworkSession::host(transport, 1, "Host", SessionConfig::default());
        Self {
            net,
            host,
            clients: Vec::new(),
        }
    }

    pub fn with_clients(n: usize) -> Self {
        let mut room = Self::new();
        for _ in 0..n {
            room.join();
        }
        room
    }

    /// Connect and join one more client, then let everyone catch up.
    pub fn join(&mut self) -> PlayerId {
        let id = self.clients.len() as PlayerId + 2;
        let mut transport = self.net.listen(format!("client-{id}")).unwrap();
        let conn = self.net.connect(&mut transport, "host").unwrap();
        let client =
            NetworkSession::client(transport, conn, id, format!("Player{id}"), SessionConfig::default())
                .unwrap();
        self.clients.push(client);
        self.pump();
        id
    }

    /// Drain every peer, lobby style: match inputs are discarded.
    pub fn pump(&mut self) {
        self.host.poll();
        for client in &mut self.clients {
            client.poll();
        }
        self.host.poll();
    }

    /// Start on the host and build every peer's match from what it received.
    pub fn start(mut self, seed: u64, ai_opponents: u8) -> (Peer, Vec<Peer>) {
        let start = self.host.start_match(seed, ai_opponents).unwrap();
        let host = PeerMatch::from_start(self.host, MatchConfig::default(), &start).unwrap();
        let clients = self
            .clients
            .into_iter()
            .map(|mut session| {
                session.poll();
                let start = session.started().cloned().expect("StartMatch delivered");
                PeerMatch::from_start(session, MatchConfig::default(), &start).unwrap()
            })
            .collect();
        (host, clients)
    }
}

/// Tick every peer with idle input until all are ENDED or `max_ticks` pass.
/// Returns the number of ticks run.
pub fn run_until_ended(host: &mut Peer, clients: &mut [Peer], max_ticks: usize) -> usize {
    let idle = PlayerIntent::default();
    for tick in 0..max_ticks {
        if host.is_ended() && clients.iter().all(|c| c.is_ended()) {
            return tick;
        }
        host.tick(DT, &idle);
        for client in clients.iter_mut() {
            client.tick(DT, &idle);
        }
    }
    max_ticks
}
