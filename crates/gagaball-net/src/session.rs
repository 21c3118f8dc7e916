use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use glam::Vec2;

use gagaball_core::net::messages::{
    BallStateUpdateMsg, JoinMsg, MatchOverMsg, PeerMessage, PlayerEliminatedMsg, PlayerJoinedMsg,
    PlayerLeftMsg, PlayerListSnapshotMsg, PlayerPositionUpdateMsg, PositionFlags, ReadyStateMsg,
    StartMatchMsg,
};
use gagaball_core::net::protocol::{PROTOCOL_VERSION, decode_peer_message, encode_peer_message};
use gagaball_core::player::{PlayerColor, PlayerId, RosterPlayer};
use gagaball_core::room::{MIN_PLAYERS_TO_START, generate_room_code};
use gagaball_core::time::Millis;

use crate::error::SessionError;
use crate::event::{EventBus, SessionEvent};
use crate::roster::Roster;
use crate::transport::{ConnectionId, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Minimum time between two position updates for the same player, and
    /// between two ball updates.
    pub update_interval_ms: Millis,
    /// Events kept for late subscribers.
    pub event_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
            event_history: 64,
        }
    }
}

/// Last state heard for a player driven by another peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteSnapshot {
    pub position: Vec2,
    pub flags: PositionFlags,
}

/// Network truth to merge into the simulation before the next step.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchInput {
    RemotePosition {
        player_id: PlayerId,
        position: Vec2,
        flags: PositionFlags,
    },
    BallState(BallStateUpdateMsg),
    Eliminated(PlayerId),
    PlayerLeft(PlayerId),
    MatchOver(MatchOverMsg),
    HostLost,
}

/// One peer's view of a room: its role, the roster, and the links to the
/// other peers. Owns the transport and is driven from the simulation thread;
/// inbound traffic is only looked at in [`NetworkSession::poll`].
pub struct NetworkSession<T: Transport> {
    transport: T,
    role: Role,
    local_player_id: PlayerId,
    room_code: Option<String>,
    roster: Roster,
    remotes: HashMap<PlayerId, RemoteSnapshot>,
    /// Host: every open link and the player that joined over it.
    peers: HashMap<ConnectionId, Option<PlayerId>>,
    /// Client: the link to the host.
    host_conn: Option<ConnectionId>,
    events: EventBus,
    config: SessionConfig,
    started: Option<StartMatchMsg>,
    match_over: bool,
    host_lost: bool,
    eliminated: HashSet<PlayerId>,
    last_position_sent: HashMap<PlayerId, Millis>,
    last_ball_sent: Option<Millis>,
    inputs: Vec<MatchInput>,
}

impl<T: Transport> NetworkSession<T> {
    /// Open a room as host. The host is the first roster entry.
    pub fn host(
        transport: T,
        local_player_id: PlayerId,
        display_name: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        let mut me = RosterPlayer::new(local_player_id, display_name, PlayerColor::palette(0));
        me.is_host = true;
        let mut roster = Roster::new();
        roster.insert(me);

        let room_code = generate_room_code();
        tracing::info!(room_code = %room_code, player_id = local_player_id, "Room opened");
        let mut session = Self::with_role(transport, Role::Host, local_player_id, config);
        session.room_code = Some(room_code);
        session.roster = roster;
        session
    }

    /// Join a host over an already opened link by sending `Join`.
    pub fn client(
        transport: T,
        host_conn: ConnectionId,
        local_player_id: PlayerId,
        display_name: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut session = Self::with_role(transport, Role::Client, local_player_id, config);
        session.host_conn = Some(host_conn);
        let join = PeerMessage::Join(JoinMsg {
            player_id: local_player_id,
            display_name: display_name.into(),
            protocol_version: PROTOCOL_VERSION,
        });
        let data = Bytes::from(encode_peer_message(&join)?);
        session.transport.send(host_conn, data)?;
        Ok(session)
    }

    fn with_role(transport: T, role: Role, local_player_id: PlayerId, config: SessionConfig) -> Self {
        Self {
            transport,
            role,
            local_player_id,
            room_code: None,
            roster: Roster::new(),
            remotes: HashMap::new(),
            peers: HashMap::new(),
            host_conn: None,
            events: EventBus::with_capacity(config.event_history, config.event_history.max(16)),
            config,
            started: None,
            match_over: false,
            host_lost: false,
            eliminated: HashSet::new(),
            last_position_sent: HashMap::new(),
            last_ball_sent: None,
            inputs: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    pub fn local_player_id(&self) -> PlayerId {
        self.local_player_id
    }

    /// The host's room code. A client learns it from the first roster snapshot.
    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn remote(&self, id: PlayerId) -> Option<&RemoteSnapshot> {
        self.remotes.get(&id)
    }

    pub fn started(&self) -> Option<&StartMatchMsg> {
        self.started.as_ref()
    }

    pub fn is_match_over(&self) -> bool {
        self.match_over
    }

    pub fn is_host_lost(&self) -> bool {
        self.host_lost
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Drain the transport and return the match inputs it produced, in
    /// arrival order.
    pub fn poll(&mut self) -> Vec<MatchInput> {
        while let Some(event) = self.transport.try_next_event() {
            match event {
                TransportEvent::Opened(conn) => self.handle_opened(conn),
                TransportEvent::Message(conn, data) => self.handle_data(conn, data),
                TransportEvent::Closed(conn) => self.handle_closed(conn),
            }
        }
        std::mem::take(&mut self.inputs)
    }

    fn handle_opened(&mut self, conn: ConnectionId) {
        match self.role {
            Role::Host => {
                self.peers.insert(conn, None);
                tracing::debug!(conn, "Peer connected");
            },
            Role::Client if self.host_conn == Some(conn) => {},
            Role::Client => {
                tracing::debug!(conn, "Client refused an inbound link");
                self.transport.close(conn);
            },
        }
    }

    fn handle_closed(&mut self, conn: ConnectionId) {
        match self.role {
            Role::Host => {
                if let Some(Some(player_id)) = self.peers.remove(&conn) {
                    self.handle_departure(player_id);
                }
            },
            Role::Client => {
                if self.host_conn == Some(conn) && !self.host_lost {
                    self.host_lost = true;
                    self.host_conn = None;
                    if self.match_over {
                        // Normal teardown once the host has declared the result.
                        tracing::debug!(player_id = self.local_player_id, "Host closed after match over");
                        return;
                    }
                    tracing::info!(player_id = self.local_player_id, "Lost connection to host");
                    self.inputs.push(MatchInput::HostLost);
                    self.events.publish(SessionEvent::HostLost);
                }
            },
        }
    }

    fn handle_data(&mut self, conn: ConnectionId, data: Bytes) {
        let msg = match decode_peer_message(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(conn, error = %e, "Dropped malformed message");
                return;
            },
        };
        match self.role {
            Role::Host => self.handle_client_message(conn, msg, data),
            Role::Client => {
                if self.host_conn != Some(conn) {
                    tracing::debug!(conn, "Dropped message from a peer that is not the host");
                    return;
                }
                self.handle_host_message(msg);
            },
        }
    }

    fn handle_client_message(&mut self, conn: ConnectionId, msg: PeerMessage, raw: Bytes) {
        if msg.message_type().is_host_only() {
            tracing::debug!(conn, msg_type = ?msg.message_type(), "Dropped host-only message from client");
            return;
        }
        let Some(sender) = self.peers.get(&conn).copied() else {
            return;
        };

        let join = match (msg, sender) {
            (PeerMessage::Join(join), None) => join,
            (PeerMessage::Join(_), Some(_)) => {
                tracing::debug!(conn, "Dropped repeated Join");
                return;
            },
            (msg, Some(player_id)) => {
                self.handle_joined_client_message(conn, player_id, msg, raw);
                return;
            },
            (_, None) => {
                tracing::debug!(conn, "Dropped message sent before Join");
                return;
            },
        };

        if join.protocol_version != PROTOCOL_VERSION {
            tracing::debug!(
                conn,
                version = join.protocol_version,
                expected = PROTOCOL_VERSION,
                "Dropped Join with mismatched protocol version"
            );
            self.transport.close(conn);
            return;
        }
        if self.started.is_some() {
            tracing::debug!(conn, player_id = join.player_id, "Refused Join, match in progress");
            self.transport.close(conn);
            return;
        }
        let player = match self.roster.add(join.player_id, join.display_name, false) {
            Ok(player) => player,
            Err(reason) => {
                tracing::debug!(conn, player_id = join.player_id, reason = ?reason, "Refused Join");
                self.transport.close(conn);
                return;
            },
        };
        self.peers.insert(conn, Some(player.id));
        tracing::info!(player_id = player.id, name = %player.display_name, "Player joined");

        let snapshot = PeerMessage::PlayerListSnapshot(PlayerListSnapshotMsg {
            room_code: self.room_code.clone().unwrap_or_default(),
            players: self.roster.players().to_vec(),
        });
        self.send_to(conn, &snapshot);
        self.broadcast(
            &PeerMessage::PlayerJoined(PlayerJoinedMsg {
                player: player.clone(),
            }),
            Some(conn),
        );
        self.events.publish(SessionEvent::PlayerJoined(player));
    }

    fn handle_joined_client_message(
        &mut self,
        conn: ConnectionId,
        player_id: PlayerId,
        msg: PeerMessage,
        raw: Bytes,
    ) {
        match msg {
            PeerMessage::ReadyState(m) => {
                if m.player_id != player_id {
                    tracing::debug!(conn, player_id, claimed = m.player_id, "Dropped spoofed ReadyState");
                    return;
                }
                if self.roster.set_ready(player_id, m.ready) {
                    self.broadcast_raw(raw, Some(conn));
                    self.events.publish(SessionEvent::ReadyChanged {
                        player_id,
                        ready: m.ready,
                    });
                }
            },
            PeerMessage::PlayerPositionUpdate(m) => {
                if m.player_id != player_id {
                    tracing::debug!(conn, player_id, claimed = m.player_id, "Dropped spoofed position");
                    return;
                }
                if self.started.is_none() {
                    return;
                }
                self.broadcast_raw(raw, Some(conn));
                self.record_position(m);
            },
            PeerMessage::PlayerEliminated(m) => {
                if self.started.is_none() {
                    return;
                }
                if self.eliminated.insert(m.player_id) {
                    self.broadcast_raw(raw, Some(conn));
                    self.inputs.push(MatchInput::Eliminated(m.player_id));
                    self.events.publish(SessionEvent::PlayerEliminated(m.player_id));
                }
            },
            _ => {},
        }
    }

    fn handle_host_message(&mut self, msg: PeerMessage) {
        match msg {
            PeerMessage::PlayerListSnapshot(m) => {
                self.room_code = Some(m.room_code);
                self.roster = Roster::from_players(m.players);
                self.events
                    .publish(SessionEvent::RosterChanged(self.roster.players().to_vec()));
            },
            PeerMessage::PlayerJoined(m) => {
                if self.roster.insert(m.player.clone()) {
                    self.events.publish(SessionEvent::PlayerJoined(m.player));
                }
            },
            PeerMessage::PlayerLeft(m) => self.handle_departure(m.player_id),
            PeerMessage::ReadyState(m) => {
                if self.roster.set_ready(m.player_id, m.ready) {
                    self.events.publish(SessionEvent::ReadyChanged {
                        player_id: m.player_id,
                        ready: m.ready,
                    });
                }
            },
            PeerMessage::StartMatch(m) => {
                if self.started.is_some() {
                    tracing::debug!("Dropped repeated StartMatch");
                    return;
                }
                tracing::info!(seed = m.seed, players = m.players.len(), "Match started by host");
                self.roster = Roster::from_players(m.players.clone());
                self.started = Some(m.clone());
                self.events.publish(SessionEvent::MatchStarted(m));
            },
            PeerMessage::PlayerPositionUpdate(m) => {
                if self.started.is_none() || m.player_id == self.local_player_id {
                    return;
                }
                self.record_position(m);
            },
            PeerMessage::BallStateUpdate(m) => {
                if self.started.is_some() && !self.match_over {
                    self.inputs.push(MatchInput::BallState(m));
                }
            },
            PeerMessage::PlayerEliminated(m) => {
                if self.started.is_some() && self.eliminated.insert(m.player_id) {
                    self.inputs.push(MatchInput::Eliminated(m.player_id));
                    self.events.publish(SessionEvent::PlayerEliminated(m.player_id));
                }
            },
            PeerMessage::MatchOver(m) => {
                if self.started.is_none() || self.match_over {
                    return;
                }
                self.match_over = true;
                tracing::info!(winner_id = ?m.winner_id, "Host declared the match over");
                self.inputs.push(MatchInput::MatchOver(m.clone()));
                self.events.publish(SessionEvent::MatchOver(m));
            },
            PeerMessage::Join(_) => {},
        }
    }

    fn record_position(&mut self, m: PlayerPositionUpdateMsg) {
        let position = Vec2::new(m.x, m.y);
        self.remotes.insert(
            m.player_id,
            RemoteSnapshot {
                position,
                flags: m.flags,
            },
        );
        self.inputs.push(MatchInput::RemotePosition {
            player_id: m.player_id,
            position,
            flags: m.flags,
        });
    }

    fn handle_departure(&mut self, player_id: PlayerId) {
        if self.roster.remove(player_id).is_none() {
            return;
        }
        self.remotes.remove(&player_id);
        self.last_position_sent.remove(&player_id);
        tracing::info!(player_id, "Player left");
        if self.is_host() {
            self.broadcast(&PeerMessage::PlayerLeft(PlayerLeftMsg { player_id }), None);
        }
        if self.started.is_some() {
            self.inputs.push(MatchInput::PlayerLeft(player_id));
        }
        self.events.publish(SessionEvent::PlayerLeft(player_id));
    }

    /// Set the local ready flag and tell the room.
    pub fn set_ready(&mut self, ready: bool) {
        if !self.roster.set_ready(self.local_player_id, ready) {
            return;
        }
        let msg = PeerMessage::ReadyState(ReadyStateMsg {
            player_id: self.local_player_id,
            ready,
        });
        self.send_upstream(&msg);
        self.events.publish(SessionEvent::ReadyChanged {
            player_id: self.local_player_id,
            ready,
        });
    }

    /// Start the match for everyone in the roster plus `ai_opponents` bots.
    pub fn start_match(&mut self, seed: u64, ai_opponents: u8) -> Result<StartMatchMsg, SessionError> {
        if !self.is_host() {
            return Err(SessionError::NotHost);
        }
        if self.started.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        if self.roster.len() < MIN_PLAYERS_TO_START {
            return Err(SessionError::NotEnoughPlayers {
                have: self.roster.len(),
                need: MIN_PLAYERS_TO_START,
            });
        }
        let msg = StartMatchMsg {
            seed,
            players: self.roster.players().to_vec(),
            ai_opponents,
        };
        self.broadcast(&PeerMessage::StartMatch(msg.clone()), None);
        tracing::info!(seed, players = msg.players.len(), ai_opponents, "Match started");
        self.started = Some(msg.clone());
        self.events.publish(SessionEvent::MatchStarted(msg.clone()));
        Ok(msg)
    }

    /// Ship a position for `player_id` unless one went out less than an update
    /// interval ago. Clients may only ship their own player. Returns whether a
    /// message was sent.
    pub fn send_position(
        &mut self,
        now: Millis,
        player_id: PlayerId,
        position: Vec2,
        flags: PositionFlags,
    ) -> bool {
        if self.started.is_none() || self.match_over || !position.is_finite() {
            return false;
        }
        if !self.is_host() && player_id != self.local_player_id {
            return false;
        }
        if let Some(&last) = self.last_position_sent.get(&player_id)
            && now < last.saturating_add(self.config.update_interval_ms)
        {
            return false;
        }
        self.last_position_sent.insert(player_id, now);
        let msg = PeerMessage::PlayerPositionUpdate(PlayerPositionUpdateMsg {
            player_id,
            x: position.x,
            y: position.y,
            flags,
        });
        self.send_upstream(&msg);
        true
    }

    /// Ship the authoritative ball, throttled like positions. Host only.
    pub fn send_ball_state(&mut self, now: Millis, ball: BallStateUpdateMsg) -> bool {
        if !self.is_host() || self.started.is_none() || self.match_over {
            return false;
        }
        if let Some(last) = self.last_ball_sent
            && now < last.saturating_add(self.config.update_interval_ms)
        {
            return false;
        }
        self.last_ball_sent = Some(now);
        self.broadcast(&PeerMessage::BallStateUpdate(ball), None);
        true
    }

    /// Tell the room about an elimination seen locally. Each player is
    /// reported at most once per session.
    pub fn report_elimination(&mut self, player_id: PlayerId) -> bool {
        if self.started.is_none() || !self.eliminated.insert(player_id) {
            return false;
        }
        let msg = PeerMessage::PlayerEliminated(PlayerEliminatedMsg { player_id });
        self.send_upstream(&msg);
        self.events.publish(SessionEvent::PlayerEliminated(player_id));
        true
    }

    /// End the match for every client. Host only; repeated calls are no-ops.
    pub fn declare_match_over(&mut self, result: MatchOverMsg) -> Result<(), SessionError> {
        if !self.is_host() {
            return Err(SessionError::NotHost);
        }
        if self.match_over {
            return Ok(());
        }
        self.match_over = true;
        tracing::info!(
            winner_id = ?result.winner_id,
            eliminations = result.elimination_count,
            "Declaring match over"
        );
        self.broadcast(&PeerMessage::MatchOver(result.clone()), None);
        self.events.publish(SessionEvent::MatchOver(result));
        Ok(())
    }

    /// Close every link. A client's match ends with the host link.
    pub fn disconnect(&mut self) {
        let conns: Vec<ConnectionId> = match self.role {
            Role::Host => self.peers.keys().copied().collect(),
            Role::Client => self.host_conn.into_iter().collect(),
        };
        for conn in conns {
            self.transport.close(conn);
        }
    }

    /// Host: fan out to every joined client. Client: send to the host.
    fn send_upstream(&mut self, msg: &PeerMessage) {
        match self.role {
            Role::Host => self.broadcast(msg, None),
            Role::Client => {
                if let Some(conn) = self.host_conn {
                    self.send_to(conn, msg);
                }
            },
        }
    }

    fn send_to(&self, conn: ConnectionId, msg: &PeerMessage) {
        if let Some(data) = encode(msg)
            && let Err(e) = self.transport.send(conn, data)
        {
            tracing::warn!(conn, error = %e, "Send failed");
        }
    }

    fn broadcast(&self, msg: &PeerMessage, except: Option<ConnectionId>) {
        if let Some(data) = encode(msg) {
            self.broadcast_raw(data, except);
        }
    }

    /// Forward already encoded bytes to every joined client.
    fn broadcast_raw(&self, data: Bytes, except: Option<ConnectionId>) {
        for (&conn, player) in &self.peers {
            if player.is_none() || Some(conn) == except {
                continue;
            }
            if let Err(e) = self.transport.send(conn, data.clone()) {
                tracing::warn!(conn, error = %e, "Broadcast send failed");
            }
        }
    }
}

fn encode(msg: &PeerMessage) -> Option<Bytes> {
    match encode_peer_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(msg_type = ?msg.message_type(), error = %e, "Failed to encode message");
            None
        },
    }
}
