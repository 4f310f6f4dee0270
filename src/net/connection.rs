use std::net::SocketAddr;
use std::time::Instant;

use hashbrown::HashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::game::state::PlayerId;
use crate::net::protocol::ServerMessage;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted into the lobby or match
    Connected,
    /// Writer channel closed; waiting for cleanup
    Closed,
}

/// One WebSocket client
#[derive(Debug)]
pub struct Connection {
    pub player_id: PlayerId,
    pub remote_addr: SocketAddr,
    pub state: ConnectionState,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub messages_sent: u64,
    outbound: UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(player_id: PlayerId, remote_addr: SocketAddr, outbound: UnboundedSender<ServerMessage>) -> Self {
        let now = Instant::now();
        Self {
            player_id,
            remote_addr,
            state: ConnectionState::Connected,
            created_at: now,
            last_activity: now,
            messages_sent: 0,
            outbound,
        }
    }

    /// Hand a message to the writer task. Returns false once the writer is gone.
    pub fn send(&mut self, message: ServerMessage) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        if self.outbound.send(message).is_err() {
            self.state = ConnectionState::Closed;
            return false;
        }
        self.messages_sent += 1;
        true
    }

    /// Update last activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Admitted connections keyed by player id
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<PlayerId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: Connection) {
        self.connections.insert(connection.player_id, connection);
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<Connection> {
        self.connections.remove(&player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Connection> {
        self.connections.get(&player_id)
    }

    pub fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut Connection> {
        self.connections.get_mut(&player_id)
    }

    /// Send to one player. Returns false if unknown or closed.
    pub fn send(&mut self, player_id: PlayerId, message: ServerMessage) -> bool {
        self.connections
            .get_mut(&player_id)
            .is_some_and(|conn| conn.send(message))
    }

    /// Send to every open connection. Returns the number reached.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        self.connections
            .values_mut()
            .filter(|conn| conn.is_open())
            .map(|conn| conn.send(message.clone()))
            .filter(|sent| *sent)
            .count()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.connections.keys().copied().collect()
    }
}
