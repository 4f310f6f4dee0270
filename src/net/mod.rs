//! Networking: wire protocol, connections and the WebSocket server

pub mod connection;
pub mod game_session;
pub mod protocol;
pub mod transport;
