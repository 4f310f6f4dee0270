//! Lane Defense Server Library
//!
//! Authoritative multiplayer server for a cooperative/PvP lane defense
//! game. Up to four players each guard a lane against falling asteroids,
//! buy towers, pick upgrades between waves and send attacks at each other.
//! Clients talk JSON over WebSocket.

pub mod config;
pub mod game;
pub mod leaderboard;
pub mod lobby;
pub mod metrics;
pub mod net;
pub mod util;
