//! Lobby membership
//!
//! Tracks connected clients, their lane slots, ready flags and the host.

pub mod roster;

pub use roster::{JoinError, LobbyPlayer, Roster};
