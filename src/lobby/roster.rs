//! Connected clients, lobby slots, ready flags and host tracking

use crate::game::constants::player::MAX_NAME_LEN;
use crate::game::state::PlayerId;

/// A connected client as seen by the lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub name: String,
    pub slot: usize,
    pub ready: bool,
}

impl LobbyPlayer {
    pub fn new(id: PlayerId, slot: usize) -> Self {
        Self {
            id,
            name: default_name(slot),
            slot,
            ready: false,
        }
    }
}

/// Display name used until the client sets one
pub fn default_name(slot: usize) -> String {
    format!("P{}", slot + 1)
}

/// Trim, drop control characters and cap the length. Returns None if nothing is left.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Connection admission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Game already running.")]
    GameInProgress,
    #[error("Lobby is full (max {0}).")]
    LobbyFull(usize),
}

/// Ordered set of connected clients
#[derive(Debug, Clone)]
pub struct Roster {
    /// Sorted by slot
    members: Vec<LobbyPlayer>,
    host_id: Option<PlayerId>,
    max_players: usize,
}

impl Roster {
    pub fn new(max_players: usize) -> Self {
        Self {
            members: Vec::with_capacity(max_players),
            host_id: None,
            max_players,
        }
    }

    /// Admit a client into the lowest free slot
    pub fn join(&mut self, id: PlayerId) -> Result<&LobbyPlayer, JoinError> {
        if self.members.len() >= self.max_players {
            return Err(JoinError::LobbyFull(self.max_players));
        }
        let slot = (0..self.max_players)
            .find(|s| self.members.iter().all(|m| m.slot != *s))
            .ok_or(JoinError::LobbyFull(self.max_players))?;

        let index = self.members.partition_point(|m| m.slot < slot);
        self.members.insert(index, LobbyPlayer::new(id, slot));
        if self.host_id.is_none() {
            self.host_id = Some(id);
        }
        Ok(&self.members[index])
    }

    /// Remove a client, handing host to the lowest slot if needed
    pub fn leave(&mut self, id: PlayerId) -> Option<LobbyPlayer> {
        let index = self.members.iter().position(|m| m.id == id)?;
        let removed = self.members.remove(index);
        if self.host_id == Some(id) {
            self.host_id = self.members.first().map(|m| m.id);
        }
        Some(removed)
    }

    pub fn get(&self, id: PlayerId) -> Option<&LobbyPlayer> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut LobbyPlayer> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    /// Members in slot order
    pub fn iter(&self) -> impl Iterator<Item = &LobbyPlayer> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host_id == Some(id)
    }

    /// Apply a sanitized name. Returns false if the name was rejected.
    pub fn set_name(&mut self, id: PlayerId, raw: &str) -> bool {
        match (sanitize_name(raw), self.get_mut(id)) {
            (Some(name), Some(member)) => {
                member.name = name;
                true
            }
            _ => false,
        }
    }

    /// Flip a member's ready flag, returning the new value
    pub fn toggle_ready(&mut self, id: PlayerId) -> Option<bool> {
        let member = self.get_mut(id)?;
        member.ready = !member.ready;
        Some(member.ready)
    }

    pub fn all_ready(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.ready)
    }

    pub fn reset_ready(&mut self) {
        for member in &mut self.members {
            member.ready = false;
        }
    }

    /// Compact slots to 0..n keeping order, and make sure a host exists
    pub fn renumber(&mut self) {
        for (slot, member) in self.members.iter_mut().enumerate() {
            member.slot = slot;
        }
        if self.host_id.map_or(true, |h| !self.contains(h)) {
            self.host_id = self.members.first().map(|m| m.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_join_assigns_lowest_free_slot() {
        let mut roster = Roster::new(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(roster.join(a).unwrap().slot, 0);
        assert_eq!(roster.join(b).unwrap().slot, 1);
        roster.leave(a);
        let joined = roster.join(c).unwrap();
        assert_eq!(joined.slot, 0);
        assert_eq!(joined.name, "P1");
        let slots: Vec<usize> = roster.iter().map(|m| m.slot).collect();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn test_lobby_full() {
        let mut roster = Roster::new(4);
        for _ in 0..4 {
            roster.join(Uuid::new_v4()).unwrap();
        }
        let err = roster.join(Uuid::new_v4()).unwrap_err();
        assert_eq!(err, JoinError::LobbyFull(4));
        assert_eq!(err.to_string(), "Lobby is full (max 4).");
    }

    #[test]
    fn test_host_handover() {
        let mut roster = Roster::new(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        roster.join(a).unwrap();
        roster.join(b).unwrap();
        assert!(roster.is_host(a));
        roster.leave(a);
        assert!(roster.is_host(b));
        roster.leave(b);
        assert!(roster.host_id().is_none());
    }

    #[test]
    fn test_ready_toggles() {
        let mut roster = Roster::new(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        roster.join(a).unwrap();
        roster.join(b).unwrap();
        assert_eq!(roster.toggle_ready(a), Some(true));
        assert!(!roster.all_ready());
        roster.toggle_ready(b);
        assert!(roster.all_ready());
        assert_eq!(roster.toggle_ready(a), Some(false));
        assert!(!roster.all_ready());
        assert!(!Roster::new(4).all_ready());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Ace  ").as_deref(), Some("Ace"));
        assert_eq!(sanitize_name("a\u{0007}b\nc").as_deref(), Some("abc"));
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz").as_deref(), Some("abcdefghijklmnop"));
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name("\u{0001}"), None);
    }

    #[test]
    fn test_set_name_ignores_empty() {
        let mut roster = Roster::new(4);
        let a = Uuid::new_v4();
        roster.join(a).unwrap();
        assert!(!roster.set_name(a, "  "));
        assert_eq!(roster.get(a).unwrap().name, "P1");
        assert!(roster.set_name(a, "Nova"));
        assert_eq!(roster.get(a).unwrap().name, "Nova");
    }

    #[test]
    fn test_renumber_compacts_slots() {
        let mut roster = Roster::new(4);
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            roster.join(*id).unwrap();
        }
        roster.leave(ids[1]);
        roster.renumber();
        let slots: Vec<(PlayerId, usize)> = roster.iter().map(|m| (m.id, m.slot)).collect();
        assert_eq!(slots, vec![(ids[0], 0), (ids[2], 1)]);
    }
}
