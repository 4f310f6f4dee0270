//! Match result and ranking
//!
//! Decides when a match is over and ranks its participants.

use crate::game::state::{MatchState, Phase, PlayerId};

/// Final outcome of a match
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub winner_id: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub rankings: Vec<PlayerRanking>,
    pub wave: u32,
    pub total_kills: u32,
}

/// One participant's line in the results
#[derive(Debug, Clone)]
pub struct PlayerRanking {
    pub player_id: PlayerId,
    pub name: String,
    pub slot: usize,
    pub rank: u32,
    pub score: u32,
    pub kills: u32,
    pub survived: bool,
    pub is_winner: bool,
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEndReason {
    /// One PvP participant left with HP
    LastPlayerStanding,
    /// Every PvP participant was eliminated in the same tick
    AllEliminated,
    /// The only participant lost their base
    BaseDestroyed,
}

/// Rank participants by score, then kills
pub fn determine_result(state: &MatchState) -> MatchResult {
    let winner_id = if state.is_pvp() && state.alive_count() == 1 {
        state.players.values().find(|p| p.is_alive()).map(|p| p.id)
    } else {
        None
    };

    let mut rankings: Vec<PlayerRanking> = state
        .players
        .values()
        .map(|p| PlayerRanking {
            player_id: p.id,
            name: p.name.clone(),
            slot: p.slot,
            rank: 0,
            score: p.score,
            kills: p.kills,
            survived: p.is_alive(),
            is_winner: Some(p.id) == winner_id,
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.kills.cmp(&a.kills))
            .then_with(|| a.slot.cmp(&b.slot))
    });
    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = (i + 1) as u32;
    }

    let winner_name = rankings.iter().find(|r| r.is_winner).map(|r| r.name.clone());
    let total_kills = rankings.iter().map(|r| r.kills).sum();

    MatchResult {
        winner_id,
        winner_name,
        rankings,
        wave: state.wave,
        total_kills,
    }
}

/// Check whether the match in progress is over
pub fn check_match_end(state: &MatchState) -> Option<MatchEndReason> {
    if !matches!(state.phase, Phase::Playing | Phase::Upgrades) || state.players.is_empty() {
        return None;
    }

    let alive = state.alive_count();
    if state.is_pvp() {
        match alive {
            0 => Some(MatchEndReason::AllEliminated),
            1 => Some(MatchEndReason::LastPlayerStanding),
            _ => None,
        }
    } else if alive == 0 {
        Some(MatchEndReason::BaseDestroyed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Player;
    use uuid::Uuid;

    fn add_player(state: &mut MatchState, name: &str, slot: usize, hp: i32, score: u32, kills: u32) -> PlayerId {
        let id = Uuid::new_v4();
        let mut p = Player::new(id, name.to_string(), slot);
        p.hp = hp;
        p.score = score;
        p.kills = kills;
        state.players.insert(id, p);
        state.lanes[slot] = Some(id);
        state.lane_count = state.lane_count.max(slot + 1);
        id
    }

    fn playing() -> MatchState {
        let mut state = MatchState::new(4);
        state.phase = Phase::Playing;
        state.wave = 4;
        state
    }

    #[test]
    fn test_last_player_standing_wins() {
        let mut state = playing();
        let survivor = add_player(&mut state, "Survivor", 0, 3, 100, 2);
        add_player(&mut state, "Fallen", 1, 0, 400, 8);

        assert_eq!(check_match_end(&state), Some(MatchEndReason::LastPlayerStanding));
        let result = determine_result(&state);
        assert_eq!(result.winner_id, Some(survivor));
        assert_eq!(result.winner_name.as_deref(), Some("Survivor"));
        // Ranked by score, not by survival
        assert_eq!(result.rankings[0].name, "Fallen");
        assert_eq!(result.rankings[1].rank, 2);
        assert!(result.rankings[1].is_winner);
        assert_eq!(result.wave, 4);
        assert_eq!(result.total_kills, 10);
    }

    #[test]
    fn test_kills_break_score_ties() {
        let mut state = playing();
        add_player(&mut state, "A", 0, 0, 200, 1);
        add_player(&mut state, "B", 1, 0, 200, 5);
        let result = determine_result(&state);
        assert_eq!(result.rankings[0].name, "B");
        assert!(result.winner_id.is_none());
    }

    #[test]
    fn test_pvp_continues_with_two_alive() {
        let mut state = playing();
        add_player(&mut state, "A", 0, 3, 0, 0);
        add_player(&mut state, "B", 1, 1, 0, 0);
        add_player(&mut state, "C", 2, 0, 0, 0);
        assert!(check_match_end(&state).is_none());
    }

    #[test]
    fn test_simultaneous_elimination() {
        let mut state = playing();
        add_player(&mut state, "A", 0, 0, 0, 0);
        add_player(&mut state, "B", 1, 0, 0, 0);
        assert_eq!(check_match_end(&state), Some(MatchEndReason::AllEliminated));
        assert!(determine_result(&state).winner_id.is_none());
    }

    #[test]
    fn test_solo_ends_at_zero_hp_without_winner() {
        let mut state = playing();
        let id = add_player(&mut state, "Solo", 0, 2, 50, 1);
        assert!(check_match_end(&state).is_none());

        state.get_player_mut(id).unwrap().hp = 0;
        assert_eq!(check_match_end(&state), Some(MatchEndReason::BaseDestroyed));
        assert!(determine_result(&state).winner_id.is_none());
    }

    #[test]
    fn test_no_end_outside_match() {
        let mut state = playing();
        add_player(&mut state, "A", 0, 0, 0, 0);
        state.phase = Phase::Lobby;
        assert!(check_match_end(&state).is_none());
        state.phase = Phase::GameOver;
        assert!(check_match_end(&state).is_none());
    }
}
