//! Match phase state machine
//!
//! `Lobby -> Playing -> Upgrades -> Playing | GameOver`, then `GameOver -> Lobby`.
//! Transitions mutate the `MatchState` they are given and queue their
//! messages in its outbox.

use hashbrown::HashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::game::constants::{upgrade, wave};
use crate::game::match_result::{check_match_end, determine_result, MatchResult};
use crate::game::state::{MatchState, Phase, Player, PlayerId};
use crate::game::systems::spawner;
use crate::game::upgrades::{make_upgrade_options, reroll_cost, UpgradeCard};
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::lobby::roster::JoinError;
use crate::net::protocol::{LobbySnapshot, ServerMessage};

/// One player's cards for the current upgrade round
#[derive(Debug, Clone)]
pub struct UpgradeOffer {
    pub options: Vec<UpgradeCard>,
    pub picked: bool,
    pub rerolls: u32,
}

/// Upgrade phase bookkeeping
#[derive(Debug, Clone)]
pub struct UpgradeRound {
    /// Wall-clock ms after which unpicked players get a random card
    pub deadline_ms: u64,
    pub offers: HashMap<PlayerId, UpgradeOffer>,
}

impl UpgradeRound {
    pub fn all_picked(&self) -> bool {
        self.offers.values().all(|o| o.picked)
    }
}

/// Rejected lobby or upgrade command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("Not allowed in the current phase")]
    WrongPhase,
    #[error("Player is not connected")]
    UnknownPlayer,
    #[error("Sender is not ready")]
    NotReady,
    #[error("Not every player is ready")]
    NotAllReady,
    #[error("Player has no upgrade to pick")]
    NoOffer,
    #[error("Upgrade already picked")]
    AlreadyPicked,
    #[error("Unknown upgrade key")]
    UnknownCard,
    #[error("Not enough gold: need {need}, have {have}")]
    InsufficientGold { need: u32, have: u32 },
}

/// Broadcast the lobby roster and leaderboard
pub fn broadcast_lobby(state: &mut MatchState, leaderboard: &Leaderboard) {
    let snapshot = LobbySnapshot::from_state(state, leaderboard.entries());
    state.broadcast(ServerMessage::Lobby(snapshot));
}

/// Admit a new connection into the lobby. Returns the assigned slot.
pub fn connect(state: &mut MatchState, id: PlayerId, leaderboard: &Leaderboard) -> Result<usize, JoinError> {
    if state.phase == Phase::GameOver {
        reset_to_lobby(state, leaderboard);
    }
    if state.phase != Phase::Lobby {
        return Err(JoinError::GameInProgress);
    }

    let slot = state.roster.join(id)?.slot;
    let is_host = state.roster.is_host(id);
    info!("Player {} joined lobby slot {}", id, slot);

    let welcome = ServerMessage::Welcome {
        id,
        slot,
        is_host,
        world: state.world(),
        phase: state.phase,
    };
    state.send(id, welcome);
    broadcast_lobby(state, leaderboard);
    Ok(slot)
}

/// Remove a departed connection from the lobby and the match
pub fn disconnect<R: Rng + ?Sized>(
    state: &mut MatchState,
    id: PlayerId,
    leaderboard: &mut Leaderboard,
    now_ms: u64,
    rng: &mut R,
) {
    let Some(member) = state.roster.leave(id) else {
        return;
    };
    info!("Player {} ({}) left", member.name, id);

    if let Some(player) = state.players.remove(&id) {
        if state.lanes.get(player.slot).copied().flatten() == Some(id) {
            state.lanes[player.slot] = None;
        }
    }
    if let Some(round) = state.upgrade_round.as_mut() {
        round.offers.remove(&id);
    }

    match state.phase {
        Phase::Lobby => broadcast_lobby(state, leaderboard),
        _ if state.players.is_empty() => {
            info!("No participants left, resetting to lobby");
            reset_to_lobby(state, leaderboard);
        }
        Phase::Playing | Phase::Upgrades => {
            if check_game_over(state, leaderboard, now_ms).is_none() && state.phase == Phase::Upgrades {
                maybe_end_upgrade_phase(state, now_ms, rng);
            }
        }
        Phase::GameOver => {}
    }
}

/// Rename a connected player. Allowed in any phase.
pub fn set_name(state: &mut MatchState, id: PlayerId, raw: &str, leaderboard: &Leaderboard) -> bool {
    if !state.roster.set_name(id, raw) {
        return false;
    }
    let name = state.roster.get(id).map(|m| m.name.clone()).unwrap_or_default();
    if let Some(player) = state.get_player_mut(id) {
        player.name = name;
    }
    if state.phase == Phase::Lobby {
        broadcast_lobby(state, leaderboard);
    }
    true
}

/// Flip the sender's ready flag
pub fn toggle_ready(state: &mut MatchState, id: PlayerId, leaderboard: &Leaderboard) -> Result<bool, PhaseError> {
    if state.phase != Phase::Lobby {
        return Err(PhaseError::WrongPhase);
    }
    let ready = state.roster.toggle_ready(id).ok_or(PhaseError::UnknownPlayer)?;
    broadcast_lobby(state, leaderboard);
    Ok(ready)
}

/// Lock the roster into lanes and start wave 1
pub fn start_game<R: Rng + ?Sized>(state: &mut MatchState, id: PlayerId, rng: &mut R) -> Result<(), PhaseError> {
    if state.phase != Phase::Lobby {
        return Err(PhaseError::WrongPhase);
    }
    let sender = state.roster.get(id).ok_or(PhaseError::UnknownPlayer)?;
    if !sender.ready {
        return Err(PhaseError::NotReady);
    }
    if !state.roster.all_ready() {
        return Err(PhaseError::NotAllReady);
    }

    state.roster.renumber();
    state.clear_match();
    let members: Vec<(PlayerId, String, usize)> = state
        .roster
        .iter()
        .map(|m| (m.id, m.name.clone(), m.slot))
        .collect();
    for (pid, name, slot) in members {
        state.players.insert(pid, Player::new(pid, name, slot));
        state.lanes[slot] = Some(pid);
    }
    state.lane_count = state.players.len();
    state.wave = 1;
    state.phase = Phase::Playing;
    spawner::spawn_wave(state, rng);

    info!("Match started with {} lane(s)", state.lane_count);
    let started = ServerMessage::Started {
        world: state.world(),
        wave: state.wave,
    };
    state.broadcast(started);
    Ok(())
}

/// Debounced wave-clear check. Returns true if the upgrade phase began.
pub fn check_wave_clear<R: Rng + ?Sized>(state: &mut MatchState, now_ms: u64, rng: &mut R) -> bool {
    if state.phase != Phase::Playing {
        return false;
    }
    if !state.asteroids.is_empty() || !state.spawn_queue.is_empty() {
        state.wave_cleared_at = None;
        return false;
    }

    match state.wave_cleared_at {
        None => {
            state.wave_cleared_at = Some(now_ms);
            false
        }
        Some(cleared_at) if now_ms.saturating_sub(cleared_at) >= wave::CLEAR_DELAY_MS => {
            begin_upgrade_phase(state, now_ms, rng);
            true
        }
        Some(_) => false,
    }
}

/// Offer every living player three cards
pub fn begin_upgrade_phase<R: Rng + ?Sized>(state: &mut MatchState, now_ms: u64, rng: &mut R) {
    let deadline_ms = now_ms + upgrade::TIMEOUT_MS;
    state.phase = Phase::Upgrades;
    state.wave_cleared_at = None;
    state.bullets.clear();

    let mut offers = HashMap::new();
    for pid in state.lane_ids() {
        let Some(player) = state.get_player(pid).filter(|p| p.is_alive()) else {
            continue;
        };
        let options = make_upgrade_options(&player.upgrades, rng);
        state.send(
            pid,
            ServerMessage::Upgrade {
                options: options.clone(),
                deadline: deadline_ms,
                reroll_cost: reroll_cost(0),
            },
        );
        offers.insert(
            pid,
            UpgradeOffer {
                options,
                picked: false,
                rerolls: 0,
            },
        );
    }

    info!("Wave {} cleared, upgrade phase for {} player(s)", state.wave, offers.len());
    state.upgrade_round = Some(UpgradeRound { deadline_ms, offers });
    state.broadcast(ServerMessage::UpgradePhase { deadline: deadline_ms });
}

/// Apply one of the sender's offered cards
pub fn pick_upgrade(state: &mut MatchState, id: PlayerId, key: &str) -> Result<(), PhaseError> {
    if state.phase != Phase::Upgrades {
        return Err(PhaseError::WrongPhase);
    }
    let round = state.upgrade_round.as_mut().ok_or(PhaseError::WrongPhase)?;
    let player = state.players.get_mut(&id).ok_or(PhaseError::UnknownPlayer)?;
    if !player.is_alive() {
        return Err(PhaseError::NoOffer);
    }
    let offer = round.offers.get_mut(&id).ok_or(PhaseError::NoOffer)?;
    if offer.picked {
        return Err(PhaseError::AlreadyPicked);
    }
    let card = offer
        .options
        .iter()
        .find(|c| c.key == key)
        .ok_or(PhaseError::UnknownCard)?;

    card.effect.apply(&mut player.upgrades);
    offer.picked = true;
    debug!("{} picked {}", player.name, card.title);

    state.send(
        id,
        ServerMessage::Picked {
            key: key.to_string(),
            auto: false,
        },
    );
    let waiting = waiting_names(state);
    state.broadcast(ServerMessage::UpgradeWaiting { waiting });
    Ok(())
}

/// Replace the sender's cards for gold. Returns the price paid.
pub fn reroll_upgrades<R: Rng + ?Sized>(state: &mut MatchState, id: PlayerId, rng: &mut R) -> Result<u32, PhaseError> {
    if state.phase != Phase::Upgrades {
        return Err(PhaseError::WrongPhase);
    }
    let round = state.upgrade_round.as_mut().ok_or(PhaseError::WrongPhase)?;
    let deadline = round.deadline_ms;
    let player = state.players.get_mut(&id).ok_or(PhaseError::UnknownPlayer)?;
    let offer = round.offers.get_mut(&id).ok_or(PhaseError::NoOffer)?;
    if offer.picked {
        return Err(PhaseError::AlreadyPicked);
    }

    let cost = reroll_cost(offer.rerolls);
    if !player.try_spend(cost) {
        return Err(PhaseError::InsufficientGold {
            need: cost,
            have: player.gold,
        });
    }
    offer.options = make_upgrade_options(&player.upgrades, rng);
    offer.rerolls += 1;

    let message = ServerMessage::Upgrade {
        options: offer.options.clone(),
        deadline,
        reroll_cost: reroll_cost(offer.rerolls),
    };
    state.send(id, message);
    Ok(cost)
}

/// Names of living players still choosing, in lane order
fn waiting_names(state: &MatchState) -> Vec<String> {
    let Some(round) = state.upgrade_round.as_ref() else {
        return Vec::new();
    };
    state
        .lane_ids()
        .into_iter()
        .filter(|pid| round.offers.get(pid).is_some_and(|o| !o.picked))
        .filter_map(|pid| state.get_player(pid).map(|p| p.name.clone()))
        .collect()
}

/// Close the upgrade round once everyone picked or the deadline passed.
/// Returns true if the next wave started.
pub fn maybe_end_upgrade_phase<R: Rng + ?Sized>(state: &mut MatchState, now_ms: u64, rng: &mut R) -> bool {
    if state.phase != Phase::Upgrades {
        return false;
    }
    let Some(round) = state.upgrade_round.as_ref() else {
        return false;
    };
    if !round.all_picked() && now_ms < round.deadline_ms {
        return false;
    }

    if let Some(mut round) = state.upgrade_round.take() {
        for pid in state.lane_ids() {
            let Some(offer) = round.offers.get_mut(&pid).filter(|o| !o.picked) else {
                continue;
            };
            let Some(player) = state.players.get_mut(&pid).filter(|p| p.is_alive()) else {
                continue;
            };
            let Some(card) = offer.options.choose(rng) else {
                continue;
            };
            card.effect.apply(&mut player.upgrades);
            offer.picked = true;
            debug!("Auto-picked {} for {}", card.title, player.name);
            let key = card.key.clone();
            state.send(pid, ServerMessage::Picked { key, auto: true });
        }
    }

    state.wave += 1;
    state.phase = Phase::Playing;
    spawner::spawn_wave(state, rng);
    info!("Wave {} begins", state.wave);
    state.broadcast(ServerMessage::Wave { wave: state.wave });
    true
}

/// End the match if its terminal condition holds
pub fn check_game_over(state: &mut MatchState, leaderboard: &mut Leaderboard, now_ms: u64) -> Option<MatchResult> {
    let reason = check_match_end(state)?;
    info!("Match over: {:?}", reason);
    Some(end_game(state, leaderboard, now_ms))
}

/// Enter game over, publish results and persist scores
pub fn end_game(state: &mut MatchState, leaderboard: &mut Leaderboard, now_ms: u64) -> MatchResult {
    state.phase = Phase::GameOver;
    state.gameover_at = Some(now_ms);
    state.upgrade_round = None;

    let result = determine_result(state);
    state.broadcast(ServerMessage::game_over(&result));

    leaderboard.record(
        result
            .rankings
            .iter()
            .filter(|r| r.score > 0)
            .map(|r| LeaderboardEntry {
                name: r.name.clone(),
                score: r.score,
                wave: result.wave,
                kills: r.kills,
            }),
    );
    if let Err(e) = leaderboard.save() {
        warn!("Failed to save leaderboard: {}", e);
    }
    result
}

/// Leave game over early at a client's request
pub fn return_to_lobby(state: &mut MatchState, leaderboard: &Leaderboard) -> Result<(), PhaseError> {
    if state.phase != Phase::GameOver {
        return Err(PhaseError::WrongPhase);
    }
    reset_to_lobby(state, leaderboard);
    Ok(())
}

/// Drop the match and show the lobby again
pub fn reset_to_lobby(state: &mut MatchState, leaderboard: &Leaderboard) {
    state.phase = Phase::Lobby;
    state.clear_match();
    state.roster.renumber();
    state.roster.reset_ready();
    broadcast_lobby(state, leaderboard);
}

/// Wall-clock driven transitions, run once per tick
pub fn run_timers<R: Rng + ?Sized>(
    state: &mut MatchState,
    leaderboard: &Leaderboard,
    now_ms: u64,
    reset_delay_ms: u64,
    rng: &mut R,
) {
    match state.phase {
        Phase::Upgrades => {
            maybe_end_upgrade_phase(state, now_ms, rng);
        }
        Phase::GameOver => {
            let due = state
                .gameover_at
                .map_or(true, |at| now_ms.saturating_sub(at) >= reset_delay_ms);
            if due {
                reset_to_lobby(state, leaderboard);
            }
        }
        Phase::Lobby | Phase::Playing => {}
    }
}
