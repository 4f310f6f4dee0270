//! Authoritative tick driver
//!
//! Owns the match state, the match rng, the command buffer and the
//! leaderboard. Everything that mutates gold, HP or score happens inside
//! `tick` or the command handlers it drains.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::game::constants::{sim, world};
use crate::game::input_buffer::{Command, InputBuffer, InputSender};
use crate::game::match_result::MatchResult;
use crate::game::phase::{self, PhaseError};
use crate::game::state::{MatchState, Outbound, Phase, PlayerId};
use crate::game::systems::spawner::{self, AttackError};
use crate::game::systems::towers::{self, TowerError, TowerKind};
use crate::game::systems::{combat, effects, physics};
use crate::leaderboard::Leaderboard;
use crate::lobby::roster::JoinError;
use crate::net::protocol::{ClientMessage, GameSnapshot, ServerMessage};
use crate::util::vec2::Vec2;

/// Default admin password for clearing the leaderboard
pub const DEFAULT_LEADERBOARD_PASSWORD: &str = "asteroids-admin";

/// Game loop configuration
#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    pub max_players: usize,
    /// Delay before game over returns to the lobby
    pub reset_delay_ms: u64,
    pub leaderboard_password: String,
    pub input_buffer_capacity: usize,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            max_players: world::MAX_PLAYERS,
            reset_delay_ms: 5_000,
            leaderboard_password: DEFAULT_LEADERBOARD_PASSWORD.to_string(),
            input_buffer_capacity: 1024,
        }
    }
}

/// Notable things that happened during a tick
#[derive(Debug, Clone)]
pub enum GameLoopEvent {
    MatchStarted { lanes: usize },
    WaveStarted { wave: u32 },
    UpgradePhaseStarted { wave: u32 },
    AsteroidsDestroyed { count: usize },
    GroundImpacts { count: usize },
    MatchEnded(MatchResult),
}

/// Why a command was not applied
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Tower(#[from] TowerError),
    #[error(transparent)]
    Attack(#[from] AttackError),
    #[error("Player is not in the match")]
    NotParticipant,
    #[error("Wrong leaderboard password")]
    BadPassword,
}

pub struct GameLoop {
    state: MatchState,
    rng: StdRng,
    input: InputBuffer,
    leaderboard: Leaderboard,
    config: GameLoopConfig,
    tick: u64,
}

impl GameLoop {
    pub fn new(config: GameLoopConfig, leaderboard: Leaderboard) -> Self {
        Self::with_rng(config, leaderboard, StdRng::from_entropy())
    }

    /// Deterministic loop for tests and benchmarks
    pub fn with_seed(config: GameLoopConfig, leaderboard: Leaderboard, seed: u64) -> Self {
        Self::with_rng(config, leaderboard, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameLoopConfig, leaderboard: Leaderboard, rng: StdRng) -> Self {
        Self {
            state: MatchState::new(config.max_players),
            rng,
            input: InputBuffer::new(config.input_buffer_capacity),
            leaderboard,
            config,
            tick: 0,
        }
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Sender handle for connection tasks
    pub fn input_sender(&self) -> InputSender {
        self.input.sender()
    }

    /// Queue a command for the next tick. Returns false under backpressure.
    pub fn queue_command(&self, player_id: PlayerId, message: ClientMessage) -> bool {
        self.input.try_submit(player_id, message)
    }

    /// Admit a new connection
    pub fn connect(&mut self, player_id: PlayerId) -> Result<usize, JoinError> {
        phase::connect(&mut self.state, player_id, &self.leaderboard)
    }

    /// Remove a closed connection
    pub fn disconnect(&mut self, player_id: PlayerId, now_ms: u64) {
        phase::disconnect(&mut self.state, player_id, &mut self.leaderboard, now_ms, &mut self.rng);
    }

    /// Messages produced since the last call
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        self.state.take_outbox()
    }

    /// Advance one fixed step at wall-clock time `now_ms`
    pub fn tick(&mut self, now_ms: u64) -> Vec<GameLoopEvent> {
        self.tick += 1;
        let mut events = Vec::new();
        let wave_before = self.state.wave;
        let phase_before = self.state.phase;

        for command in self.input.drain() {
            let Command { player_id, message } = command;
            if let Err(e) = self.apply_command(player_id, message, now_ms) {
                debug!("Ignored command from {}: {}", player_id, e);
            }
        }

        phase::run_timers(
            &mut self.state,
            &self.leaderboard,
            now_ms,
            self.config.reset_delay_ms,
            &mut self.rng,
        );

        if self.state.phase == Phase::Playing {
            self.simulate(now_ms, &mut events);
        }

        if phase_before == Phase::Lobby && self.state.phase == Phase::Playing {
            events.push(GameLoopEvent::MatchStarted {
                lanes: self.state.lane_count,
            });
        } else if self.state.wave > wave_before && self.state.phase == Phase::Playing {
            events.push(GameLoopEvent::WaveStarted { wave: self.state.wave });
        }

        if self.state.phase != Phase::Lobby {
            let snapshot = GameSnapshot::from_state(&self.state);
            self.state.broadcast(ServerMessage::State(snapshot));
        }
        events
    }

    /// One playing step in fixed system order
    fn simulate(&mut self, now_ms: u64, events: &mut Vec<GameLoopEvent>) {
        let dt = sim::DT;
        let state = &mut self.state;
        let rng = &mut self.rng;

        spawner::drain_spawn_queue(state, dt, rng);
        combat::update_turrets(state, dt, rng);
        towers::update_towers(state, dt);
        physics::update_asteroids(state, dt, rng);

        let impacts = combat::resolve_ground_impacts(state, rng);
        if impacts > 0 {
            events.push(GameLoopEvent::GroundImpacts { count: impacts });
            if let Some(result) = phase::check_game_over(state, &mut self.leaderboard, now_ms) {
                events.push(GameLoopEvent::MatchEnded(result));
                return;
            }
        }

        physics::update_bullets(state, dt);
        combat::resolve_collisions(state, rng);
        let kills = combat::reap_kills(state, rng);
        if kills > 0 {
            events.push(GameLoopEvent::AsteroidsDestroyed { count: kills });
        }
        state.sweep_dead();
        effects::update_effects(state, dt);

        if let Some(result) = phase::check_game_over(state, &mut self.leaderboard, now_ms) {
            events.push(GameLoopEvent::MatchEnded(result));
            return;
        }

        if phase::check_wave_clear(state, now_ms, rng) {
            events.push(GameLoopEvent::UpgradePhaseStarted { wave: state.wave });
        }
    }

    /// Dispatch one client command
    pub fn apply_command(&mut self, player_id: PlayerId, message: ClientMessage, now_ms: u64) -> Result<(), CommandError> {
        let state = &mut self.state;
        match message {
            ClientMessage::SetName { name } => {
                phase::set_name(state, player_id, &name, &self.leaderboard);
            }
            ClientMessage::Ready => {
                phase::toggle_ready(state, player_id, &self.leaderboard)?;
            }
            ClientMessage::Start => {
                phase::start_game(state, player_id, &mut self.rng)?;
            }
            ClientMessage::Input { x, y, shooting } => {
                let player = state.get_player_mut(player_id).ok_or(CommandError::NotParticipant)?;
                if x.is_finite() && y.is_finite() {
                    player.target = Vec2::new(x, y);
                }
                player.manual_shooting = shooting;
            }
            ClientMessage::PickUpgrade { key } => {
                phase::pick_upgrade(state, player_id, &key)?;
                phase::maybe_end_upgrade_phase(state, now_ms, &mut self.rng);
            }
            ClientMessage::RerollUpgrades => {
                phase::reroll_upgrades(state, player_id, &mut self.rng)?;
            }
            ClientMessage::BuyTower { slot_index, tower_type } => {
                let kind = TowerKind::from_index(tower_type).ok_or(TowerError::UnknownType(tower_type))?;
                towers::buy_tower(state, player_id, slot_index, kind)?;
            }
            ClientMessage::UpgradeTower { slot_index } => {
                towers::upgrade_tower(state, player_id, slot_index)?;
            }
            ClientMessage::SellTower { slot_index } => {
                towers::sell_tower(state, player_id, slot_index)?;
            }
            ClientMessage::BuyAttack { attack_type } => {
                spawner::buy_attack(state, player_id, attack_type, &mut self.rng)?;
            }
            ClientMessage::ReturnToLobby => {
                phase::return_to_lobby(state, &self.leaderboard)?;
            }
            ClientMessage::ClearLeaderboard { password } => {
                if password != self.config.leaderboard_password {
                    warn!("Rejected leaderboard clear from {}", player_id);
                    return Err(CommandError::BadPassword);
                }
                self.leaderboard.clear();
                if let Err(e) = self.leaderboard.save() {
                    warn!("Failed to save cleared leaderboard: {}", e);
                }
                info!("Leaderboard cleared by {}", player_id);
                phase::broadcast_lobby(state, &self.leaderboard);
            }
        }
        Ok(())
    }
}
