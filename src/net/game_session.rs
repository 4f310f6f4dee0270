//! Game session manager - runs the game loop and delivers its messages to connections

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::game::constants::sim;
use crate::game::game_loop::{GameLoop, GameLoopEvent};
use crate::game::input_buffer::InputSender;
use crate::game::state::{MatchState, PlayerId, Recipient};
use crate::leaderboard::Leaderboard;
use crate::lobby::roster::JoinError;
use crate::metrics::Metrics;
use crate::net::connection::{Connection, ConnectionManager};
use crate::net::protocol::ServerMessage;
use crate::util::vec2::Vec2;

fn wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Match clock in UNIX milliseconds
///
/// The wall clock is read once at start; after that time only advances by a
/// monotonic instant, so a system clock step never moves match timers.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    epoch_ms: u64,
    started: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            epoch_ms: wall_ms(),
            started: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.epoch_ms + self.started.elapsed().as_millis() as u64
    }
}

/// Shared game session: the single match plus its open connections
pub struct GameSession {
    pub game_loop: GameLoop,
    pub connections: ConnectionManager,
    clock: SessionClock,
    metrics: Arc<Metrics>,
}

impl GameSession {
    pub fn new(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        let leaderboard = Leaderboard::load(&config.leaderboard_path);
        info!(
            "Loaded {} leaderboard entries from {}",
            leaderboard.entries().len(),
            config.leaderboard_path.display()
        );
        Self::with_game_loop(GameLoop::new(config.game_loop_config(), leaderboard), metrics)
    }

    pub fn with_game_loop(game_loop: GameLoop, metrics: Arc<Metrics>) -> Self {
        Self {
            game_loop,
            connections: ConnectionManager::new(),
            clock: SessionClock::start(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Sender for connection read loops
    pub fn input_sender(&self) -> InputSender {
        self.game_loop.input_sender()
    }

    /// Admit a connection into the lobby. On refusal the client gets a
    /// `reject` frame on `outbound` and is never registered.
    pub fn add_connection(
        &mut self,
        player_id: PlayerId,
        remote_addr: SocketAddr,
        outbound: UnboundedSender<ServerMessage>,
    ) -> Result<usize, JoinError> {
        match self.game_loop.connect(player_id) {
            Ok(slot) => {
                self.connections
                    .register(Connection::new(player_id, remote_addr, outbound));
                self.metrics
                    .connections_active
                    .store(self.connections.count() as u64, Ordering::Relaxed);
                info!("Player {} joined from {} in slot {}", player_id, remote_addr, slot);
                self.flush_outbox();
                Ok(slot)
            }
            Err(e) => {
                self.metrics.connections_rejected.fetch_add(1, Ordering::Relaxed);
                info!("Rejected {}: {}", remote_addr, e);
                let _ = outbound.send(ServerMessage::Reject { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Forget a closed connection and let the match react
    pub fn remove_connection(&mut self, player_id: PlayerId) {
        if self.connections.remove(player_id).is_none() {
            return;
        }
        info!("Player {} disconnected", player_id);
        let now_ms = self.now_ms();
        self.game_loop.disconnect(player_id, now_ms);
        self.metrics
            .connections_active
            .store(self.connections.count() as u64, Ordering::Relaxed);
        self.flush_outbox();
    }

    /// Run one tick and deliver everything it produced
    pub fn tick(&mut self, now_ms: u64) -> Vec<GameLoopEvent> {
        let events = self.game_loop.tick(now_ms);

        for event in &events {
            match event {
                GameLoopEvent::MatchStarted { lanes } => {
                    info!("Match started with {} lanes", lanes);
                }
                GameLoopEvent::WaveStarted { wave } => {
                    debug!("Wave {} started", wave);
                }
                GameLoopEvent::UpgradePhaseStarted { wave } => {
                    debug!("Upgrade phase after wave {}", wave);
                }
                GameLoopEvent::AsteroidsDestroyed { count } => {
                    self.metrics
                        .asteroids_destroyed
                        .fetch_add(*count as u64, Ordering::Relaxed);
                }
                GameLoopEvent::GroundImpacts { count } => {
                    self.metrics.ground_impacts.fetch_add(*count as u64, Ordering::Relaxed);
                }
                GameLoopEvent::MatchEnded(result) => {
                    self.metrics.matches_played.fetch_add(1, Ordering::Relaxed);
                    info!(
                        "Match ended at wave {} (winner: {})",
                        result.wave,
                        result.winner_name.as_deref().unwrap_or("none")
                    );
                }
            }
        }

        self.metrics.observe_state(self.game_loop.state());
        self.flush_outbox();
        events
    }

    /// Route pending match messages to their recipients
    pub fn flush_outbox(&mut self) -> usize {
        let mut delivered = 0;
        for outbound in self.game_loop.take_outbox() {
            match outbound.recipient {
                Recipient::All => {
                    delivered += self.connections.broadcast(&outbound.message);
                }
                Recipient::Player(id) => {
                    if self.connections.send(id, outbound.message) {
                        delivered += 1;
                    }
                }
            }
        }
        self.metrics
            .messages_sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }
}

fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Drop entities whose kinematics went non-finite. Returns how many were fixed.
pub fn sanitize_match_state(state: &mut MatchState) -> usize {
    let mut fixed = 0;
    for asteroid in &mut state.asteroids {
        if !is_finite(asteroid.position) || !asteroid.hp.is_finite() {
            warn!("Removed asteroid {} with invalid state", asteroid.id);
            asteroid.dead = true;
            fixed += 1;
        } else if !is_finite(asteroid.velocity) {
            warn!("Fixed NaN velocity for asteroid {}", asteroid.id);
            asteroid.velocity = Vec2::ZERO;
            fixed += 1;
        }
    }
    for bullet in &mut state.bullets {
        if !is_finite(bullet.position) || !is_finite(bullet.velocity) {
            bullet.dead = true;
            fixed += 1;
        }
    }
    let particles_before = state.particles.len();
    state
        .particles
        .retain(|p| is_finite(p.position) && is_finite(p.velocity));
    fixed += particles_before - state.particles.len();

    if fixed > 0 {
        state.sweep_dead();
    }
    fixed
}

/// Start the game loop background task
pub fn start_game_loop(session: Arc<RwLock<GameSession>>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(sim::TICK_DURATION_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Game loop started at {} Hz", sim::TICK_RATE);
        let start = Instant::now();
        let mut tick_count: u64 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            {
                let mut guard = session.write().await;
                let metrics = guard.metrics.clone();
                let tick_start = Instant::now();
                let now_ms = guard.now_ms();

                // A panicking tick is skipped; the loop keeps serving
                let result = catch_unwind(AssertUnwindSafe(|| {
                    sanitize_match_state(guard.game_loop.state_mut());
                    let events = guard.tick(now_ms);
                    sanitize_match_state(guard.game_loop.state_mut());
                    events
                }));

                if result.is_err() {
                    error!("Game tick {} panicked, skipping", tick_count);
                    metrics.tick_panics.fetch_add(1, Ordering::Relaxed);
                }
                metrics.record_tick_time(tick_start.elapsed());
            }

            // Log stats periodically (every 30 seconds)
            if tick_count % (sim::TICK_RATE as u64 * 30) == 0 {
                let guard = session.read().await;
                let state = guard.game_loop.state();
                info!(
                    "Game: {}s, tick {}, {:?} wave {}, {} players ({} alive), {} asteroids, {} bullets",
                    start.elapsed().as_secs(),
                    guard.game_loop.current_tick(),
                    state.phase,
                    state.wave,
                    state.roster.len(),
                    state.alive_count(),
                    state.asteroids.len(),
                    state.bullets.len()
                );
            }
        }
    });
}
