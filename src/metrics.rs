//! Prometheus-compatible metrics endpoint
//!
//! Exposes lane defense server metrics in Prometheus text and JSON.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::state::{MatchState, Phase};

/// Samples kept for tick percentiles
const TICK_HISTORY: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // Match
    pub players: AtomicU64,
    pub alive_players: AtomicU64,
    pub wave: AtomicU64,
    /// 0=lobby, 1=playing, 2=upgrades, 3=gameover
    pub phase: AtomicU64,
    pub matches_played: AtomicU64,

    // Entity counts
    pub asteroid_count: AtomicU64,
    pub bullet_count: AtomicU64,
    pub asteroids_destroyed: AtomicU64,
    pub ground_impacts: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,
    pub tick_panics: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_dropped: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

fn phase_code(phase: Phase) -> u64 {
    match phase {
        Phase::Lobby => 0,
        Phase::Playing => 1,
        Phase::Upgrades => 2,
        Phase::GameOver => 3,
    }
}

fn phase_name(code: u64) -> &'static str {
    match code {
        0 => "lobby",
        1 => "playing",
        2 => "upgrades",
        _ => "gameover",
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            players: AtomicU64::new(0),
            alive_players: AtomicU64::new(0),
            wave: AtomicU64::new(0),
            phase: AtomicU64::new(0),
            matches_played: AtomicU64::new(0),
            asteroid_count: AtomicU64::new(0),
            bullet_count: AtomicU64::new(0),
            asteroids_destroyed: AtomicU64::new(0),
            ground_impacts: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            tick_panics: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Copy gauges from the match state after a tick
    pub fn observe_state(&self, state: &MatchState) {
        self.players.store(state.roster.len() as u64, Ordering::Relaxed);
        self.alive_players.store(state.alive_count() as u64, Ordering::Relaxed);
        self.wave.store(state.wave as u64, Ordering::Relaxed);
        self.phase.store(phase_code(state.phase), Ordering::Relaxed);
        self.asteroid_count.store(state.asteroids.len() as u64, Ordering::Relaxed);
        self.bullet_count.store(state.bullets.len() as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("lane_defense_players", "Connected players", "gauge",
            self.players.load(Ordering::Relaxed));
        metric!("lane_defense_players_alive", "Match participants with HP left", "gauge",
            self.alive_players.load(Ordering::Relaxed));
        metric!("lane_defense_wave", "Current wave", "gauge",
            self.wave.load(Ordering::Relaxed));
        metric!("lane_defense_matches_total", "Matches finished", "counter",
            self.matches_played.load(Ordering::Relaxed));

        metric!("lane_defense_asteroids", "Live asteroids", "gauge",
            self.asteroid_count.load(Ordering::Relaxed));
        metric!("lane_defense_bullets", "Live bullets", "gauge",
            self.bullet_count.load(Ordering::Relaxed));
        metric!("lane_defense_asteroids_destroyed_total", "Asteroids destroyed by players", "counter",
            self.asteroids_destroyed.load(Ordering::Relaxed));
        metric!("lane_defense_ground_impacts_total", "Asteroids that reached the ground", "counter",
            self.ground_impacts.load(Ordering::Relaxed));

        metric!("lane_defense_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("lane_defense_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("lane_defense_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("lane_defense_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("lane_defense_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("lane_defense_tick_panics_total", "Ticks that panicked and were skipped", "counter",
            self.tick_panics.load(Ordering::Relaxed));

        output.push_str(&format!(
            "# HELP lane_defense_phase Current match phase\n# TYPE lane_defense_phase gauge\nlane_defense_phase{{phase=\"{}\"}} 1\n",
            phase_name(self.phase.load(Ordering::Relaxed))
        ));

        metric!("lane_defense_connections_active", "Open WebSocket connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("lane_defense_connections_rejected_total", "Connections refused at admission", "counter",
            self.connections_rejected.load(Ordering::Relaxed));
        metric!("lane_defense_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("lane_defense_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("lane_defense_messages_dropped_total", "Client messages dropped under backpressure", "counter",
            self.messages_dropped.load(Ordering::Relaxed));
        metric!("lane_defense_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        serde_json::json!({
            "match": {
                "players": load(&self.players),
                "alive": load(&self.alive_players),
                "wave": load(&self.wave),
                "phase": phase_name(load(&self.phase)),
                "matches_played": load(&self.matches_played),
            },
            "entities": {
                "asteroids": load(&self.asteroid_count),
                "bullets": load(&self.bullet_count),
                "asteroids_destroyed": load(&self.asteroids_destroyed),
                "ground_impacts": load(&self.ground_impacts),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
                "tick_panics": load(&self.tick_panics),
            },
            "network": {
                "connections": load(&self.connections_active),
                "rejected": load(&self.connections_rejected),
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "messages_dropped": load(&self.messages_dropped),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Route a raw HTTP request line to a response
fn respond(metrics: &Metrics, request: &str) -> String {
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    match path {
        "/metrics/json" | "/json" => http_response("200 OK", "application/json", &metrics.to_json()),
        "/metrics" => http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus()),
        "/health" | "/" => http_response("200 OK", "text/plain", "OK"),
        _ => http_response("404 Not Found", "text/plain", ""),
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
