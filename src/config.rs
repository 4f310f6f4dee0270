use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::game_loop::{GameLoopConfig, DEFAULT_LEADERBOARD_PASSWORD};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// WebSocket port
    pub port: u16,
    /// Leaderboard JSON file
    pub leaderboard_path: PathBuf,
    /// Password accepted by `clearLeaderboard`
    pub leaderboard_password: String,
    /// Seconds before game over returns to the lobby
    pub gameover_reset_secs: u64,
    /// Port for the metrics/health endpoint
    pub metrics_port: u16,
    /// Pending client commands before backpressure
    pub input_buffer_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            leaderboard_path: PathBuf::from("leaderboard.json"),
            leaderboard_password: DEFAULT_LEADERBOARD_PASSWORD.to_string(),
            gameover_reset_secs: 5,
            metrics_port: 9090,
            input_buffer_capacity: 1024,
        }
    }
}

/// Parse an env var into `target`, keeping the default on bad input
fn override_from_env<T: FromStr>(name: &str, target: &mut T, accept: impl Fn(&T) -> bool) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' is out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        override_from_env("BIND_ADDRESS", &mut config.bind_address, |_| true);
        override_from_env("PORT", &mut config.port, |p| *p > 0);
        override_from_env("METRICS_PORT", &mut config.metrics_port, |p| *p > 0);
        override_from_env("GAMEOVER_RESET_SECS", &mut config.gameover_reset_secs, |s| *s <= 3600);
        override_from_env("INPUT_BUFFER_CAPACITY", &mut config.input_buffer_capacity, |c| {
            (16..=65_536).contains(c)
        });

        if let Ok(path) = std::env::var("LEADERBOARD_PATH") {
            config.leaderboard_path = PathBuf::from(path);
        }
        if let Ok(password) = std::env::var("LEADERBOARD_PASSWORD") {
            if password.is_empty() {
                tracing::warn!("Empty LEADERBOARD_PASSWORD, using default");
            } else {
                config.leaderboard_password = password;
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.metrics_port == self.port {
            return Err("METRICS_PORT must differ from PORT".to_string());
        }
        if self.leaderboard_password.is_empty() {
            return Err("leaderboard_password cannot be empty".to_string());
        }
        if self.input_buffer_capacity == 0 {
            return Err("input_buffer_capacity must be at least 1".to_string());
        }
        Ok(())
    }

    /// Settings consumed by the tick driver
    pub fn game_loop_config(&self) -> GameLoopConfig {
        GameLoopConfig {
            reset_delay_ms: self.gameover_reset_secs * 1000,
            leaderboard_password: self.leaderboard_password.clone(),
            input_buffer_capacity: self.input_buffer_capacity,
            ..GameLoopConfig::default()
        }
    }
}
