//! WebSocket server implementation
//!
//! Accepts WebSocket clients with tokio-tungstenite, admits them into the
//! shared GameSession and pumps JSON text frames both ways.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::RwLock;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::net::game_session::{start_game_loop, GameSession};
use crate::net::protocol::{decode, encode, ServerMessage};

/// Frames larger than this are ignored
const MAX_MESSAGE_SIZE: usize = 65_536;

/// WebSocket server
pub struct WebSocketServer {
    config: ServerConfig,
    game_session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
}

impl WebSocketServer {
    pub fn new(config: ServerConfig, metrics: Arc<Metrics>) -> Self {
        let game_session = Arc::new(RwLock::new(GameSession::new(&config, metrics.clone())));
        Self {
            config,
            game_session,
            metrics,
        }
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Run the server
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        tracing::info!("WebSocket server listening on ws://{}", self.bind_addr());

        // Start the game loop background task
        start_game_loop(self.game_session.clone());

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            };

            let game_session = self.game_session.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, game_session, metrics).await {
                    tracing::warn!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    game_session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    tracing::debug!("WebSocket handshake complete for {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = unbounded_channel::<ServerMessage>();

    // Writer task: encode queued server messages onto the socket
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match encode(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to encode message for {}: {}", addr, e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                tracing::debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
        let _ = write.close().await;
    });

    let player_id = Uuid::new_v4();
    let (admitted, input) = {
        let mut session = game_session.write().await;
        let admitted = session.add_connection(player_id, addr, tx).is_ok();
        (admitted, session.input_sender())
    };

    if !admitted {
        // The reject frame is already queued; let the writer flush and close
        let _ = writer.await;
        return Ok(());
    }

    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Read from {} failed: {}", addr, e);
                break;
            }
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        if text.len() > MAX_MESSAGE_SIZE {
            tracing::warn!("Ignored oversized message from {}: {} bytes", addr, text.len());
            continue;
        }

        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
        let message = match decode(&text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Ignored malformed message from {}: {}", addr, e);
                continue;
            }
        };

        if let Err(e) = input.try_send(player_id, message) {
            metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropped message from {}: {}", player_id, e);
        }
    }

    game_session.write().await.remove_connection(player_id);
    writer.abort();
    Ok(())
}
