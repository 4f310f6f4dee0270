//! Lock-free command buffer between connections and the tick
//!
//! Connection tasks push decoded client messages through a bounded
//! crossbeam channel; the game loop drains everything pending at the start
//! of each tick, so commands are applied in arrival order at a tick boundary.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::state::PlayerId;
use crate::net::protocol::ClientMessage;

/// A client command tagged with its sender
#[derive(Debug, Clone)]
pub struct Command {
    pub player_id: PlayerId,
    pub message: ClientMessage,
}

/// Bounded MPSC queue of client commands
pub struct InputBuffer {
    sender: Sender<Command>,
    receiver: Receiver<Command>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Sender handle for a connection task
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Non-blocking submit. Returns false if the buffer is full.
    #[inline]
    pub fn try_submit(&self, player_id: PlayerId, message: ClientMessage) -> bool {
        self.sender.try_send(Command { player_id, message }).is_ok()
    }

    /// Take every pending command
    pub fn drain(&self) -> Vec<Command> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Clonable sender held by each connection
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<Command>,
}

impl InputSender {
    #[inline]
    pub fn try_send(&self, player_id: PlayerId, message: ClientMessage) -> Result<(), InputBufferError> {
        self.sender
            .try_send(Command { player_id, message })
            .map_err(|e| match e {
                TrySendError::Full(_) => InputBufferError::Full,
                TrySendError::Disconnected(_) => InputBufferError::Disconnected,
            })
    }
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    /// Backpressure: the tick has not drained yet
    #[error("Input buffer is full")]
    Full,
    /// The game loop has stopped
    #[error("Input buffer is disconnected")]
    Disconnected,
}
