//! Outward excavation notifications.
//!
//! Terminal session transitions surface two ways: as [`DigEvent`]s collected
//! in a [`DigEventBuffer`] (for systems that poll once per frame), and
//! through the per-session [`DigTicket`] future handed out at start. Inward
//! feeds (tick pulses, block-change notifications) are plain method calls on
//! the controller, scoped to the session's target position, so there are no
//! listener registrations to leak.

use quarry_core::Block;
use tokio::sync::oneshot;

use crate::session::DigError;

/// A terminal excavation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigEvent {
    /// The target became air; payload is the now-empty block snapshot.
    Completed(Block),
    /// The session ended without completing; payload is the block that was
    /// being dug.
    Aborted(Block),
}

/// Double-buffered event storage, drained by the embedding game loop.
///
/// Events written in the current frame stay readable through the next frame;
/// after two [`swap`](DigEventBuffer::swap) calls they are dropped. Call
/// [`swap`](DigEventBuffer::swap) once per frame.
#[derive(Debug, Default)]
pub struct DigEventBuffer {
    /// Events from the previous frame (readable).
    prev: Vec<DigEvent>,
    /// Events from the current frame (being written).
    current: Vec<DigEvent>,
}

impl DigEventBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event.
    pub fn send(&mut self, event: DigEvent) {
        self.current.push(event);
    }

    /// Returns all readable events (previous + current frame).
    pub fn read(&self) -> impl Iterator<Item = &DigEvent> {
        self.prev.iter().chain(self.current.iter())
    }

    /// Number of readable events.
    pub fn len(&self) -> usize {
        self.prev.len() + self.current.len()
    }

    /// Returns `true` if there are no readable events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advances the frame: previous events are dropped, current becomes
    /// previous.
    pub fn swap(&mut self) {
        self.prev.clear();
        std::mem::swap(&mut self.prev, &mut self.current);
    }

    /// Drops all events from both frames.
    pub fn clear(&mut self) {
        self.prev.clear();
        self.current.clear();
    }
}

/// Completion future for one excavation session.
///
/// Resolves with the air snapshot when the world confirms completion, or
/// with the session's failure when it is stopped or superseded.
#[derive(Debug)]
pub struct DigTicket {
    rx: oneshot::Receiver<Result<Block, DigError>>,
}

impl DigTicket {
    /// Creates a linked sender/ticket pair.
    pub(crate) fn channel() -> (oneshot::Sender<Result<Block, DigError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Waits for the session to end.
    ///
    /// # Errors
    ///
    /// [`DigError::Aborted`] when the session was stopped, superseded, or its
    /// controller dropped; [`DigError::Transport`] when a packet send failed
    /// mid-session.
    pub async fn wait(self) -> Result<Block, DigError> {
        self.rx.await.unwrap_or(Err(DigError::Aborted))
    }
}
