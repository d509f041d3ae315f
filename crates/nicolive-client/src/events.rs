//! In-process publish/subscribe fan-out of connection and comment events.
//!
//! # Why a broadcast channel? (for beginners)
//!
//! The connection's read task is the single producer of events, but several
//! parties consume them independently: a UI layer wants comments, a logger
//! wants everything, and each in-flight post waits for the next post
//! result.  `tokio::sync::broadcast` gives every subscriber its own cursor
//! over the same ordered stream, so producers never block and subscribers
//! never steal events from each other.  A subscriber that falls more than
//! the channel capacity behind loses its oldest events (it observes a
//! `Lagged` error, not a stall) – acceptable here because every event is a
//! point-in-time notification, not state.

use tokio::sync::broadcast;

use nicolive_core::Comment;

/// Default event channel capacity per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything the client publishes to observers.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// First `thread` response decoded; the connection is established.
    /// Fires exactly once per successful connection.
    Connected,
    /// Raw text of one socket read, before any decoding.
    RawData(String),
    /// One decoded chat comment.
    CommentReceived(Comment),
    /// The comments decoded from the first response batch, republished
    /// once per connection.
    FirstResponseProcessed(Vec<Comment>),
    /// Outcome of a post: raw wire status plus the echoed comment.
    PostResult {
        status: i32,
        comment: Option<Comment>,
    },
    /// A socket error, passed through as a notification.  Does not itself
    /// tear down the connection.
    SocketError(String),
    /// The socket is gone – explicit disconnect, server close, or error.
    ConnectionClosed,
    /// The distributor signalled the end of the broadcast.
    BroadcastEnded,
}

/// Fan-out wrapper over a broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription starting at the current tail of the stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event` to all current subscribers.  Publishing with no
    /// subscribers is not an error – the event is simply dropped.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
