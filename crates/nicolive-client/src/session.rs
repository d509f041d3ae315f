//! Live session descriptor.
//!
//! The broadcast descriptor (chat server address, thread id, viewer
//! identity, session cookie) comes from an out-of-scope HTTP API; this
//! module only models the handle the client consumes.  The thread id is
//! the one mutable field: the server reassigns it during long sessions,
//! and the owner refreshes it through [`LiveSession::set_thread`] – the
//! client reads it at use time, so the refresh is visible to every
//! subsequent post.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Plain descriptor used to build a [`LiveSession`]; also the TOML schema
/// of the demo binary's `[session]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Broadcast identifier, e.g. `lv123456789`.
    pub broadcast_id: String,
    /// Comment server host.
    pub addr: String,
    /// Comment server port.
    pub port: u16,
    /// Initial thread id of the chat stream.
    pub thread: String,
    /// Logged-in viewer id.
    pub user_id: u64,
    /// Whether the viewer has a premium account.
    pub is_premium: bool,
    /// Session cookie sent to the post-key endpoint (`Cookie` header value).
    pub cookie: String,
}

/// Shared, partially mutable session handle.  Owned by the caller and
/// shared with the client as `Arc<LiveSession>` – the client holds a
/// reference, never a copy.
#[derive(Debug)]
pub struct LiveSession {
    pub broadcast_id: String,
    pub addr: String,
    pub port: u16,
    thread: RwLock<String>,
    pub user_id: u64,
    pub is_premium: bool,
    pub cookie: String,
}

impl LiveSession {
    pub fn new(info: SessionInfo) -> Self {
        Self {
            broadcast_id: info.broadcast_id,
            addr: info.addr,
            port: info.port,
            thread: RwLock::new(info.thread),
            user_id: info.user_id,
            is_premium: info.is_premium,
            cookie: info.cookie,
        }
    }

    /// Current thread id.
    pub fn thread(&self) -> String {
        self.thread.read().expect("thread lock poisoned").clone()
    }

    /// Replaces the thread id after the server reassigns it.
    pub fn set_thread(&self, thread: impl Into<String>) {
        *self.thread.write().expect("thread lock poisoned") = thread.into();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> SessionInfo {
        SessionInfo {
            broadcast_id: "lv1".to_string(),
            addr: "127.0.0.1".to_string(),
            port: 2805,
            thread: "1000".to_string(),
            user_id: 42,
            is_premium: false,
            cookie: "user_session=x".to_string(),
        }
    }

    #[test]
    fn test_thread_refresh_is_visible() {
        let session = LiveSession::new(info());
        assert_eq!(session.thread(), "1000");
        session.set_thread("2000");
        assert_eq!(session.thread(), "2000");
    }

    #[test]
    fn test_session_info_round_trips_through_toml() {
        let info = info();
        let text = toml::to_string(&info).expect("serialize");
        let restored: SessionInfo = toml::from_str(&text).expect("deserialize");
        assert_eq!(info, restored);
    }
}
