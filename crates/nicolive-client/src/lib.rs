//! nicolive-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client owns one TCP connection per live session.  The moving parts:
//!
//! 1. [`session::LiveSession`] describes the broadcast: chat server
//!    address/port, thread id (mutable – the server reassigns it during
//!    long sessions), viewer identity, and the session cookie.
//! 2. [`connection::CommentClient`] drives the connect/reconnect/disconnect
//!    state machine, feeds inbound bytes through the `nicolive-core` codec,
//!    and republishes decoded events on the bus.
//! 3. [`postkey`] fetches the single-use posting credential over HTTP
//!    immediately before each post.
//! 4. [`events::EventBus`] fans decoded events out to any number of
//!    observers (a UI layer, a logger, the post coordinator's wait).

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod postkey;
pub mod session;

pub use connection::{CommentClient, ConnectOptions, ConnectionState, PostOptions};
pub use error::ChatError;
pub use events::{ChatEvent, EventBus};
pub use postkey::{HttpPostKeySource, PostKeyError, PostKeySource, DEFAULT_POSTKEY_ENDPOINT};
pub use session::{LiveSession, SessionInfo};
