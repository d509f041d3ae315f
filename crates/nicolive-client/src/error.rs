//! Error taxonomy for the chat client.
//!
//! Socket errors are surfaced twice by design: published on the event bus
//! for observers (they do not tear the connection down by themselves) and
//! returned to the specific caller whose operation they broke.  Post
//! failures always carry the originating wire status so callers can branch
//! programmatically.  No operation retries on its own – retry policy
//! belongs to the caller.

use thiserror::Error;

use nicolive_core::PostStatus;

use crate::postkey::PostKeyError;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The server produced no connection response before the timer fired.
    #[error("connection to the comment server timed out")]
    ConnectionTimeout,

    /// An I/O error on the socket, passed through unchanged.
    #[error("socket error: {0}")]
    Socket(#[source] std::io::Error),

    /// The operation requires an open connection and there is none.
    #[error("not connected to the comment server")]
    NotConnected,

    /// The comment text was empty after stripping whitespace.
    #[error("cannot post an empty comment")]
    EmptyComment,

    /// The post-key fetch failed; the inner error says how.
    #[error("failed to fetch post key: {0}")]
    PostKey(#[from] PostKeyError),

    /// No post result arrived before the post timer fired.
    #[error("post result response timed out")]
    PostTimeout,

    /// The server answered the post with a non-success status.
    /// `code` is the raw wire status (the alias 8 stays 8 here).
    #[error("comment rejected by the server: {status:?} (wire status {code})")]
    PostRejected { status: PostStatus, code: i32 },

    /// The connection closed while a post was waiting for its result.
    #[error("connection closed while a post was in flight")]
    ConnectionClosed,

    /// The client was disposed; every further call fails with this.
    #[error("client has been disposed")]
    Disposed,
}
