//! # nicolive-core
//!
//! Shared library for the live-broadcast chat client containing the wire
//! protocol codec and the comment domain model.
//!
//! This crate is used by the networked client crate but performs no I/O
//! itself: it turns byte buffers into typed server events and raw chat
//! elements into structured [`Comment`] values, and builds the outbound
//! frames the client writes to the socket.
//!
//! - **`protocol`** – How bytes travel over the wire.  The chat server
//!   speaks NUL-delimited UTF-8 frames, each holding one or more sibling
//!   XML elements with no enclosing document.  The codec splits frames,
//!   scans elements, and classifies them into [`ServerEvent`]s; outbound
//!   frame builders produce the connect and post commands.
//!
//! - **`domain`** – Pure value types with no I/O.  [`Comment`] is the
//!   structured record built from one raw `chat` element, together with
//!   the author metadata and the predicate set (control comment,
//!   distributor, self-post, ...).

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `nicolive_core::Comment` instead of `nicolive_core::domain::comment::Comment`.
pub use domain::comment::{AccountType, Comment, CommentUser, UserId, SYSTEM_USER_ID};
pub use protocol::codec::{
    connect_frame, parse_frame, post_frame, FrameSplitter, PostFrame, ServerEvent,
    FRAME_DELIMITER, PROTOCOL_VERSION,
};
pub use protocol::status::PostStatus;
pub use protocol::xml::{XmlElement, XmlError};
