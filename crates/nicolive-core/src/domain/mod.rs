//! Domain value types built from the wire protocol's raw elements.

pub mod comment;

pub use comment::{AccountType, Comment, CommentUser, UserId, SYSTEM_USER_ID};
