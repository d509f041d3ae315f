//! Post outcome classification.
//!
//! The server answers every post with a `chat_result` element carrying an
//! integer `status`.  Zero is success; the known failure codes are small
//! integers, with `8` a historical alias of `4`.  Codes the client does not
//! recognise are preserved verbatim in [`PostStatus::Unknown`] so callers
//! can still branch on the raw value.

use serde::{Deserialize, Serialize};

/// Classified result status of a comment post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStatus {
    /// 0 – the comment was accepted.
    Success,
    /// 1 – the same comment was posted twice in a row.
    ContinuousPost,
    /// 2 – the thread id in the post frame is wrong or stale.
    ThreadIdError,
    /// 3 – the connection ticket was rejected.
    TicketError,
    /// 4 (alias 8) – the post key did not match the server's expectation.
    DifferentPostKey,
    /// 5 – posting from this account is locked.
    Locked,
    /// Any other code, preserved for diagnostics.
    Unknown(i32),
}

impl PostStatus {
    /// Classifies a raw wire status code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PostStatus::Success,
            1 => PostStatus::ContinuousPost,
            2 => PostStatus::ThreadIdError,
            3 => PostStatus::TicketError,
            4 | 8 => PostStatus::DifferentPostKey,
            5 => PostStatus::Locked,
            other => PostStatus::Unknown(other),
        }
    }

    /// Canonical code for this classification.
    ///
    /// Note that the alias collapses: both wire codes 4 and 8 classify as
    /// [`PostStatus::DifferentPostKey`], which reports 4 here.  Callers that
    /// need the originating wire value should keep the raw code they passed
    /// to [`from_code`](PostStatus::from_code).
    pub fn code(self) -> i32 {
        match self {
            PostStatus::Success => 0,
            PostStatus::ContinuousPost => 1,
            PostStatus::ThreadIdError => 2,
            PostStatus::TicketError => 3,
            PostStatus::DifferentPostKey => 4,
            PostStatus::Locked => 5,
            PostStatus::Unknown(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        self == PostStatus::Success
    }
}
