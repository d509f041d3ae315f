//! Structured comment model built from one raw `chat` element.
//!
//! A chat element looks like
//!
//! ```text
//! <chat thread="123" vpos="3600" date="1600000000" date_usec="500000"
//!       user_id="456" premium="1" locale="ja-jp" mail="184"
//!       anonymity="1" yourpost="1">comment text</chat>
//! ```
//!
//! Construction is tolerant by design: the feed omits attributes freely, so
//! every missing or unparsable attribute falls back to its zero value
//! rather than failing the whole comment.  The only text decoding applied
//! is un-escaping `&gt;`/`&lt;` – the feed double-escapes exactly the angle
//! brackets and nothing else.

use serde::{Deserialize, Serialize};

use crate::protocol::xml::XmlElement;

/// Well-known author id of system/administrative comments.
pub const SYSTEM_USER_ID: u64 = 900_000_000;

// ── Author metadata ───────────────────────────────────────────────────────────

/// Account type, carried in the `premium` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    /// 0 – ordinary viewer account.
    General,
    /// 1 – paying viewer account.
    Premium,
    /// 3 – the broadcaster's own posting identity.
    Distributor,
    /// 6 – administrative account.
    Admin,
    /// Any other value the feed produces.
    Other(u32),
}

impl AccountType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => AccountType::General,
            1 => AccountType::Premium,
            3 => AccountType::Distributor,
            6 => AccountType::Admin,
            other => AccountType::Other(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            AccountType::General => 0,
            AccountType::Premium => 1,
            AccountType::Distributor => 3,
            AccountType::Admin => 6,
            AccountType::Other(raw) => raw,
        }
    }
}

/// Author identifier: numeric for logged-in accounts, an opaque handle
/// string for anonymous ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserId {
    Id(u64),
    Anonymous(String),
}

impl UserId {
    /// Parses the raw `user_id` attribute: all-digit values become numeric,
    /// everything else is kept verbatim as an anonymous handle.
    pub fn from_raw(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<u64>() {
                return UserId::Id(id);
            }
        }
        UserId::Anonymous(raw.to_string())
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            UserId::Id(id) => Some(*id),
            UserId::Anonymous(_) => None,
        }
    }
}

/// Author record embedded in every [`Comment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentUser {
    pub id: UserId,
    /// NG (filter) score; 0 when the feed omits it.
    pub score: i64,
    pub account_type: AccountType,
    pub is_premium: bool,
    pub is_anonymous: bool,
}

// ── Comment ───────────────────────────────────────────────────────────────────

/// One received chat comment, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Thread id the comment belongs to.
    pub thread: String,
    /// Position offset within the broadcast timeline, in server units.
    pub vpos: i64,
    /// Post time in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Poster locale hint, e.g. `ja-jp`.
    pub locale: String,
    /// Command string set at post time; may hold several space-joined
    /// directives (`"184 big"`).
    pub command: String,
    /// Decoded comment text.
    pub text: String,
    /// True when this client's logged-in viewer posted the comment.
    pub is_my_post: bool,
    pub user: CommentUser,
}

impl Comment {
    /// Builds a comment from one raw `chat` element.
    ///
    /// `logged_in_user_id` is the viewer id of the current session; it
    /// feeds the self-post detection alongside the feed's `yourpost` flag.
    pub fn from_element(element: &XmlElement, logged_in_user_id: u64) -> Self {
        let attr = |name: &str| element.attr(name).unwrap_or("");
        let int_attr = |name: &str| attr(name).parse::<i64>().unwrap_or(0);

        let id = UserId::from_raw(attr("user_id"));
        let is_my_post =
            attr("yourpost") == "1" || id.as_number() == Some(logged_in_user_id);

        let premium_raw = attr("premium").parse::<u32>().unwrap_or(0);

        Comment {
            thread: attr("thread").to_string(),
            vpos: int_attr("vpos"),
            timestamp_ms: int_attr("date") * 1000,
            locale: attr("locale").to_string(),
            command: attr("mail").to_string(),
            text: decode_comment_text(&element.text),
            is_my_post,
            user: CommentUser {
                id,
                score: int_attr("score"),
                account_type: AccountType::from_raw(premium_raw),
                is_premium: premium_raw > 0,
                is_anonymous: int_attr("anonymity") != 0,
            },
        }
    }

    /// System or administrative comment (broadcast-end signals and the
    /// like), distinguished from normal viewer chat.
    pub fn is_control_comment(&self) -> bool {
        self.user.id.as_number() == Some(SYSTEM_USER_ID)
            || self.user.account_type == AccountType::Admin
    }

    pub fn is_normal_comment(&self) -> bool {
        !(self.is_control_comment() && self.is_from_distributor())
    }

    pub fn is_from_distributor(&self) -> bool {
        self.user.account_type == AccountType::Distributor
    }

    pub fn is_post_by_self(&self) -> bool {
        self.is_my_post
    }

    pub fn is_post_by_anonymous(&self) -> bool {
        self.user.is_anonymous
    }

    pub fn is_post_by_premium_user(&self) -> bool {
        self.user.is_premium
    }
}

/// Un-escapes the two entities the feed escapes in comment bodies.
///
/// Everything else – including `&amp;` – passes through untouched.
pub fn decode_comment_text(raw: &str) -> String {
    raw.replace("&gt;", ">").replace("&lt;", "<")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::xml::parse_elements;

    fn parse_one(xml: &str) -> XmlElement {
        parse_elements(xml).expect("valid element").remove(0)
    }

    #[test]
    fn test_full_example_fragment_parses_as_specified() {
        let element = parse_one(
            r#"<chat thread="1" vpos="12" date="1600000000" user_id="123" premium="0">hello &gt; world</chat>"#,
        );
        let comment = Comment::from_element(&element, 123);

        assert_eq!(comment.text, "hello > world");
        assert!(comment.is_my_post);
        assert_eq!(comment.user.id, UserId::Id(123));
        assert!(!comment.user.is_premium);
        assert_eq!(comment.thread, "1");
        assert_eq!(comment.vpos, 12);
        assert_eq!(comment.timestamp_ms, 1_600_000_000_000);
    }

    #[test]
    fn test_text_decodes_only_angle_bracket_entities() {
        let element = parse_one("<chat>&lt;b&gt; &amp; &quot;x&quot;</chat>");
        let comment = Comment::from_element(&element, 0);
        // &amp; and &quot; are untouched; only &lt;/&gt; decode.
        assert_eq!(comment.text, "<b> &amp; &quot;x&quot;");
    }

    #[test]
    fn test_self_post_from_yourpost_flag() {
        let element = parse_one(r#"<chat user_id="999" yourpost="1">x</chat>"#);
        assert!(Comment::from_element(&element, 123).is_my_post);
    }

    #[test]
    fn test_self_post_from_matching_user_id() {
        let element = parse_one(r#"<chat user_id="123">x</chat>"#);
        assert!(Comment::from_element(&element, 123).is_my_post);
    }

    #[test]
    fn test_not_self_post_when_neither_signal_matches() {
        let element = parse_one(r#"<chat user_id="999" yourpost="0">x</chat>"#);
        assert!(!Comment::from_element(&element, 123).is_my_post);
    }

    #[test]
    fn test_anonymous_author_never_matches_logged_in_id() {
        let element = parse_one(r#"<chat user_id="abc123xyz">x</chat>"#);
        let comment = Comment::from_element(&element, 0);
        assert!(!comment.is_my_post);
        assert_eq!(comment.user.id, UserId::Anonymous("abc123xyz".to_string()));
    }

    #[test]
    fn test_numeric_user_id_parses_to_number() {
        let element = parse_one(r#"<chat user_id="12345">x</chat>"#);
        assert_eq!(
            Comment::from_element(&element, 0).user.id,
            UserId::Id(12345)
        );
    }

    #[test]
    fn test_account_type_zero_is_general_and_not_premium() {
        let element = parse_one(r#"<chat premium="0">x</chat>"#);
        let user = Comment::from_element(&element, 0).user;
        assert_eq!(user.account_type, AccountType::General);
        assert!(!user.is_premium);
    }

    #[test]
    fn test_account_type_one_is_premium() {
        let element = parse_one(r#"<chat premium="1">x</chat>"#);
        let user = Comment::from_element(&element, 0).user;
        assert_eq!(user.account_type, AccountType::Premium);
        assert!(user.is_premium);
    }

    #[test]
    fn test_distributor_and_admin_account_types() {
        let distributor = parse_one(r#"<chat premium="3">x</chat>"#);
        assert!(Comment::from_element(&distributor, 0).is_from_distributor());

        let admin = parse_one(r#"<chat premium="6">x</chat>"#);
        let comment = Comment::from_element(&admin, 0);
        assert_eq!(comment.user.account_type, AccountType::Admin);
        assert!(comment.is_control_comment());
    }

    #[test]
    fn test_unlisted_account_type_is_preserved() {
        let element = parse_one(r#"<chat premium="24">x</chat>"#);
        let user = Comment::from_element(&element, 0).user;
        assert_eq!(user.account_type, AccountType::Other(24));
        assert_eq!(user.account_type.raw(), 24);
        assert!(user.is_premium);
    }

    #[test]
    fn test_system_user_id_is_control_comment() {
        let element = parse_one(r#"<chat user_id="900000000">/jump</chat>"#);
        assert!(Comment::from_element(&element, 0).is_control_comment());
    }

    #[test]
    fn test_normal_comment_excludes_distributor_control() {
        // A control comment from the distributor is not normal chat.
        let element = parse_one(r#"<chat user_id="900000000" premium="3">/disconnect</chat>"#);
        let comment = Comment::from_element(&element, 0);
        assert!(!comment.is_normal_comment());

        // An ordinary viewer comment is.
        let viewer = parse_one(r#"<chat user_id="5">hi</chat>"#);
        assert!(Comment::from_element(&viewer, 0).is_normal_comment());
    }

    #[test]
    fn test_anonymity_flag_sets_is_anonymous() {
        let element = parse_one(r#"<chat user_id="184abc" anonymity="1">x</chat>"#);
        assert!(Comment::from_element(&element, 0).is_post_by_anonymous());

        let named = parse_one(r#"<chat user_id="5">x</chat>"#);
        assert!(!Comment::from_element(&named, 0).is_post_by_anonymous());
    }

    #[test]
    fn test_missing_attributes_fall_back_to_defaults() {
        let element = parse_one("<chat>bare</chat>");
        let comment = Comment::from_element(&element, 0);
        assert_eq!(comment.vpos, 0);
        assert_eq!(comment.timestamp_ms, 0);
        assert_eq!(comment.user.score, 0);
        assert_eq!(comment.command, "");
        assert_eq!(comment.user.id, UserId::Anonymous(String::new()));
    }

    #[test]
    fn test_score_attribute_is_parsed() {
        let element = parse_one(r#"<chat user_id="5" score="-1500">x</chat>"#);
        assert_eq!(Comment::from_element(&element, 0).user.score, -1500);
    }

    #[test]
    fn test_command_carries_multiple_directives() {
        let element = parse_one(r#"<chat mail="184 big red">x</chat>"#);
        assert_eq!(Comment::from_element(&element, 0).command, "184 big red");
    }
}
