//! Frame codec for the chat server protocol.
//!
//! Wire format (TCP, UTF-8 text, NUL-delimited):
//! ```text
//! <frame bytes> 0x00 <frame bytes> 0x00 ...
//! ```
//! Each frame holds one or more sibling XML elements.  Outbound traffic is
//! two commands:
//!
//! - connect: `<thread thread="T" version="20061206" res_from="-N"/>`
//! - post:    `<chat thread="T" ticket="..." postkey="..." mail="..."
//!             user_id="..." premium="0|1">text</chat>`
//!
//! The builders here return the frame text *without* the trailing NUL; the
//! transport appends [`FRAME_DELIMITER`] when writing.  Inbound traffic is
//! split into frames by [`FrameSplitter`] (a TCP read may deliver a partial
//! frame or several frames at once) and decoded by [`parse_frame`] into
//! typed [`ServerEvent`]s.

use tracing::debug;

use crate::protocol::xml::{parse_elements, XmlElement, XmlError};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Fixed protocol version token carried in every connect frame.
pub const PROTOCOL_VERSION: &str = "20061206";

/// Byte terminating every frame on the wire.
pub const FRAME_DELIMITER: u8 = 0x00;

// ── Outbound frame builders ───────────────────────────────────────────────────

/// Builds the connect frame for `thread`, requesting the last
/// `first_get_comments` comments as the initial backlog.
pub fn connect_frame(thread: &str, first_get_comments: u32) -> String {
    format!(
        r#"<thread thread="{}" version="{}" res_from="-{}"/>"#,
        escape_xml(thread),
        PROTOCOL_VERSION,
        first_get_comments
    )
}

/// Field set for one post frame.
///
/// `command` is the `mail` field: zero or more directives already joined
/// with single spaces.  `ticket` is the per-connection credential captured
/// from the first `thread` response; `post_key` is the single-use key
/// fetched immediately before the post.
#[derive(Debug, Clone, Copy)]
pub struct PostFrame<'a> {
    pub thread: &'a str,
    pub ticket: &'a str,
    pub post_key: &'a str,
    pub command: &'a str,
    pub user_id: u64,
    pub premium: bool,
    pub body: &'a str,
}

/// Builds the post frame.  Every interpolated value is XML-escaped.
pub fn post_frame(frame: &PostFrame<'_>) -> String {
    format!(
        r#"<chat thread="{}" ticket="{}" postkey="{}" mail="{}" user_id="{}" premium="{}">{}</chat>"#,
        escape_xml(frame.thread),
        escape_xml(frame.ticket),
        escape_xml(frame.post_key),
        escape_xml(frame.command),
        frame.user_id,
        u8::from(frame.premium),
        escape_xml(frame.body)
    )
}

/// Escapes the five XML-special characters in `raw`.
pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ── Inbound frame splitting ───────────────────────────────────────────────────

/// Accumulates raw socket bytes and yields complete NUL-terminated frames.
///
/// TCP is a stream protocol: a single read may return less than one frame
/// or more than one.  Bytes after the last delimiter stay buffered until
/// the next [`push`](FrameSplitter::push).
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame completed by it, in order.
    ///
    /// Frames are decoded as UTF-8 (lossily – the feed is UTF-8, so the
    /// lossy path only triggers on corruption).  Empty frames are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == FRAME_DELIMITER) {
            let frame: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&frame[..frame.len() - 1]);
            if !text.trim().is_empty() {
                frames.push(text.into_owned());
            }
        }
        frames
    }
}

// ── Inbound event decoding ────────────────────────────────────────────────────

/// One decoded inbound element, classified by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `<thread .../>` – connection response; carries the posting ticket.
    Thread { ticket: Option<String> },
    /// `<chat ...>text</chat>` – one chat comment, handed over raw so the
    /// domain layer can build a [`crate::Comment`] from it.
    Chat(XmlElement),
    /// `<chat_result status="..."><chat .../></chat_result>` – outcome of a
    /// post, echoing the posted comment.  An unparsable or missing status
    /// decodes as `-1` so it classifies as an unknown failure rather than
    /// silently as success.
    ChatResult {
        status: i32,
        chat: Option<XmlElement>,
    },
}

/// Decodes every element of one frame into [`ServerEvent`]s.
///
/// Elements with unrecognised tags are skipped (logged at debug level) so
/// protocol additions do not break the client.
///
/// # Errors
///
/// Returns [`XmlError`] when the frame text itself is syntactically broken.
pub fn parse_frame(frame: &str) -> Result<Vec<ServerEvent>, XmlError> {
    let elements = parse_elements(frame)?;
    let mut events = Vec::with_capacity(elements.len());

    for element in elements {
        match element.name.as_str() {
            "thread" => events.push(ServerEvent::Thread {
                ticket: element.attr("ticket").map(str::to_owned),
            }),
            "chat" => events.push(ServerEvent::Chat(element)),
            "chat_result" => {
                let status = element
                    .attr("status")
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(-1);
                let chat = element.child("chat").cloned();
                events.push(ServerEvent::ChatResult { status, chat });
            }
            other => {
                debug!(tag = other, "skipping unknown element in frame");
            }
        }
    }

    Ok(events)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Outbound builders ─────────────────────────────────────────────────────

    #[test]
    fn test_connect_frame_matches_wire_format() {
        let frame = connect_frame("1234567890", 100);
        assert_eq!(
            frame,
            r#"<thread thread="1234567890" version="20061206" res_from="-100"/>"#
        );
    }

    #[test]
    fn test_connect_frame_carries_requested_backlog() {
        let frame = connect_frame("42", 5);
        assert!(frame.contains(r#"res_from="-5""#));
    }

    #[test]
    fn test_post_frame_matches_wire_format() {
        let frame = post_frame(&PostFrame {
            thread: "1234567890",
            ticket: "0x12ab34cd",
            post_key: "abcdef",
            command: "184 big",
            user_id: 123,
            premium: true,
            body: "hello",
        });
        assert_eq!(
            frame,
            r#"<chat thread="1234567890" ticket="0x12ab34cd" postkey="abcdef" mail="184 big" user_id="123" premium="1">hello</chat>"#
        );
    }

    #[test]
    fn test_post_frame_non_premium_encodes_zero() {
        let frame = post_frame(&PostFrame {
            thread: "1",
            ticket: "",
            post_key: "k",
            command: "",
            user_id: 7,
            premium: false,
            body: "x",
        });
        assert!(frame.contains(r#"premium="0""#));
        assert!(frame.contains(r#"ticket="""#));
    }

    #[test]
    fn test_post_frame_escapes_body_and_command() {
        let frame = post_frame(&PostFrame {
            thread: "1",
            ticket: "t",
            post_key: "k",
            command: "a<b",
            user_id: 1,
            premium: false,
            body: "1 < 2 & \"quotes\"",
        });
        assert!(frame.contains(r#"mail="a&lt;b""#));
        assert!(frame.contains(">1 &lt; 2 &amp; &quot;quotes&quot;</chat>"));
    }

    #[test]
    fn test_escape_xml_handles_all_special_characters() {
        assert_eq!(escape_xml(r#"<>&"'"#), "&lt;&gt;&amp;&quot;&#39;");
        assert_eq!(escape_xml("plain"), "plain");
    }

    // ── FrameSplitter ─────────────────────────────────────────────────────────

    #[test]
    fn test_splitter_yields_single_complete_frame() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push(b"<thread ticket=\"t\"/>\0");
        assert_eq!(frames, vec!["<thread ticket=\"t\"/>".to_string()]);
    }

    #[test]
    fn test_splitter_reassembles_frame_split_across_reads() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(b"<chat>par").is_empty());
        let frames = splitter.push(b"tial</chat>\0");
        assert_eq!(frames, vec!["<chat>partial</chat>".to_string()]);
    }

    #[test]
    fn test_splitter_splits_multiple_frames_in_one_read() {
        let mut splitter = FrameSplitter::new();
        let frames = splitter.push(b"<chat>a</chat>\0<chat>b</chat>\0<chat>c");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "<chat>a</chat>");
        assert_eq!(frames[1], "<chat>b</chat>");
        // The tail stays buffered until its delimiter arrives.
        let frames = splitter.push(b"</chat>\0");
        assert_eq!(frames, vec!["<chat>c</chat>".to_string()]);
    }

    #[test]
    fn test_splitter_drops_empty_frames() {
        let mut splitter = FrameSplitter::new();
        assert!(splitter.push(b"\0\0 \0").is_empty());
    }

    // ── parse_frame ───────────────────────────────────────────────────────────

    #[test]
    fn test_parse_frame_decodes_thread_event_with_ticket() {
        let events = parse_frame(r#"<thread resultcode="0" ticket="0xdead"/>"#).unwrap();
        assert_eq!(
            events,
            vec![ServerEvent::Thread {
                ticket: Some("0xdead".to_string())
            }]
        );
    }

    #[test]
    fn test_parse_frame_thread_without_ticket_yields_none() {
        let events = parse_frame(r#"<thread resultcode="1"/>"#).unwrap();
        assert_eq!(events, vec![ServerEvent::Thread { ticket: None }]);
    }

    #[test]
    fn test_parse_frame_decodes_chat_event_raw() {
        let events = parse_frame(r#"<chat thread="1" user_id="9">hi</chat>"#).unwrap();
        match &events[0] {
            ServerEvent::Chat(element) => {
                assert_eq!(element.attr("user_id"), Some("9"));
                assert_eq!(element.text, "hi");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_frame_decodes_chat_result_with_embedded_chat() {
        let events =
            parse_frame(r#"<chat_result status="4"><chat user_id="5">mine</chat></chat_result>"#)
                .unwrap();
        match &events[0] {
            ServerEvent::ChatResult { status, chat } => {
                assert_eq!(*status, 4);
                assert_eq!(chat.as_ref().unwrap().text, "mine");
            }
            other => panic!("expected ChatResult, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_frame_chat_result_missing_status_decodes_as_unknown() {
        let events = parse_frame(r#"<chat_result></chat_result>"#).unwrap();
        assert_eq!(
            events,
            vec![ServerEvent::ChatResult {
                status: -1,
                chat: None
            }]
        );
    }

    #[test]
    fn test_parse_frame_handles_multiple_sibling_elements() {
        let frame = r#"<thread ticket="t"/><chat>a</chat><chat>b</chat>"#;
        let events = parse_frame(frame).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ServerEvent::Thread { .. }));
        assert!(matches!(events[1], ServerEvent::Chat(_)));
        assert!(matches!(events[2], ServerEvent::Chat(_)));
    }

    #[test]
    fn test_parse_frame_skips_unknown_tags() {
        let events = parse_frame(r#"<leave_thread/><chat>still here</chat>"#).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Chat(_)));
    }

    #[test]
    fn test_parse_frame_propagates_malformed_input() {
        assert!(parse_frame("<chat>broken").is_err());
    }
}
