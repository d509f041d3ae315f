//! Minimal element scanner for the chat server's inbound stream.
//!
//! The server sends frames of UTF-8 text containing zero or more *sibling*
//! elements with no enclosing document root, e.g.
//!
//! ```text
//! <thread resultcode="0" ticket="0x12ab"/><chat thread="1" date="1600000000">hi</chat>
//! ```
//!
//! A full-document XML parser would reject this, so the scanner here walks
//! the text directly: attributes, an optional text body, and nested child
//! elements (the protocol nests exactly one level, for `chat_result`).
//! Attribute values and text are kept raw – entity handling belongs to the
//! comment model, which decodes only the two entities the feed escapes.

use thiserror::Error;

/// Errors raised while scanning an inbound frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum XmlError {
    /// The frame ended in the middle of a syntactic construct.
    #[error("unexpected end of frame while scanning {context}")]
    UnexpectedEnd { context: &'static str },

    /// A required delimiter byte was missing.
    #[error("expected `{expected}` at byte {at}")]
    Expected { expected: char, at: usize },

    /// An element or attribute name was empty or started with a stray byte.
    #[error("invalid name at byte {at}")]
    InvalidName { at: usize },

    /// A closing tag did not match the element it should close.
    #[error("mismatched closing tag: opened <{opened}>, closed </{closed}>")]
    MismatchedClosingTag { opened: String, closed: String },
}

/// One scanned element: name, attributes in document order, text body, and
/// child elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name, e.g. `chat`.
    pub name: String,
    /// Attributes in the order they appeared.
    attributes: Vec<(String, String)>,
    /// Concatenated raw character data of the element body.
    pub text: String,
    /// Nested child elements.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Returns the raw value of the first attribute named `name`, if any.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Scans every sibling element out of one frame of text.
///
/// Whitespace between siblings is ignored.  An empty (or all-whitespace)
/// frame yields an empty vector.
///
/// # Errors
///
/// Returns [`XmlError`] when the frame is syntactically broken – truncated
/// elements, unterminated quotes, or mismatched closing tags.
pub fn parse_elements(input: &str) -> Result<Vec<XmlElement>, XmlError> {
    let mut cursor = Cursor { input, pos: 0 };
    let mut elements = Vec::new();

    loop {
        cursor.skip_whitespace();
        if cursor.at_end() {
            break;
        }
        elements.push(cursor.parse_element()?);
    }

    Ok(elements)
}

// ── Scanner internals ─────────────────────────────────────────────────────────

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), XmlError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(XmlError::Expected {
                expected: byte as char,
                at: self.pos,
            })
        }
    }

    /// Reads a tag or attribute name (`[A-Za-z0-9_:-]+`).
    fn read_name(&mut self) -> Result<String, XmlError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(XmlError::InvalidName { at: start });
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Reads a quoted attribute value; both quote styles are accepted.
    fn read_quoted(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => {
                return Err(XmlError::Expected {
                    expected: '"',
                    at: self.pos,
                })
            }
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == quote {
                let value = self.input[start..self.pos].to_string();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(XmlError::UnexpectedEnd {
            context: "attribute value",
        })
    }

    /// Reads raw character data up to the next `<` (or end of input).
    fn read_text(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'<' {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn parse_element(&mut self) -> Result<XmlElement, XmlError> {
        self.expect(b'<')?;
        let name = self.read_name()?;

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'/') => {
                    // Self-closing: `<thread .../>`
                    self.pos += 1;
                    self.expect(b'>')?;
                    return Ok(XmlElement {
                        name,
                        attributes,
                        text: String::new(),
                        children: Vec::new(),
                    });
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let attr_name = self.read_name()?;
                    self.skip_whitespace();
                    self.expect(b'=')?;
                    self.skip_whitespace();
                    let attr_value = self.read_quoted()?;
                    attributes.push((attr_name, attr_value));
                }
                None => {
                    return Err(XmlError::UnexpectedEnd {
                        context: "attribute list",
                    })
                }
            }
        }

        // Element content: raw text interleaved with child elements, up to
        // the matching closing tag.
        let mut text = String::new();
        let mut children = Vec::new();
        loop {
            if self.starts_with("</") {
                self.pos += 2;
                let closed = self.read_name()?;
                self.skip_whitespace();
                self.expect(b'>')?;
                if closed != name {
                    return Err(XmlError::MismatchedClosingTag {
                        opened: name,
                        closed,
                    });
                }
                return Ok(XmlElement {
                    name,
                    attributes,
                    text,
                    children,
                });
            }
            match self.peek() {
                Some(b'<') => children.push(self.parse_element()?),
                Some(_) => text.push_str(self.read_text()),
                None => {
                    return Err(XmlError::UnexpectedEnd {
                        context: "element content",
                    })
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
