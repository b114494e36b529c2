//! STOMP 1.2 frame codec.
//!
//! Frames travel as text over the socket:
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! A lone EOL between frames is a server heart-beat and decodes to nothing.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;
use crate::protocol::HEADER_CONTENT_LENGTH;

const NUL: char = '\0';

/// STOMP frame commands understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT and CONNECTED frames carry raw header values (STOMP 1.2 §Value Encoding).
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        })
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are legal; the first one wins on lookup.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header (builder style).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the frame body (builder style).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Encode the frame for the wire, NUL terminator included.
    ///
    /// A `content-length` header is added for non-empty bodies unless the
    /// caller already set one.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');

        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }

        if !self.body.is_empty() && self.get(HEADER_CONTENT_LENGTH).is_none() {
            out.push_str(HEADER_CONTENT_LENGTH);
            out.push(':');
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Decode exactly one frame. Heart-beats and trailing EOLs are rejected.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.push(text).into_iter().collect::<Result<Vec<_>, _>>()?;
        if decoder.has_partial() {
            return Err(FrameError::Incomplete);
        }
        match frames.len() {
            1 => Ok(frames.remove(0)),
            0 => Err(FrameError::Incomplete),
            n => Err(FrameError::TooManyFrames(n)),
        }
    }
}

/// Largest frame the decoder buffers, headers included.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Incremental decoder: frames may be split across, or packed into, socket messages.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    max_frame_len: usize,
    /// Dropping the remainder of a rejected frame, up to its NUL
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: String::new(),
            max_frame_len,
            discarding: false,
        }
    }

    /// True when buffered bytes do not yet form a complete frame.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || self.discarding
    }

    /// Drop any partially received frame (used when the socket is replaced).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Feed socket text and return every frame it completes, in order.
    ///
    /// A malformed frame yields one `Err` and is skipped up to its NUL
    /// terminator; frames before and after it still decode.
    pub fn push(&mut self, text: &str) -> Vec<Result<Frame, FrameError>> {
        self.buffer.push_str(text);
        let mut results = Vec::new();

        loop {
            if self.discarding {
                match self.buffer.find(NUL) {
                    Some(idx) => {
                        self.buffer.drain(..=idx);
                        self.discarding = false;
                    }
                    None => {
                        self.buffer.clear();
                        break;
                    }
                }
            }

            // Heart-beats (and the optional EOLs after a NUL) carry no frame.
            let trimmed = self.buffer.trim_start_matches(['\n', '\r']);
            if trimmed.len() != self.buffer.len() {
                self.buffer = trimmed.to_string();
            }
            if self.buffer.is_empty() {
                break;
            }

            match decode_one(&self.buffer, self.max_frame_len) {
                Ok(Some((frame, consumed))) => {
                    self.buffer.drain(..consumed);
                    results.push(Ok(frame));
                }
                Ok(None) if self.buffer.len() > self.max_frame_len => {
                    results.push(Err(FrameError::FrameTooLarge(self.max_frame_len)));
                    self.discarding = true;
                }
                Ok(None) => break,
                Err(e) => {
                    results.push(Err(e));
                    self.discarding = true;
                }
            }
        }

        results
    }
}

/// Decode the frame at the start of `input`.
///
/// Returns `Ok(None)` when more input is needed, otherwise the frame and the
/// number of bytes it occupied (NUL included).
fn decode_one(input: &str, max_frame_len: usize) -> Result<Option<(Frame, usize)>, FrameError> {
    let Some(head_end) = find_head_end(input) else {
        return Ok(None);
    };
    let (head, body_start) = head_end;
    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let command_line = lines.next().unwrap_or_default();
    let command: Command = command_line.parse()?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(FrameError::MalformedHeader(line.to_string()));
        };
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let rest = &input[body_start..];
    let content_length = headers
        .iter()
        .find(|(k, _)| k == HEADER_CONTENT_LENGTH)
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(v.clone()))
        })
        .transpose()?;

    let (body, consumed_after_head) = match content_length {
        Some(len) if len > max_frame_len => return Err(FrameError::FrameTooLarge(max_frame_len)),
        Some(len) => {
            let needed = len
                .checked_add(1)
                .ok_or_else(|| FrameError::InvalidContentLength(len.to_string()))?;
            if rest.len() < needed {
                return Ok(None);
            }
            if !rest.is_char_boundary(len) {
                return Err(FrameError::InvalidContentLength(len.to_string()));
            }
            if !rest[len..].starts_with(NUL) {
                return Err(FrameError::MissingTerminator);
            }
            (rest[..len].to_string(), len + 1)
        }
        None => match rest.find(NUL) {
            Some(idx) => (rest[..idx].to_string(), idx + 1),
            None => return Ok(None),
        },
    };

    Ok(Some((
        Frame {
            command,
            headers,
            body,
        },
        body_start + consumed_after_head,
    )))
}

/// Locate the blank line that ends the header block.
///
/// Returns the header text and the byte offset where the body begins.
fn find_head_end(input: &str) -> Option<(&str, usize)> {
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if !line.ends_with('\n') {
            return None;
        }
        let content = line.trim_end_matches('\n').trim_end_matches('\r');
        if content.is_empty() && offset > 0 {
            return Some((&input[..offset], offset + line.len()));
        }
        offset += line.len();
    }
    None
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(FrameError::InvalidEscape(format!(
                    "\\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
