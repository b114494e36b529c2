//! Shared error types for the Hearth wire formats.

use thiserror::Error;

/// Failure to decode a STOMP frame or a SockJS envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown STOMP command `{0}`")]
    UnknownCommand(String),
    #[error("malformed header line `{0}`")]
    MalformedHeader(String),
    #[error("invalid header escape sequence `{0}`")]
    InvalidEscape(String),
    #[error("invalid content-length `{0}`")]
    InvalidContentLength(String),
    #[error("frame exceeds {0} bytes")]
    FrameTooLarge(usize),
    #[error("frame body is not NUL terminated")]
    MissingTerminator,
    #[error("incomplete frame")]
    Incomplete,
    #[error("expected one frame, found {0}")]
    TooManyFrames(usize),
    #[error("malformed SockJS message: {0}")]
    SockJs(String),
}
