//! Shared wire formats for the Hearth real-time transport.

pub mod error;
pub mod frame;
pub mod models;
pub mod protocol;
pub mod sockjs;
pub mod topics;

pub use error::*;
pub use frame::{Command, Frame, FrameDecoder};
pub use models::*;
pub use protocol::*;
pub use sockjs::{SockJsInfo, SockJsMessage};
pub use topics::*;
