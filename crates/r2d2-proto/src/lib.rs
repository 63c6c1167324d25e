//! # r2d2-proto
//!
//! The slice of the IRC protocol an IRC client agent needs: an owned
//! [`Message`] model with a prefix and a small [`Command`] vocabulary,
//! parsing and serialization, and tokio codecs for framed connections.
//!
//! ```rust
//! use r2d2_proto::{Command, Message};
//!
//! let msg: Message = ":alice!a@host PRIVMSG #rust :r2d2: fly".parse().unwrap();
//! assert_eq!(msg.source_nickname(), Some("alice"));
//! assert!(matches!(msg.command, Command::PRIVMSG(_, _)));
//!
//! let reply = Message::privmsg("#rust", "alice: hello");
//! assert_eq!(reply.to_string(), "PRIVMSG #rust :alice: hello\r\n");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod chan;
pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod prefix;

pub use self::chan::ChannelExt;
pub use self::command::Command;
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::IrcCodec;
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::prefix::Prefix;

/// Maximum IRC line length in bytes, including the trailing CRLF.
pub const MAX_IRC_LINE_LEN: usize = 512;

/// RPL_WELCOME, sent by the server once registration is complete.
pub const RPL_WELCOME: u16 = 1;
