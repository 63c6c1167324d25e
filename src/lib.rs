//! r2d2 - an IRC channel agent.
//!
//! The agent keeps one registered connection to an IRC network, answers
//! requests addressed to its nick, and relays notifications from background
//! feeds into its channels.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod http;
pub mod network;
pub mod publish;
pub mod session;
pub mod transmit;
