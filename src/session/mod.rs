//! Session lifecycle.
//!
//! [`SessionManager::start`] takes the agent from nothing to a joined,
//! identified session: connect and register, identify with the nickname
//! service when a secret is configured, join channels, optionally greet.
//! Connection failures are fatal; identification only delays readiness.

pub mod auth;

use parking_lot::RwLock;
use r2d2_proto::Message;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{SessionError, TransportError};
use crate::network::{self, Connection, EventBus, Outbound};
use auth::Handshake;

/// Sent to the channel after joining when debug is on.
pub const DEBUG_GREETING: &str = "beep beedibeep dibeep";

/// Where the session is in its lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthState {
    Disconnected,
    Connecting,
    Authenticating,
    Joined,
}

/// Drives one session from connect to joined.
pub struct SessionManager {
    config: Arc<Config>,
    state: Arc<RwLock<AuthState>>,
}

impl SessionManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(AuthState::Disconnected)),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    fn advance(&self, next: AuthState) {
        let mut state = self.state.write();
        if next > *state {
            info!(from = ?*state, to = ?next, "session state");
            *state = next;
        } else {
            warn!(current = ?*state, requested = ?next, "ignoring backwards state change");
        }
    }

    /// Bring the session up. Returns once every channel has been joined.
    pub async fn start(self) -> Result<Session, SessionError> {
        let irc = &self.config.irc;

        self.advance(AuthState::Connecting);
        let connection = network::connect(irc).await?;

        if let Some(secret) = irc.nick_secret() {
            self.advance(AuthState::Authenticating);
            let mut handshake = Handshake::new(&irc.auth_service, secret)?;
            handshake
                .run(connection.outbound(), connection.events())
                .await?;
        }

        for (channel, key) in self.config.channels_to_join() {
            info!(channel = %channel, keyed = key.is_some(), "Joining");
            connection.outbound().send(Message::join(channel, key)).await?;
        }
        self.advance(AuthState::Joined);

        if irc.debug {
            connection
                .outbound()
                .send(Message::privmsg(irc.channel.clone(), DEBUG_GREETING))
                .await?;
        }

        info!(nick = %irc.nick, channel = %irc.channel, "Session ready");
        Ok(Session {
            nick: irc.nick.clone(),
            channel: irc.channel.clone(),
            channel_key: irc.channel_key.clone(),
            state: self.state,
            connection,
        })
    }
}

/// The single joined session.
pub struct Session {
    nick: String,
    channel: String,
    channel_key: Option<String>,
    state: Arc<RwLock<AuthState>>,
    connection: Connection,
}

impl Session {
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Default channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn channel_key(&self) -> Option<&str> {
        self.channel_key.as_deref()
    }

    pub fn state(&self) -> AuthState {
        *self.state.read()
    }

    pub fn outbound(&self) -> &Outbound {
        self.connection.outbound()
    }

    pub fn events(&self) -> &EventBus {
        self.connection.events()
    }

    /// Wait for the connection to fail.
    pub async fn closed(&mut self) -> TransportError {
        self.connection.closed().await
    }

    /// Leave the network with `QUIT`.
    pub async fn shutdown(self, reason: &str) {
        info!(reason, "Quitting");
        self.connection.shutdown(reason).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        let config = Config::parse(
            r##"
            [irc]
            server = "127.0.0.1:6667"
            nick = "r2d2"
            channel = "#rebels"
            "##,
        )
        .unwrap();
        SessionManager::new(Arc::new(config))
    }

    #[test]
    fn test_state_only_moves_forward() {
        let manager = manager();
        assert_eq!(manager.state(), AuthState::Disconnected);
        manager.advance(AuthState::Connecting);
        manager.advance(AuthState::Joined);
        manager.advance(AuthState::Authenticating);
        assert_eq!(manager.state(), AuthState::Joined);
    }

    #[tokio::test]
    async fn test_start_fails_when_server_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = Config::parse(&format!(
            "[irc]\nserver = \"{addr}\"\nnick = \"r2d2\"\nchannel = \"#rebels\"\n"
        ))
        .unwrap();
        config.irc.registration_timeout_secs = 1;
        let result = SessionManager::new(Arc::new(config)).start().await;
        assert!(matches!(
            result,
            Err(SessionError::Transport(TransportError::Connect { .. }))
        ));
    }
}
