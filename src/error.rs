//! Error types for the agent.
//!
//! One enum per layer. Only [`TransportError`] and [`SessionError`] are
//! fatal; [`ProviderError`] is logged and retried on the next cycle, and is
//! never shown in a channel.

use r2d2_proto::ProtocolError;
use thiserror::Error;

// ============================================================================
// Transport Errors (connection, TLS, registration)
// ============================================================================

/// Errors raised while establishing or running the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("server did not accept registration within {0} seconds")]
    RegistrationTimeout(u64),

    #[error("server closed the link: {0}")]
    ServerError(String),

    #[error("no traffic from server for {0} seconds")]
    PingTimeout(u64),

    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Get a static error code string for log fields.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::InvalidServerName(_) => "invalid_server_name",
            Self::Tls(_) => "tls",
            Self::Protocol(_) => "protocol",
            Self::RegistrationTimeout(_) => "registration_timeout",
            Self::ServerError(_) => "server_error",
            Self::PingTimeout(_) => "ping_timeout",
            Self::Closed => "closed",
        }
    }
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors that end the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The writer task is gone, so nothing more can be sent.
    #[error("outbound queue closed")]
    OutboundClosed,

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// Provider Errors (feeds and lookups)
// ============================================================================

/// Errors from HTTP-backed feeds and lookups.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("refusing to fetch {host}: {ip} is not a public address")]
    Blocked { host: String, ip: std::net::IpAddr },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_codes() {
        assert_eq!(TransportError::Closed.error_code(), "closed");
        assert_eq!(
            TransportError::RegistrationTimeout(30).error_code(),
            "registration_timeout"
        );
    }

    #[test]
    fn test_session_error_is_transparent() {
        let err = SessionError::from(TransportError::PingTimeout(300));
        assert_eq!(err.to_string(), "no traffic from server for 300 seconds");
    }

    #[test]
    fn test_status_error_display() {
        let err = ProviderError::Status {
            status: 404,
            url: "https://api.github.com/repos/x/y/events".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected status 404 from https://api.github.com/repos/x/y/events"
        );
    }
}
