//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_auth_service, default_geolocation_endpoint, default_github_api,
    default_github_interval, default_handler_timeout, default_ping_interval, default_realname,
    default_registration_timeout, default_timeout, default_titles_interval,
    default_titles_max_bytes, default_true, default_untappd_api, default_untappd_interval,
    default_weather_endpoint,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Agent configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Connection, identity and channel.
    pub irc: IrcConfig,
    /// GitHub repository event feed. Absent means the feed is off.
    pub github: Option<GithubConfig>,
    /// Untappd check-in feed. Absent means the feed is off.
    pub untappd: Option<UntappdConfig>,
    /// Page title announcements for links posted in the channel.
    #[serde(default)]
    pub titles: TitlesConfig,
    /// Lookup backend for the `ip` command.
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    /// Lookup backend for the `weather` command.
    #[serde(default)]
    pub weather: WeatherConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Every channel the agent must sit in, with its key, main channel first.
    ///
    /// Feed channels that repeat the main channel are not listed twice.
    pub fn channels_to_join(&self) -> Vec<(String, Option<String>)> {
        let mut channels = vec![(self.irc.channel.clone(), non_empty(&self.irc.channel_key))];

        let feeds = [
            self.github
                .as_ref()
                .and_then(|g| g.channel.as_ref().map(|c| (c, &g.channel_key))),
            self.untappd
                .as_ref()
                .and_then(|u| u.channel.as_ref().map(|c| (c, &u.channel_key))),
            self.titles.channel.as_ref().map(|c| (c, &None)),
        ];

        for (channel, key) in feeds.into_iter().flatten() {
            if !channels.iter().any(|(c, _)| c == channel) {
                channels.push((channel.clone(), non_empty(key)));
            }
        }

        channels
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// IRC connection and session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    /// Server address as `host:port`.
    pub server: String,
    /// Wrap the connection in TLS.
    #[serde(default)]
    pub tls: bool,
    /// Nickname; also the address the agent answers to.
    pub nick: String,
    /// Password sent to the nickname service. Empty or absent skips
    /// authentication.
    pub nick_password: Option<String>,
    /// Default channel.
    pub channel: String,
    /// Key for the default channel.
    pub channel_key: Option<String>,
    /// Verbose logging and a greeting on join.
    #[serde(default)]
    pub debug: bool,
    /// Nick of the authentication service.
    #[serde(default = "default_auth_service")]
    pub auth_service: String,
    /// Real name sent with USER.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Seconds between keepalive PINGs.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Seconds without any inbound traffic before the link is dropped.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Seconds allowed for the server to accept NICK/USER.
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    /// Seconds a command handler may take before the user gets a timeout
    /// reply.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
}

impl IrcConfig {
    /// The configured nick secret, if authentication is enabled.
    pub fn nick_secret(&self) -> Option<&str> {
        self.nick_password.as_deref().filter(|p| !p.is_empty())
    }

    /// Host part of [`IrcConfig::server`], used for TLS server name checks.
    /// IPv6 literals come back without brackets.
    pub fn host(&self) -> &str {
        let server = self.server.as_str();
        if let Some(rest) = server.strip_prefix('[') {
            return rest.split_once(']').map_or(rest, |(host, _)| host);
        }
        // A bare IPv6 literal has no room for a port.
        if server.matches(':').count() > 1 {
            return server;
        }
        match server.rsplit_once(':') {
            Some((host, port)) if port.parse::<u16>().is_ok() => host,
            _ => server,
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

/// GitHub feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// API token; unauthenticated requests are heavily rate limited.
    pub token: Option<String>,
    /// Repositories to follow, as `owner/name`.
    #[serde(default)]
    pub repos: Vec<String>,
    /// Channel for announcements (defaults to the main channel).
    pub channel: Option<String>,
    pub channel_key: Option<String>,
    #[serde(default = "default_github_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    /// Log every fetched event.
    #[serde(default)]
    pub debug: bool,
}

/// Untappd feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UntappdConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Users to follow.
    #[serde(default)]
    pub users: Vec<String>,
    /// Channel for announcements (defaults to the main channel).
    pub channel: Option<String>,
    pub channel_key: Option<String>,
    #[serde(default = "default_untappd_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_untappd_api")]
    pub api_base: String,
    #[serde(default)]
    pub debug: bool,
}

/// Page title announcements.
#[derive(Debug, Clone, Deserialize)]
pub struct TitlesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channel to watch and announce in (defaults to the main channel).
    pub channel: Option<String>,
    #[serde(default = "default_titles_interval")]
    pub interval_secs: u64,
    /// Upper bound on how much of a page is read while looking for a title.
    #[serde(default = "default_titles_max_bytes")]
    pub max_bytes: usize,
}

impl Default for TitlesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel: None,
            interval_secs: default_titles_interval(),
            max_bytes: default_titles_max_bytes(),
        }
    }
}

/// Geolocation lookups. `{ip}` in the endpoint is replaced by the address.
#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_geolocation_endpoint")]
    pub endpoint: String,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geolocation_endpoint(),
        }
    }
}

/// Weather lookups. `{location}` in the endpoint is replaced by the query.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_weather_endpoint(),
        }
    }
}
