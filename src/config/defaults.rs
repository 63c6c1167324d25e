//! Default value functions for configuration.

// =============================================================================
// IRC Defaults
// =============================================================================

pub fn default_auth_service() -> String {
    "NickServ".to_string()
}

pub fn default_realname() -> String {
    "r2d2 - beep beedibeep dibeep".to_string()
}

/// Keepalive PING cadence, in seconds.
pub fn default_ping_interval() -> u64 {
    10
}

/// Silence (no inbound traffic) tolerated before the link is declared dead.
pub fn default_timeout() -> u64 {
    300
}

pub fn default_registration_timeout() -> u64 {
    30
}

pub fn default_handler_timeout() -> u64 {
    20
}

// =============================================================================
// Publisher Defaults
// =============================================================================

pub fn default_github_interval() -> u64 {
    60
}

pub fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

pub fn default_untappd_interval() -> u64 {
    300
}

pub fn default_untappd_api() -> String {
    "https://api.untappd.com/v4".to_string()
}

pub fn default_titles_interval() -> u64 {
    2
}

pub fn default_titles_max_bytes() -> usize {
    64 * 1024
}

pub fn default_true() -> bool {
    true
}

// =============================================================================
// Lookup Defaults
// =============================================================================

pub fn default_geolocation_endpoint() -> String {
    "https://ipinfo.io/{ip}/json".to_string()
}

pub fn default_weather_endpoint() -> String {
    "https://wttr.in/{location}?format=3".to_string()
}
