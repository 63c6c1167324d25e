//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use r2d2_proto::ChannelExt;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("irc.server is required")]
    MissingServer,
    #[error("irc.nick is required")]
    MissingNick,
    #[error("irc.nick must not contain spaces or colons, got '{0}'")]
    InvalidNick(String),
    #[error("irc.channel is required")]
    MissingChannel,
    #[error("{section}.channel is not a channel name: '{channel}'")]
    InvalidChannel {
        section: &'static str,
        channel: String,
    },
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("{section}.{field} must contain a '{placeholder}' placeholder")]
    MissingPlaceholder {
        section: &'static str,
        field: &'static str,
        placeholder: &'static str,
    },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let irc = &config.irc;

    // Required fields
    if irc.server.trim().is_empty() {
        errors.push(ValidationError::MissingServer);
    }
    if irc.nick.is_empty() {
        errors.push(ValidationError::MissingNick);
    } else if irc.nick.contains([' ', ':']) {
        errors.push(ValidationError::InvalidNick(irc.nick.clone()));
    }
    if irc.channel.is_empty() {
        errors.push(ValidationError::MissingChannel);
    } else {
        check_channel(&mut errors, "irc", &irc.channel);
    }

    for (name, secs) in [
        ("irc.ping_interval_secs", irc.ping_interval_secs),
        ("irc.timeout_secs", irc.timeout_secs),
        ("irc.registration_timeout_secs", irc.registration_timeout_secs),
        ("irc.handler_timeout_secs", irc.handler_timeout_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroInterval(name));
        }
    }

    // Feeds
    if let Some(github) = &config.github {
        if let Some(channel) = &github.channel {
            check_channel(&mut errors, "github", channel);
        }
        if github.interval_secs == 0 {
            errors.push(ValidationError::ZeroInterval("github.interval_secs"));
        }
    }
    if let Some(untappd) = &config.untappd {
        if let Some(channel) = &untappd.channel {
            check_channel(&mut errors, "untappd", channel);
        }
        if untappd.interval_secs == 0 {
            errors.push(ValidationError::ZeroInterval("untappd.interval_secs"));
        }
    }
    if config.titles.enabled {
        if let Some(channel) = &config.titles.channel {
            check_channel(&mut errors, "titles", channel);
        }
        if config.titles.interval_secs == 0 {
            errors.push(ValidationError::ZeroInterval("titles.interval_secs"));
        }
    }

    // Lookup endpoints
    if !config.geolocation.endpoint.contains("{ip}") {
        errors.push(ValidationError::MissingPlaceholder {
            section: "geolocation",
            field: "endpoint",
            placeholder: "{ip}",
        });
    }
    if !config.weather.endpoint.contains("{location}") {
        errors.push(ValidationError::MissingPlaceholder {
            section: "weather",
            field: "endpoint",
            placeholder: "{location}",
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_channel(errors: &mut Vec<ValidationError>, section: &'static str, channel: &str) {
    if !channel.is_channel_name() {
        errors.push(ValidationError::InvalidChannel {
            section,
            channel: channel.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> String {
        r##"
            [irc]
            server = "irc.libera.chat:6697"
            tls = true
            nick = "r2d2"
            channel = "#rebels"
        "##
        .to_string()
    }

    fn parse(content: &str) -> Config {
        Config::parse(content).unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        let config = parse(&minimal_valid_config());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_required_fields_all_reported() {
        let config = parse(
            r#"
            [irc]
            server = ""
            nick = ""
            channel = ""
            "#,
        );
        let errors = validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingServer,
                ValidationError::MissingNick,
                ValidationError::MissingChannel,
            ]
        );
    }

    #[test]
    fn test_bad_channel_names_fail() {
        let content = minimal_valid_config().replace("#rebels", "rebels")
            + "\n[github]\nchannel = \"#a b\"\n";
        let errors = validate(&parse(&content)).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidChannel {
            section: "irc",
            channel: "rebels".into()
        }));
        assert!(errors.contains(&ValidationError::InvalidChannel {
            section: "github",
            channel: "#a b".into()
        }));
    }

    #[test]
    fn test_zero_interval_fails() {
        let content = minimal_valid_config() + "\n[untappd]\nclient_id = \"a\"\nclient_secret = \"b\"\ninterval_secs = 0\n";
        let errors = validate(&parse(&content)).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::ZeroInterval("untappd.interval_secs")]
        );
    }

    #[test]
    fn test_nick_with_colon_fails() {
        let content = minimal_valid_config().replace("\"r2d2\"", "\"r2:d2\"");
        let errors = validate(&parse(&content)).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidNick("r2:d2".into())]);
    }

    #[test]
    fn test_endpoint_without_placeholder_fails() {
        let content = minimal_valid_config() + "\n[weather]\nendpoint = \"https://wttr.in/\"\n";
        let errors = validate(&parse(&content)).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::MissingPlaceholder {
                section: "weather",
                ..
            }]
        ));
    }
}
