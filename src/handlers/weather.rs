//! `weather <location>`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::Handler;
use crate::error::ProviderError;
use crate::http;

pub const WEATHER_HELP: &str = "weather <location>: current conditions for a city, airport code or landmark, e.g. 'weather Paris' or 'weather SFO'";

/// Produces a one-line forecast for a free-form location.
#[async_trait]
pub trait Forecaster: Send + Sync {
    async fn forecast(&self, location: &str) -> Result<String, ProviderError>;
}

/// wttr.in-style plain text endpoint. `{location}` in the endpoint is
/// replaced.
pub struct Wttr {
    client: reqwest::Client,
    endpoint: String,
}

impl Wttr {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    fn url_for(&self, location: &str) -> String {
        self.endpoint
            .replace("{location}", &urlencoding::encode(location.trim()))
    }
}

#[async_trait]
impl Forecaster for Wttr {
    async fn forecast(&self, location: &str) -> Result<String, ProviderError> {
        let body = http::get_text(self.client.get(self.url_for(location))).await?;
        let line = body.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return Err(ProviderError::Other(format!("empty forecast for {location}")));
        }
        Ok(line.to_string())
    }
}

pub struct WeatherHandler {
    forecaster: Arc<dyn Forecaster>,
}

impl WeatherHandler {
    pub fn new(forecaster: Arc<dyn Forecaster>) -> Self {
        Self { forecaster }
    }
}

#[async_trait]
impl Handler for WeatherHandler {
    async fn handle(&self, args: &[String]) -> String {
        if args.is_empty() {
            return WEATHER_HELP.to_string();
        }
        let location = args.join(" ");
        match self.forecaster.forecast(&location).await {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!(location = %location, error = %e, "forecast failed");
                format!("sorry, I could not get a forecast for {location}")
            }
        }
    }

    fn help(&self) -> Option<&'static str> {
        Some(WEATHER_HELP)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, registry};
    use super::*;

    #[tokio::test]
    async fn test_weather_joins_location_tokens() {
        assert_eq!(
            registry().handle("weather", &args("Mos Eisley")).await,
            "Mos Eisley: twin suns, +45°C"
        );
    }

    #[tokio::test]
    async fn test_weather_without_location_is_help() {
        assert_eq!(registry().handle("weather", &[]).await, WEATHER_HELP);
    }

    #[tokio::test]
    async fn test_weather_failure_is_apology() {
        assert_eq!(
            registry().handle("weather", &args("Alderaan")).await,
            "sorry, I could not get a forecast for Alderaan"
        );
    }

    #[test]
    fn test_url_for_location() {
        let wttr = Wttr::new(reqwest::Client::new(), "https://wttr.in/{location}?format=3");
        assert_eq!(
            wttr.url_for(" New York "),
            "https://wttr.in/New%20York?format=3"
        );
        assert_eq!(
            wttr.url_for("a/b?c#d&e"),
            "https://wttr.in/a%2Fb%3Fc%23d%26e?format=3"
        );
        assert_eq!(wttr.url_for("a%2Fb"), "https://wttr.in/a%252Fb?format=3");
        assert_eq!(wttr.url_for("Zürich"), "https://wttr.in/Z%C3%BCrich?format=3");
    }
}
