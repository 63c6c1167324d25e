//! Untappd check-ins of followed users.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Notification, Poll, Provider, WatcherCursor};
use crate::config::UntappdConfig;
use crate::error::ProviderError;
use crate::http;

/// How many recent check-ins are requested per user.
const CHECKIN_LIMIT: &str = "10";

pub struct UntappdCheckins {
    client: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    users: Vec<String>,
    debug: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: CheckinsResponse,
}

#[derive(Debug, Deserialize)]
struct CheckinsResponse {
    checkins: Checkins,
}

#[derive(Debug, Deserialize)]
struct Checkins {
    #[serde(default)]
    items: Vec<Checkin>,
}

#[derive(Debug, Deserialize)]
struct Checkin {
    checkin_id: u64,
    #[serde(default)]
    checkin_comment: String,
    #[serde(default)]
    rating_score: f64,
    beer: Beer,
    brewery: Brewery,
    /// An object, or an empty array when there is no venue.
    #[serde(default)]
    venue: Value,
}

#[derive(Debug, Deserialize)]
struct Beer {
    beer_name: String,
    #[serde(default)]
    beer_style: String,
}

#[derive(Debug, Deserialize)]
struct Brewery {
    brewery_name: String,
}

fn format_checkin(user: &str, checkin: &Checkin) -> String {
    let beer = &checkin.beer;
    let mut line = if beer.beer_style.is_empty() {
        format!("{user} is drinking {}", beer.beer_name)
    } else {
        format!("{user} is drinking {} ({})", beer.beer_name, beer.beer_style)
    };
    line.push_str(&format!(" by {}", checkin.brewery.brewery_name));

    if let Some(venue) = checkin
        .venue
        .get("venue_name")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
    {
        line.push_str(&format!(" at {venue}"));
    }
    if checkin.rating_score > 0.0 {
        line.push_str(&format!(", rated {}/5", checkin.rating_score));
    }
    let comment = checkin.checkin_comment.trim();
    if !comment.is_empty() {
        line.push_str(&format!(": \"{comment}\""));
    }
    line
}

fn checkins_url(api_base: &str, user: &str) -> String {
    format!("{api_base}/user/checkins/{}", urlencoding::encode(user))
}

impl UntappdCheckins {
    pub fn new(client: reqwest::Client, config: &UntappdConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            users: config.users.clone(),
            debug: config.debug,
        }
    }

    async fn fetch(&self, user: &str) -> Result<Vec<Checkin>, ProviderError> {
        let request = self
            .client
            .get(checkins_url(&self.api_base, user))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("limit", CHECKIN_LIMIT),
            ]);
        let envelope: Envelope = http::get_json(request).await?;
        Ok(envelope.response.checkins.items)
    }
}

#[async_trait]
impl Provider for UntappdCheckins {
    fn name(&self) -> &'static str {
        "untappd"
    }

    async fn poll(&mut self, _cursor: &WatcherCursor) -> Result<Poll, ProviderError> {
        let mut poll = Poll::default();
        let mut last_error = None;

        for user in &self.users {
            match self.fetch(user).await {
                Ok(checkins) => {
                    poll.reached.push(user.clone());
                    for checkin in &checkins {
                        if self.debug {
                            debug!(user = %user, id = checkin.checkin_id, "check-in");
                        }
                        poll.items.push(Notification {
                            entity: user.clone(),
                            id: checkin.checkin_id,
                            text: Some(format_checkin(user, checkin)),
                        });
                    }
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "could not fetch check-ins");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if poll.reached.is_empty() => Err(e),
            _ => Ok(poll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKINS: &str = r#"{
      "meta": {"code": 200},
      "response": {
        "checkins": {
          "count": 2,
          "items": [
            {
              "checkin_id": 1200,
              "checkin_comment": " Tastes like Bantha milk ",
              "rating_score": 3.75,
              "user": {"user_name": "luke"},
              "beer": {"beer_name": "Blue Milk Stout", "beer_style": "Stout - Milk"},
              "brewery": {"brewery_name": "Lars Homestead"},
              "venue": {"venue_name": "Mos Eisley Cantina"}
            },
            {
              "checkin_id": 1100,
              "checkin_comment": "",
              "rating_score": 0,
              "user": {"user_name": "luke"},
              "beer": {"beer_name": "Hoth Lager", "beer_style": ""},
              "brewery": {"brewery_name": "Echo Base"},
              "venue": []
            }
          ]
        }
      }
    }"#;

    #[test]
    fn test_checkin_formatting() {
        let envelope: Envelope = serde_json::from_str(CHECKINS).unwrap();
        let items = envelope.response.checkins.items;
        assert_eq!(items[0].checkin_id, 1200);
        assert_eq!(
            format_checkin("luke", &items[0]),
            "luke is drinking Blue Milk Stout (Stout - Milk) by Lars Homestead at Mos Eisley Cantina, rated 3.75/5: \"Tastes like Bantha milk\""
        );
        assert_eq!(
            format_checkin("luke", &items[1]),
            "luke is drinking Hoth Lager by Echo Base"
        );
    }

    #[test]
    fn test_user_is_escaped_in_path() {
        assert_eq!(
            checkins_url("https://api.untappd.com/v4", "luke"),
            "https://api.untappd.com/v4/user/checkins/luke"
        );
        assert_eq!(
            checkins_url("https://api.untappd.com/v4", "../admin?x=1"),
            "https://api.untappd.com/v4/user/checkins/..%2Fadmin%3Fx%3D1"
        );
    }

    #[test]
    fn test_empty_feed() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"response": {"checkins": {"count": 0}}}"#).unwrap();
        assert!(envelope.response.checkins.items.is_empty());
    }

    #[tokio::test]
    async fn test_no_users_is_an_empty_poll() {
        let config = UntappdConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            users: Vec::new(),
            channel: None,
            channel_key: None,
            interval_secs: 300,
            api_base: "http://127.0.0.1:1".into(),
            debug: false,
        };
        let mut provider = UntappdCheckins::new(reqwest::Client::new(), &config);
        assert!(provider.poll(&WatcherCursor::new()).await.unwrap().items.is_empty());
    }
}
