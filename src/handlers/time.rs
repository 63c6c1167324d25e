//! `time [zone]`.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use super::Handler;

pub const TIME_HELP: &str = "time [zone]: the current time here, or in an IANA time zone such as Europe/Paris or America/New_York";

const TIME_FORMAT: &str = "%H:%M:%S %Z";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Render `now` in `zone`; an empty zone means the host's local time.
pub fn time_in(now: DateTime<Utc>, zone: &str) -> String {
    if zone.is_empty() {
        return format!("it is {} here", now.with_timezone(&Local).format("%H:%M:%S %:z"));
    }
    match zone.parse::<Tz>() {
        Ok(tz) => format!(
            "it is {} in {}",
            now.with_timezone(&tz).format(TIME_FORMAT),
            tz.name()
        ),
        Err(_) => format!("I do not know the time zone {zone}, try something like Europe/Paris"),
    }
}

pub struct TimeHandler {
    clock: Arc<dyn Clock>,
}

impl TimeHandler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Handler for TimeHandler {
    async fn handle(&self, args: &[String]) -> String {
        let zone = args.first().map(String::as_str).unwrap_or("");
        time_in(self.clock.now(), zone)
    }

    fn help(&self) -> Option<&'static str> {
        Some(TIME_HELP)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{args, registry};
    use super::*;

    #[tokio::test]
    async fn test_time_in_named_zone() {
        let registry = registry();
        assert_eq!(
            registry.handle("time", &args("Asia/Tokyo")).await,
            "it is 21:00:00 JST in Asia/Tokyo"
        );
        assert_eq!(
            registry.handle("time", &args("UTC")).await,
            "it is 12:00:00 UTC in UTC"
        );
    }

    #[tokio::test]
    async fn test_time_without_zone_is_local() {
        let answer = registry().handle("time", &[]).await;
        assert!(answer.starts_with("it is "));
        assert!(answer.ends_with(" here"));
    }

    #[tokio::test]
    async fn test_unknown_zone() {
        assert_eq!(
            registry().handle("time", &args("Tatooine/Anchorhead")).await,
            "I do not know the time zone Tatooine/Anchorhead, try something like Europe/Paris"
        );
    }
}
