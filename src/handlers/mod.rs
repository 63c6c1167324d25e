//! Command handlers.
//!
//! A request's first token selects a [`Handler`]; the rest are its
//! arguments. `help` is answered by the [`Registry`] itself from the help
//! text each handler registers. Handlers always produce a reply: lookups
//! that fail answer with an apology, never with error details.

mod fun;
mod github;
mod ip;
mod stardate;
mod time;
mod untappd;
mod weather;

pub use fun::{FLIP_PREFIX, FLY_TEXT, FlipHandler, FlyHandler};
pub use github::{GITHUB_HELP, GITHUB_USAGE, GithubHandler};
pub use ip::{GEOLOCATION_HELP, Geolocator, IP_USAGE, IpHandler, IpInfo};
pub use stardate::{StardateHandler, stardate};
pub use time::{Clock, SystemClock, TIME_HELP, TimeHandler};
pub use untappd::{UNTAPPD_HELP, UNTAPPD_USAGE, UntappdHandler};
pub use weather::{Forecaster, WEATHER_HELP, WeatherHandler, Wttr};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;

/// Reply for anything that is not a known command.
pub const UNKNOWN_COMMAND: &str = "I do not know how to answer this...";

/// Reply to a bare `help`.
pub const HELP_SUMMARY: &str = "try 'help <command>', supported commands are: time, github, fly, flip, stardate, untappd and weather";

/// A command the agent answers.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Answer with the argument tokens that followed the command.
    async fn handle(&self, args: &[String]) -> String;

    /// Text for `help <command>`, if the command has any.
    fn help(&self) -> Option<&'static str> {
        None
    }
}

/// A list of tracked names, rendered for chat.
pub trait Directory: Send + Sync {
    fn describe(&self) -> String;
}

/// A fixed list read from configuration.
pub struct TrackedList {
    items: Vec<String>,
    intro: &'static str,
    empty: &'static str,
}

impl TrackedList {
    pub fn new(items: Vec<String>, intro: &'static str, empty: &'static str) -> Self {
        Self { items, intro, empty }
    }

    pub fn repositories(repos: Vec<String>) -> Self {
        Self::new(repos, "I am watching", "I am not watching any repository")
    }

    pub fn users(users: Vec<String>) -> Self {
        Self::new(users, "I am following", "I am not following anyone")
    }
}

impl Directory for TrackedList {
    fn describe(&self) -> String {
        if self.items.is_empty() {
            self.empty.to_string()
        } else {
            format!("{}: {}", self.intro, self.items.join(", "))
        }
    }
}

/// Everything the handlers consult outside the process.
#[derive(Clone)]
pub struct Collaborators {
    pub repos: Arc<dyn Directory>,
    pub untappd_users: Arc<dyn Directory>,
    pub clock: Arc<dyn Clock>,
    pub geolocator: Arc<dyn Geolocator>,
    pub forecaster: Arc<dyn Forecaster>,
}

impl Collaborators {
    /// The real backends, as configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let repos = config
            .github
            .as_ref()
            .map(|g| g.repos.clone())
            .unwrap_or_default();
        let users = config
            .untappd
            .as_ref()
            .map(|u| u.users.clone())
            .unwrap_or_default();

        Self {
            repos: Arc::new(TrackedList::repositories(repos)),
            untappd_users: Arc::new(TrackedList::users(users)),
            clock: Arc::new(SystemClock),
            geolocator: Arc::new(IpInfo::new(client.clone(), &config.geolocation.endpoint)),
            forecaster: Arc::new(Wttr::new(client, &config.weather.endpoint)),
        }
    }
}

/// Registry of command handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// Create a registry with every command registered.
    pub fn new(collaborators: Collaborators) -> Self {
        let mut registry = Self::empty();

        registry.register("fly", FlyHandler);
        registry.register("flip", FlipHandler);
        registry.register("github", GithubHandler::new(collaborators.repos));
        registry.register("untappd", UntappdHandler::new(collaborators.untappd_users));
        registry.register("ip", IpHandler::new(collaborators.geolocator));
        registry.register("time", TimeHandler::new(Arc::clone(&collaborators.clock)));
        registry.register("stardate", StardateHandler::new(collaborators.clock));
        registry.register("weather", WeatherHandler::new(collaborators.forecaster));

        registry
    }

    /// Create a registry with no commands.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, handler: impl Handler + 'static) {
        self.handlers.insert(name, Box::new(handler));
    }

    /// Answer one command. Matching is exact.
    pub async fn handle(&self, command: &str, args: &[String]) -> String {
        if command == "help" {
            return match args.first() {
                Some(topic) => self.help_for(topic),
                None => HELP_SUMMARY.to_string(),
            };
        }
        match self.handlers.get(command) {
            Some(handler) => handler.handle(args).await,
            None => UNKNOWN_COMMAND.to_string(),
        }
    }

    /// The registered help text for `command`.
    pub fn help_for(&self, command: &str) -> String {
        self.handlers
            .get(command)
            .and_then(|handler| handler.help())
            .map(str::to_string)
            .unwrap_or_else(|| format!("there is no help for {command}"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes for the outside collaborators.

    use super::*;
    use crate::error::ProviderError;
    use chrono::{DateTime, TimeZone, Utc};
    use std::net::IpAddr;

    pub struct FixedList(pub &'static str);

    impl Directory for FixedList {
        fn describe(&self) -> String {
            self.0.to_string()
        }
    }

    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    pub struct FakeGeo;

    #[async_trait]
    impl Geolocator for FakeGeo {
        async fn locate(&self, ip: IpAddr) -> Result<String, ProviderError> {
            if ip.is_loopback() {
                Err(ProviderError::Other("no data".into()))
            } else {
                Ok(format!("{ip} is in Mos Eisley, Tatooine"))
            }
        }
    }

    pub struct FakeWeather;

    #[async_trait]
    impl Forecaster for FakeWeather {
        async fn forecast(&self, location: &str) -> Result<String, ProviderError> {
            if location == "Alderaan" {
                Err(ProviderError::Other("gone".into()))
            } else {
                Ok(format!("{location}: twin suns, +45°C"))
            }
        }
    }

    pub fn collaborators() -> Collaborators {
        Collaborators {
            repos: Arc::new(FixedList("I am watching: rebels/x-wing")),
            untappd_users: Arc::new(FixedList("I am following: chewie")),
            clock: Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2323, 7, 2, 12, 0, 0).single().unwrap(),
            )),
            geolocator: Arc::new(FakeGeo),
            forecaster: Arc::new(FakeWeather),
        }
    }

    pub fn registry() -> Registry {
        Registry::new(collaborators())
    }

    pub fn args(line: &str) -> Vec<String> {
        line.split(' ').map(str::to_string).collect()
    }
}
