//! Background publishers.
//!
//! A [`Publisher`] asks its [`Provider`] for fresh items on a fixed interval
//! and posts anything newer than its [`WatcherCursor`] to one channel. The
//! cursor keeps the highest id seen per entity (a repository, a user, a
//! channel) and never moves backwards, so nothing is announced twice.
//! Entities a provider reached but that had nothing to report are still
//! remembered, so their first item after a quiet start counts as news.
//!
//! Provider failures are logged and the next cycle runs on schedule. The
//! loop ends when the shutdown signal fires or the connection is gone.

pub mod github;
pub mod titles;
pub mod untappd;

pub use github::GithubEvents;
pub use titles::PageTitles;
pub use untappd::UntappdCheckins;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::ProviderError;
use crate::network::{EventBus, EventKind};
use crate::transmit::Transmitter;

/// One item from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// What the item belongs to; cursors are kept per entity.
    pub entity: String,
    /// Increases with every new item of the same entity.
    pub id: u64,
    /// Text to post. `None` still moves the cursor but posts nothing.
    pub text: Option<String>,
}

/// Result of one provider poll.
#[derive(Debug, Default)]
pub struct Poll {
    /// Entities whose source answered, whether or not it had items.
    pub reached: Vec<String>,
    pub items: Vec<Notification>,
}

/// A source of notifications.
#[async_trait]
pub trait Provider: Send {
    fn name(&self) -> &'static str;

    /// Fetch recent items. Order does not matter and items the cursor has
    /// already passed may be included.
    async fn poll(&mut self, cursor: &WatcherCursor) -> Result<Poll, ProviderError>;

    /// Whether the first items seen for an entity are history to skip
    /// rather than news to announce.
    fn primes_on_first_sight(&self) -> bool {
        true
    }
}

/// Highest id seen per entity. An entity can be known without an id when
/// it was primed while empty.
#[derive(Debug, Default)]
pub struct WatcherCursor {
    last: HashMap<String, Option<u64>>,
}

impl WatcherCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, entity: &str) -> Option<u64> {
        self.last.get(entity).copied().flatten()
    }

    /// Whether `entity` has been primed or advanced before.
    pub fn has_seen(&self, entity: &str) -> bool {
        self.last.contains_key(entity)
    }

    /// Whether `id` is past the cursor for `entity`.
    pub fn is_new(&self, entity: &str, id: u64) -> bool {
        self.last(entity).is_none_or(|last| id > last)
    }

    /// Remember `entity` without moving its cursor.
    pub fn prime(&mut self, entity: &str) {
        self.last.entry(entity.to_string()).or_insert(None);
    }

    /// Move the cursor forward. Older ids are ignored.
    pub fn advance(&mut self, entity: &str, id: u64) {
        let last = self.last.entry(entity.to_string()).or_insert(None);
        if last.is_none_or(|prev| id > prev) {
            *last = Some(id);
        }
    }
}

enum CycleError {
    Provider(ProviderError),
    Closed,
}

/// Polls one provider and posts what is new.
pub struct Publisher {
    provider: Box<dyn Provider>,
    transmitter: Transmitter,
    destination: String,
    interval: Duration,
    cursor: WatcherCursor,
}

impl Publisher {
    pub fn new(
        provider: impl Provider + 'static,
        transmitter: Transmitter,
        destination: &str,
        interval: Duration,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            transmitter,
            destination: destination.to_string(),
            interval,
            cursor: WatcherCursor::new(),
        }
    }

    pub fn cursor(&self) -> &WatcherCursor {
        &self.cursor
    }

    /// One poll. Returns how many notifications were posted.
    async fn cycle(&mut self) -> Result<usize, CycleError> {
        let Poll { reached, mut items } = self
            .provider
            .poll(&self.cursor)
            .await
            .map_err(CycleError::Provider)?;
        items.sort_by(|a, b| a.entity.cmp(&b.entity).then(a.id.cmp(&b.id)));

        let priming: HashSet<String> = if self.provider.primes_on_first_sight() {
            reached
                .into_iter()
                .chain(items.iter().map(|item| item.entity.clone()))
                .filter(|entity| !self.cursor.has_seen(entity))
                .collect()
        } else {
            HashSet::new()
        };

        let mut posted = 0;
        for item in items {
            if !self.cursor.is_new(&item.entity, item.id) {
                continue;
            }
            if !priming.contains(&item.entity)
                && let Some(text) = &item.text
            {
                self.transmitter
                    .notify(&self.destination, text)
                    .await
                    .map_err(|_| CycleError::Closed)?;
                posted += 1;
            }
            self.cursor.advance(&item.entity, item.id);
        }

        for entity in &priming {
            self.cursor.prime(entity);
            debug!(
                provider = self.provider.name(),
                entity = %entity,
                last = ?self.cursor.last(entity),
                "cursor primed"
            );
        }
        Ok(posted)
    }

    /// Poll until shutdown.
    #[instrument(skip_all, name = "publisher", fields(provider = self.provider.name()))]
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let name = self.provider.name();
        info!(provider = name, destination = %self.destination, interval = ?self.interval, "publisher started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }
            match self.cycle().await {
                Ok(0) => {}
                Ok(posted) => debug!(provider = name, posted, "cycle complete"),
                Err(CycleError::Provider(e)) => {
                    warn!(provider = name, error = %e, "poll failed");
                }
                Err(CycleError::Closed) => {
                    warn!(provider = name, "connection gone");
                    break;
                }
            }
        }
        info!(provider = name, "publisher stopped");
    }
}

/// Start every configured publisher. Announcements without a channel of
/// their own go to `default_channel`.
pub fn spawn_all(
    config: &Config,
    default_channel: &str,
    events: &EventBus,
    client: &reqwest::Client,
    transmitter: &Transmitter,
    shutdown: &broadcast::Sender<()>,
) -> Result<Vec<JoinHandle<()>>, ProviderError> {
    let mut publishers = Vec::new();

    if let Some(github) = &config.github {
        if github.repos.is_empty() {
            info!("github feed has no repositories, not starting");
        } else {
            publishers.push(Publisher::new(
                GithubEvents::new(client.clone(), github),
                transmitter.clone(),
                github.channel.as_deref().unwrap_or(default_channel),
                Duration::from_secs(github.interval_secs),
            ));
        }
    }

    if let Some(untappd) = &config.untappd {
        if untappd.users.is_empty() {
            info!("untappd feed has no users, not starting");
        } else {
            publishers.push(Publisher::new(
                UntappdCheckins::new(client.clone(), untappd),
                transmitter.clone(),
                untappd.channel.as_deref().unwrap_or(default_channel),
                Duration::from_secs(untappd.interval_secs),
            ));
        }
    }

    if config.titles.enabled {
        let channel = config.titles.channel.as_deref().unwrap_or(default_channel);
        let titles = PageTitles::new(
            events.subscribe(EventKind::Message, "titles"),
            channel,
            config.titles.max_bytes,
        )?;
        publishers.push(Publisher::new(
            titles,
            transmitter.clone(),
            channel,
            Duration::from_secs(config.titles.interval_secs),
        ));
    }

    Ok(publishers
        .into_iter()
        .map(|publisher| tokio::spawn(publisher.run(shutdown.subscribe())))
        .collect())
}
