//! GitHub repository activity.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Notification, Poll, Provider, WatcherCursor};
use crate::config::GithubConfig;
use crate::error::ProviderError;
use crate::http;

/// Polls `/repos/{owner}/{repo}/events` for each followed repository.
pub struct GithubEvents {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    repos: Vec<String>,
    debug: bool,
}

#[derive(Debug, Deserialize)]
struct Event {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    actor: Actor,
    repo: Repo,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct Actor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
}

fn text<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default().trim()
}

/// Render one event, or `None` for event types that are not announced.
fn format_event(event: &Event) -> Option<String> {
    let actor = &event.actor.login;
    let repo = &event.repo.name;
    let p = &event.payload;

    match event.kind.as_str() {
        "PushEvent" => {
            let branch = text(p, "/ref").trim_start_matches("refs/heads/");
            let commits = p.get("commits").and_then(Value::as_array);
            let count = p
                .get("size")
                .and_then(Value::as_u64)
                .or_else(|| commits.map(|c| c.len() as u64))
                .unwrap_or(0);
            let plural = if count == 1 { "" } else { "s" };
            let head = commits
                .and_then(|c| c.last())
                .map(|c| first_line(text(c, "/message")))
                .filter(|m| !m.is_empty());
            Some(match head {
                Some(message) => {
                    format!("{actor} pushed {count} commit{plural} to {repo}:{branch}: {message}")
                }
                None => format!("{actor} pushed {count} commit{plural} to {repo}:{branch}"),
            })
        }
        "PullRequestEvent" => Some(format!(
            "{actor} {} pull request #{} on {repo}: {} {}",
            text(p, "/action"),
            p.pointer("/pull_request/number").and_then(Value::as_u64)?,
            first_line(text(p, "/pull_request/title")),
            text(p, "/pull_request/html_url"),
        )),
        "IssuesEvent" => Some(format!(
            "{actor} {} issue #{} on {repo}: {} {}",
            text(p, "/action"),
            p.pointer("/issue/number").and_then(Value::as_u64)?,
            first_line(text(p, "/issue/title")),
            text(p, "/issue/html_url"),
        )),
        "CreateEvent" => {
            let ref_type = text(p, "/ref_type");
            match p.pointer("/ref").and_then(Value::as_str) {
                Some(name) => Some(format!("{actor} created {ref_type} {name} on {repo}")),
                None => Some(format!("{actor} created {ref_type} {repo}")),
            }
        }
        "ForkEvent" => Some(format!(
            "{actor} forked {repo} to {}",
            text(p, "/forkee/full_name")
        )),
        _ => None,
    }
}

/// Items for `repo`, keyed by the configured name so they match the
/// entities the poll reports as reached.
fn notifications(repo: &str, events: &[Event], debug_log: bool) -> Vec<Notification> {
    events
        .iter()
        .filter_map(|event| {
            let Ok(id) = event.id.parse::<u64>() else {
                debug!(id = %event.id, "event id is not numeric");
                return None;
            };
            if debug_log {
                debug!(repo = %event.repo.name, id, kind = %event.kind, "event");
            }
            Some(Notification {
                entity: repo.to_string(),
                id,
                text: format_event(event),
            })
        })
        .collect()
}

/// `owner/name` with each segment percent-encoded.
fn repo_path(repo: &str) -> String {
    repo.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

impl GithubEvents {
    pub fn new(client: reqwest::Client, config: &GithubConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            repos: config.repos.clone(),
            debug: config.debug,
        }
    }

    async fn fetch(&self, repo: &str) -> Result<Vec<Event>, ProviderError> {
        let mut request = self
            .client
            .get(format!("{}/repos/{}/events", self.api_base, repo_path(repo)))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        http::get_json(request).await
    }
}

#[async_trait]
impl Provider for GithubEvents {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn poll(&mut self, _cursor: &WatcherCursor) -> Result<Poll, ProviderError> {
        let mut poll = Poll::default();
        let mut last_error = None;

        for repo in &self.repos {
            match self.fetch(repo).await {
                Ok(events) => {
                    poll.reached.push(repo.clone());
                    poll.items.extend(notifications(repo, &events, self.debug));
                }
                Err(e) => {
                    warn!(repo = %repo, error = %e, "could not fetch events");
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
