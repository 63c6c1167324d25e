//! Addressed-request dispatch.
//!
//! A channel line is a request when it reads `<nick>: <body>` with the
//! session's exact nick. The body is trimmed and split on single spaces;
//! the first token picks the handler. Each request is answered in its own
//! task, bounded by the handler timeout, and the answer goes back to the
//! channel it came from (or the default channel for private queries)
//! addressed to the sender.

use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::handlers::Registry;
use crate::network::{EventKind, InboundEvent, Subscription};
use crate::transmit::Transmitter;

/// Sent when a handler overruns its time budget.
pub const TIMEOUT_REPLY: &str = "sorry, that took too long to answer";

/// Matches lines addressed to one nick. Compiled once per session.
#[derive(Debug, Clone)]
pub struct AddressPattern {
    regex: Regex,
}

impl AddressPattern {
    pub fn new(nick: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&format!("^{}: (.+)$", regex::escape(nick)))?,
        })
    }

    /// The request body, if `text` is addressed to us.
    pub fn body<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// One addressed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub sender: String,
    /// Where the answer goes.
    pub destination: String,
    pub command: String,
    pub args: Vec<String>,
}

impl Request {
    /// Build a request from an event, or `None` if it is not for us.
    pub fn parse(event: &InboundEvent, pattern: &AddressPattern, default_channel: &str) -> Option<Self> {
        let body = pattern.body(&event.text)?.trim();
        let mut tokens = body.split(' ').map(str::to_string);
        let command = tokens.next().unwrap_or_default();

        Some(Self {
            sender: event.sender.clone(),
            destination: event.channel().unwrap_or(default_channel).to_string(),
            command,
            args: tokens.collect(),
        })
    }
}

/// Turns addressed channel lines into answers.
#[derive(Clone)]
pub struct Dispatcher {
    pattern: AddressPattern,
    registry: Arc<Registry>,
    transmitter: Transmitter,
    default_channel: String,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        nick: &str,
        default_channel: &str,
        registry: Arc<Registry>,
        transmitter: Transmitter,
        handler_timeout: Duration,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: AddressPattern::new(nick)?,
            registry,
            transmitter,
            default_channel: default_channel.to_string(),
            handler_timeout,
        })
    }

    /// Answer a request, giving up after the handler timeout.
    pub async fn answer(&self, request: &Request) -> String {
        let work = self.registry.handle(&request.command, &request.args);
        match tokio::time::timeout(self.handler_timeout, work).await {
            Ok(answer) => answer,
            Err(_) => {
                warn!(command = %request.command, "handler timed out");
                TIMEOUT_REPLY.to_string()
            }
        }
    }

    /// Handle one inbound event. Returns the task answering it, if it was a
    /// request.
    pub fn on_inbound(&self, event: &InboundEvent) -> Option<JoinHandle<()>> {
        if event.kind != EventKind::Message {
            return None;
        }
        let Some(request) = Request::parse(event, &self.pattern, &self.default_channel) else {
            debug!(sender = %event.sender, "not addressed to us");
            return None;
        };
        info!(
            sender = %request.sender,
            destination = %request.destination,
            command = %request.command,
            "handling request"
        );

        let this = self.clone();
        Some(tokio::spawn(async move {
            let answer = this.answer(&request).await;
            debug!(answer = %answer, "responding");
            if let Err(e) = this
                .transmitter
                .send(&request.destination, &request.sender, &answer)
                .await
            {
                warn!(error = %e, "could not send answer");
            }
        }))
    }

    /// Consume channel messages until the bus closes or shutdown fires.
    #[instrument(skip_all, name = "dispatcher")]
    pub async fn run(self, mut messages: Subscription, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = messages.recv() => match event {
                    Some(event) => {
                        self.on_inbound(&event);
                    }
                    None => break,
                },
            }
        }
        info!("dispatcher stopped");
    }
}
