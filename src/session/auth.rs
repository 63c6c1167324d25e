//! Nickname service identification.
//!
//! The handshake moves Idle → Sent → Confirmed. `IDENTIFY` goes out as soon
//! as it starts and again on every tick of a 5 second timer until the
//! service confirms; a notice asking us to identify triggers an extra send
//! right away. There is no retry cap.
//!
//! Notices are read through a [`Subscription`] taken for the duration of
//! [`Handshake::run`] only, so nothing else sees them through this path and
//! the subscription is released on every exit.

use r2d2_proto::Message;
use regex::Regex;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};

use crate::error::{SessionError, TransportError};
use crate::network::{EventBus, EventKind, InboundEvent, Outbound};

/// Time between unanswered `IDENTIFY` attempts.
pub const IDENTIFY_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Sent,
    Confirmed,
}

/// What a notice means for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVerdict {
    Ignore,
    Resend,
    Confirmed,
}

/// Recognizes notices from the nickname service.
pub struct NoticeClassifier {
    service: String,
    request: Regex,
    accepted: Regex,
}

impl NoticeClassifier {
    pub fn new(service: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            service: service.to_string(),
            request: Regex::new(&format!("(?i){} identify", regex::escape(service)))?,
            accepted: Regex::new("(?i)password accepted|you are now identified")?,
        })
    }

    pub fn classify(&self, event: &InboundEvent) -> NoticeVerdict {
        if event.kind != EventKind::Notice || !event.sender.eq_ignore_ascii_case(&self.service) {
            return NoticeVerdict::Ignore;
        }
        if self.accepted.is_match(&event.text) {
            NoticeVerdict::Confirmed
        } else if self.request.is_match(&event.text) {
            NoticeVerdict::Resend
        } else {
            NoticeVerdict::Ignore
        }
    }
}

/// One identification run against the nickname service.
pub struct Handshake {
    classifier: NoticeClassifier,
    service: String,
    secret: String,
    state: HandshakeState,
}

impl Handshake {
    pub fn new(service: &str, secret: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            classifier: NoticeClassifier::new(service)?,
            service: service.to_string(),
            secret: secret.to_string(),
            state: HandshakeState::Idle,
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    async fn identify(&mut self, outbound: &Outbound) -> Result<(), SessionError> {
        outbound
            .send(Message::privmsg(
                self.service.clone(),
                format!("IDENTIFY {}", self.secret),
            ))
            .await?;
        self.state = HandshakeState::Sent;
        Ok(())
    }

    /// Identify until the service confirms.
    ///
    /// Only fails if the connection goes away underneath.
    #[instrument(skip_all, fields(service = %self.service))]
    pub async fn run(&mut self, outbound: &Outbound, events: &EventBus) -> Result<(), SessionError> {
        let mut notices = events.subscribe(EventKind::Notice, "auth");
        let mut ticker = tokio::time::interval(IDENTIFY_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                event = notices.recv() => {
                    let Some(event) = event else {
                        return Err(TransportError::Closed.into());
                    };
                    match self.classifier.classify(&event) {
                        NoticeVerdict::Confirmed => {
                            self.state = HandshakeState::Confirmed;
                            info!("Identified with nickname service");
                            return Ok(());
                        }
                        NoticeVerdict::Resend => {
                            debug!("service asked for identification");
                            self.identify(outbound).await?;
                        }
                        NoticeVerdict::Ignore => {}
                    }
                }
                _ = ticker.tick() => {
                    if self.state == HandshakeState::Sent {
                        debug!("no confirmation yet, identifying again");
                    }
                    self.identify(outbound).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_proto::Command;
    use tokio::time::Instant;

    fn notice(sender: &str, text: &str) -> InboundEvent {
        InboundEvent {
            sender: sender.into(),
            target: "r2d2".into(),
            text: text.into(),
            kind: EventKind::Notice,
        }
    }

    fn is_identify(batch: &[Message]) -> bool {
        matches!(
            batch,
            [Message { command: Command::PRIVMSG(target, text), .. }]
                if target == "NickServ" && text == "IDENTIFY hunter2"
        )
    }

    #[test]
    fn test_classify_service_notices() {
        let c = NoticeClassifier::new("NickServ").unwrap();
        assert_eq!(
            c.classify(&notice(
                "NickServ",
                "This nickname is registered. Please choose a different nickname, or identify via /msg NickServ identify <password>."
            )),
            NoticeVerdict::Resend
        );
        assert_eq!(
            c.classify(&notice("NickServ", "Password accepted - you are now recognized.")),
            NoticeVerdict::Confirmed
        );
        assert_eq!(
            c.classify(&notice("nickserv", "You are now identified for r2d2.")),
            NoticeVerdict::Confirmed
        );
        assert_eq!(
            c.classify(&notice("ChanServ", "Password accepted")),
            NoticeVerdict::Ignore
        );
        assert_eq!(
            c.classify(&notice("NickServ", "Last login from: ~r2d2@naboo")),
            NoticeVerdict::Ignore
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_repeats_every_five_seconds_until_confirmed() {
        let (outbound, mut rx) = Outbound::channel(16);
        let events = EventBus::new();
        let start = Instant::now();

        let task = {
            let events = events.clone();
            tokio::spawn(async move {
                let mut handshake = Handshake::new("NickServ", "hunter2").unwrap();
                handshake.run(&outbound, &events).await.unwrap();
                handshake.state()
            })
        };

        for expected in [0, 5, 10] {
            let batch = rx.recv().await.unwrap();
            assert!(is_identify(&batch));
            assert_eq!(start.elapsed(), Duration::from_secs(expected));
        }
        assert_eq!(events.subscriber_count(EventKind::Notice), 1);

        events.publish(&notice("NickServ", "Password accepted"));
        assert_eq!(task.await.unwrap(), HandshakeState::Confirmed);
        assert_eq!(events.subscriber_count(EventKind::Notice), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_notice_triggers_immediate_resend() {
        let (outbound, mut rx) = Outbound::channel(16);
        let events = EventBus::new();
        let start = Instant::now();

        let task = {
            let events = events.clone();
            tokio::spawn(async move {
                Handshake::new("NickServ", "hunter2")
                    .unwrap()
                    .run(&outbound, &events)
                    .await
            })
        };

        assert!(is_identify(&rx.recv().await.unwrap()));
        tokio::time::sleep(Duration::from_secs(2)).await;
        events.publish(&notice("NickServ", "please /msg NickServ IDENTIFY <password>"));

        assert!(is_identify(&rx.recv().await.unwrap()));
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        events.publish(&notice("NickServ", "You are now identified for r2d2."));
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bus_closing_ends_handshake() {
        let (outbound, _rx) = Outbound::channel(16);
        let events = EventBus::new();

        let task = {
            let events = events.clone();
            tokio::spawn(async move {
                Handshake::new("NickServ", "hunter2")
                    .unwrap()
                    .run(&outbound, &events)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        events.close();
        assert!(matches!(
            task.await.unwrap(),
            Err(SessionError::Transport(TransportError::Closed))
        ));
    }
}
