//! Connection setup and the I/O tasks behind it.
//!
//! [`connect`] dials the server, optionally upgrades to TLS, registers with
//! `NICK`/`USER` and waits for `RPL_WELCOME`. It then splits the stream and
//! spawns three tasks:
//!
//! - the reader, which answers `PING`, publishes PRIVMSG/NOTICE on the
//!   [`EventBus`] and logs every raw line at `debug`;
//! - the writer, the only task that touches the write half;
//! - the keepalive ticker, which sends `PING` and drops the link when the
//!   server has been silent for too long.
//!
//! Whichever task fails first reports through [`Connection::closed`].

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use r2d2_proto::{ChannelExt, Command, IrcCodec, LineCodec, Message, ProtocolError, RPL_WELCOME};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

use super::events::{EventBus, InboundEvent};
use super::outbound::{Batch, OUTBOUND_CAPACITY, Outbound};
use super::stream::IrcStream;
use super::tls::upgrade_to_tls;
use crate::config::IrcConfig;
use crate::error::TransportError;

/// Inbound lines may carry IRCv3 tags even without negotiation on some
/// networks; accept up to the tagged-line limit.
const MAX_INBOUND_LINE: usize = 8191 + 512;

/// ERR_NICKNAMEINUSE
const ERR_NICKNAMEINUSE: u16 = 433;

/// How long [`Connection::shutdown`] waits for `QUIT` to be flushed.
const QUIT_GRACE: Duration = Duration::from_secs(5);

type LineReader = FramedRead<ReadHalf<IrcStream>, LineCodec>;
type MessageWriter = FramedWrite<WriteHalf<IrcStream>, IrcCodec>;

/// A registered connection.
pub struct Connection {
    outbound: Outbound,
    events: EventBus,
    failures: mpsc::Receiver<TransportError>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

impl Connection {
    /// Handle for queueing outbound lines.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Bus carrying inbound PRIVMSG and NOTICE events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Wait until the connection fails and return why.
    pub async fn closed(&mut self) -> TransportError {
        self.failures.recv().await.unwrap_or(TransportError::Closed)
    }

    /// Send `QUIT`, give the writer a moment to flush it, then stop all
    /// I/O tasks.
    pub async fn shutdown(mut self, reason: &str) {
        if self
            .outbound
            .send(Message::quit(Some(reason.to_string())))
            .await
            .is_ok()
            && tokio::time::timeout(QUIT_GRACE, &mut self.writer)
                .await
                .is_err()
        {
            warn!("QUIT not flushed in time");
        }
        self.reader.abort();
        self.keepalive.abort();
        self.writer.abort();
        self.events.close();
    }
}

/// Dial, register and start the I/O tasks.
#[instrument(skip_all, fields(server = %config.server, tls = config.tls))]
pub async fn connect(config: &IrcConfig) -> Result<Connection, TransportError> {
    info!("Connecting");
    let tcp_stream =
        TcpStream::connect(&config.server)
            .await
            .map_err(|source| TransportError::Connect {
                addr: config.server.clone(),
                source,
            })?;
    if let Err(e) = tcp_stream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let stream = if config.tls {
        IrcStream::Tls(Box::new(upgrade_to_tls(tcp_stream, config.host()).await?))
    } else {
        IrcStream::Plain(tcp_stream)
    };

    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, LineCodec::with_max_len(MAX_INBOUND_LINE));
    let mut writer = FramedWrite::new(write_half, IrcCodec::new());
    let events = EventBus::new();

    register(&mut reader, &mut writer, config, &events).await?;
    info!(nick = %config.nick, "Registered");

    let (outbound, outbound_rx) = Outbound::channel(OUTBOUND_CAPACITY);
    let (failure_tx, failures) = mpsc::channel(4);
    let last_seen = Arc::new(Mutex::new(Instant::now()));

    let reader = tokio::spawn(read_loop(
        reader,
        outbound.clone(),
        events.clone(),
        Arc::clone(&last_seen),
        failure_tx.clone(),
    ));
    let writer = tokio::spawn(write_loop(writer, outbound_rx, failure_tx.clone()));
    let keepalive = tokio::spawn(keepalive_loop(
        outbound.clone(),
        last_seen,
        config.host().to_string(),
        config.ping_interval(),
        config.timeout(),
        failure_tx,
    ));

    Ok(Connection {
        outbound,
        events,
        failures,
        reader,
        writer,
        keepalive,
    })
}

/// Parse one raw line, dropping it at `debug` if it is not valid IRC.
fn parse_line(line: &str) -> Option<Message> {
    match line.parse::<Message>() {
        Ok(msg) => Some(msg),
        Err(e) => {
            debug!(error = %e, "dropping unparsable line");
            None
        }
    }
}

/// Render a line for logs, hiding the argument of an `IDENTIFY` sent
/// privately. Channel text is logged as is.
fn redact(msg: &Message) -> String {
    if let Command::PRIVMSG(target, text) = &msg.command
        && !target.is_channel_name()
        && text
            .get(..9)
            .is_some_and(|head| head.eq_ignore_ascii_case("IDENTIFY "))
    {
        return format!("PRIVMSG {target} :IDENTIFY ****");
    }
    msg.to_string().trim_end().to_string()
}

async fn register<R, W>(
    reader: &mut FramedRead<R, LineCodec>,
    writer: &mut FramedWrite<W, IrcCodec>,
    config: &IrcConfig,
    events: &EventBus,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.send(Message::nick(config.nick.clone())).await?;
    writer
        .send(Message::user(config.nick.clone(), config.realname.clone()))
        .await?;

    let handshake = async {
        while let Some(line) = reader.next().await {
            let line = line?;
            debug!(raw = line.trim_end(), "<<");
            let Some(msg) = parse_line(&line) else {
                continue;
            };
            match &msg.command {
                Command::PING(token, _) => writer.send(Message::pong(token.clone())).await?,
                Command::Response(RPL_WELCOME, _) => return Ok(()),
                Command::Response(ERR_NICKNAMEINUSE, _) => {
                    return Err(TransportError::ServerError(format!(
                        "nickname {} is already in use",
                        config.nick
                    )));
                }
                Command::ERROR(reason) => {
                    return Err(TransportError::ServerError(reason.clone()));
                }
                _ => {
                    if let Some(event) = InboundEvent::from_message(&msg) {
                        events.publish(&event);
                    }
                }
            }
        }
        Err(TransportError::Closed)
    };

    tokio::time::timeout(config.registration_timeout(), handshake)
        .await
        .map_err(|_| TransportError::RegistrationTimeout(config.registration_timeout_secs))?
}

#[instrument(skip_all, name = "reader")]
async fn read_loop(
    mut reader: LineReader,
    outbound: Outbound,
    events: EventBus,
    last_seen: Arc<Mutex<Instant>>,
    failures: mpsc::Sender<TransportError>,
) {
    let failure = loop {
        let line = match reader.next().await {
            None => break TransportError::Closed,
            Some(Err(e)) => break TransportError::Protocol(e),
            Some(Ok(line)) => line,
        };
        *last_seen.lock() = Instant::now();
        debug!(raw = line.trim_end(), "<<");

        let Some(msg) = parse_line(&line) else {
            continue;
        };
        match &msg.command {
            Command::PING(token, _) => {
                if outbound.send(Message::pong(token.clone())).await.is_err() {
                    break TransportError::Closed;
                }
            }
            Command::ERROR(reason) => break TransportError::ServerError(reason.clone()),
            _ => {
                if let Some(event) = InboundEvent::from_message(&msg) {
                    events.publish(&event);
                }
            }
        }
    };

    warn!(error = %failure, "reader stopped");
    events.close();
    let _ = failures.try_send(failure);
}

#[instrument(skip_all, name = "writer")]
async fn write_loop(
    mut writer: MessageWriter,
    mut rx: mpsc::Receiver<Batch>,
    failures: mpsc::Sender<TransportError>,
) {
    while let Some(batch) = rx.recv().await {
        let quitting = batch
            .iter()
            .any(|msg| matches!(msg.command, Command::QUIT(_)));

        for msg in batch {
            debug!(raw = %redact(&msg), ">>");
            match writer.feed(msg).await {
                Ok(()) => {}
                Err(ProtocolError::IllegalControlChar(c)) => {
                    warn!(char = ?c, "dropping line with illegal character");
                }
                Err(e) => {
                    let _ = failures.try_send(TransportError::Protocol(e));
                    return;
                }
            }
        }
        if let Err(e) = writer.flush().await {
            let _ = failures.try_send(TransportError::Protocol(e));
            return;
        }
        if quitting {
            let _ = writer.close().await;
            return;
        }
    }
}

#[instrument(skip_all, name = "keepalive")]
async fn keepalive_loop(
    outbound: Outbound,
    last_seen: Arc<Mutex<Instant>>,
    server: String,
    ping_interval: Duration,
    timeout: Duration,
    failures: mpsc::Sender<TransportError>,
) {
    let mut ticker = tokio::time::interval(ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let silent_for = last_seen.lock().elapsed();
        if silent_for >= timeout {
            let _ = failures.try_send(TransportError::PingTimeout(timeout.as_secs()));
            return;
        }
        if outbound.send(Message::ping(server.clone())).await.is_err() {
            return;
        }
    }
}
