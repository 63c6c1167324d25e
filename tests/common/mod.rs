//! Integration test common infrastructure.
//!
//! A [`FakeNetwork`] listens on a loopback port and hands out a [`Peer`]
//! for each connection, which the test drives like an IRC server would.

use r2d2::config::Config;
use r2d2_proto::{Command, Message};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

pub const NICK: &str = "r2d2";
pub const CHANNEL: &str = "#rebels";

/// A listening socket standing in for an IRC server.
pub struct FakeNetwork {
    listener: TcpListener,
}

impl FakeNetwork {
    pub async fn bind() -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn address(&self) -> String {
        self.listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    /// Agent configuration pointing at this network. `extra` is appended
    /// to the `[irc]` table.
    pub fn config(&self, extra: &str) -> Config {
        let toml = format!(
            "[irc]\nserver = \"{}\"\nnick = \"{NICK}\"\nchannel = \"{CHANNEL}\"\nping_interval_secs = 60\n{extra}\n\n[titles]\nenabled = false\n",
            self.address()
        );
        Config::parse(&toml).expect("test config parses")
    }

    pub async fn accept(&self) -> anyhow::Result<Peer> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept()).await??;
        let (read_half, writer) = stream.into_split();
        Ok(Peer {
            reader: BufReader::new(read_half),
            writer,
        })
    }
}

/// The server side of one agent connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[allow(dead_code)]
impl Peer {
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line from the agent, skipping its keepalive PINGs.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            let mut line = String::new();
            let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
            if read == 0 {
                anyhow::bail!("agent closed the connection");
            }
            let msg = line
                .trim_end()
                .parse::<Message>()
                .map_err(|e| anyhow::anyhow!("Parse error: {}", e))?;
            if !matches!(msg.command, Command::PING(_, _)) {
                return Ok(msg);
            }
        }
    }

    /// Whether the agent hangs up within a few seconds.
    pub async fn closed(&mut self) -> bool {
        let mut line = String::new();
        loop {
            line.clear();
            match timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    /// Accept NICK and USER and answer with the welcome numeric.
    pub async fn welcome(&mut self) -> anyhow::Result<()> {
        let nick = self.recv().await?;
        anyhow::ensure!(
            nick.command == Command::NICK(NICK.into()),
            "expected NICK, got {nick:?}"
        );
        let user = self.recv().await?;
        anyhow::ensure!(
            matches!(user.command, Command::USER(_, _, _)),
            "expected USER, got {user:?}"
        );
        self.send_raw(&format!(":irc.test 001 {NICK} :Welcome to the test network"))
            .await
    }
}
