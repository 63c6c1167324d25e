//! IRC commands understood by the agent.
//!
//! Anything outside this vocabulary is preserved as [`Command::Raw`], so a
//! line always round-trips through the model even if nothing acts on it.

use std::fmt::{self, Write};

use crate::error::MessageParseError;

/// An IRC command with its parameters.
#[derive(Clone, PartialEq, Eq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum Command {
    /// `PASS <password>`
    PASS(String),
    /// `NICK <nickname>`
    NICK(String),
    /// `USER <username> <mode> * :<realname>`
    USER(String, String, String),
    /// `JOIN <channel> [<key>]`
    JOIN(String, Option<String>),
    /// `PART <channel> [:<message>]`
    PART(String, Option<String>),
    /// `PRIVMSG <target> :<text>`
    PRIVMSG(String, String),
    /// `NOTICE <target> :<text>`
    NOTICE(String, String),
    /// `PING <server1> [<server2>]`
    PING(String, Option<String>),
    /// `PONG <server> [<token>]`
    PONG(String, Option<String>),
    /// `QUIT [:<message>]`
    QUIT(Option<String>),
    /// `ERROR :<message>`, sent by servers before closing the link.
    ERROR(String),
    /// Three-digit numeric reply with its parameters.
    Response(u16, Vec<String>),
    /// Any other command, kept verbatim.
    Raw(String, Vec<String>),
}

impl Command {
    /// Build a command from its name and parameters.
    pub fn new(cmd: &str, args: Vec<&str>) -> Result<Command, MessageParseError> {
        if cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit()) {
            let code = cmd
                .parse::<u16>()
                .map_err(|_| MessageParseError::InvalidCommand)?;
            return Ok(Command::Response(code, owned(&args)));
        }

        let upper = cmd.to_ascii_uppercase();
        let command = match upper.as_str() {
            "PASS" => Command::PASS(required(&args, 0, "PASS", 1)?),
            "NICK" => Command::NICK(required(&args, 0, "NICK", 1)?),
            "USER" => {
                // USER <user> <mode> <unused> <realname>
                let user = required(&args, 0, "USER", 4)?;
                let mode = required(&args, 1, "USER", 4)?;
                let realname = required(&args, 3, "USER", 4)?;
                Command::USER(user, mode, realname)
            }
            "JOIN" => Command::JOIN(required(&args, 0, "JOIN", 1)?, optional(&args, 1)),
            "PART" => Command::PART(required(&args, 0, "PART", 1)?, optional(&args, 1)),
            "PRIVMSG" => Command::PRIVMSG(
                required(&args, 0, "PRIVMSG", 2)?,
                required(&args, 1, "PRIVMSG", 2)?,
            ),
            "NOTICE" => Command::NOTICE(
                required(&args, 0, "NOTICE", 2)?,
                required(&args, 1, "NOTICE", 2)?,
            ),
            "PING" => Command::PING(required(&args, 0, "PING", 1)?, optional(&args, 1)),
            "PONG" => Command::PONG(required(&args, 0, "PONG", 1)?, optional(&args, 1)),
            "QUIT" => Command::QUIT(optional(&args, 0)),
            "ERROR" => Command::ERROR(optional(&args, 0).unwrap_or_default()),
            _ => Command::Raw(upper, owned(&args)),
        };
        Ok(command)
    }

    /// The command name as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Command::PASS(_) => "PASS",
            Command::NICK(_) => "NICK",
            Command::USER(..) => "USER",
            Command::JOIN(..) => "JOIN",
            Command::PART(..) => "PART",
            Command::PRIVMSG(..) => "PRIVMSG",
            Command::NOTICE(..) => "NOTICE",
            Command::PING(..) => "PING",
            Command::PONG(..) => "PONG",
            Command::QUIT(_) => "QUIT",
            Command::ERROR(_) => "ERROR",
            Command::Response(..) => "RESPONSE",
            Command::Raw(name, _) => name,
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

fn optional(args: &[&str], idx: usize) -> Option<String> {
    args.get(idx).map(|s| (*s).to_owned())
}

fn required(
    args: &[&str],
    idx: usize,
    command: &'static str,
    expected: usize,
) -> Result<String, MessageParseError> {
    args.get(idx)
        .map(|s| (*s).to_owned())
        .ok_or(MessageParseError::NotEnoughArguments {
            command,
            expected,
            got: args.len(),
        })
}

/// Check if a string needs colon-prefixing as a trailing IRC argument.
pub(crate) fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

/// Write `cmd` with its arguments, colon-prefixing the last one only when
/// required.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    if let Some((last, middle)) = args.split_last() {
        for arg in middle {
            f.write_char(' ')?;
            f.write_str(arg)?;
        }
        f.write_char(' ')?;
        if needs_colon_prefix(last) {
            f.write_char(':')?;
        }
        f.write_str(last)?;
    }
    Ok(())
}

/// Write `cmd` with its arguments, always colon-prefixing the last one.
///
/// Used for free-form text such as message bodies.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    if let Some((last, middle)) = args.split_last() {
        for arg in middle {
            f.write_char(' ')?;
            f.write_str(arg)?;
        }
        f.write_str(" :")?;
        f.write_str(last)?;
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PASS(p) => write_cmd(f, "PASS", &[p]),
            Command::NICK(n) => write_cmd(f, "NICK", &[n]),
            Command::USER(u, m, r) => write_cmd_freeform(f, "USER", &[u, m, "*", r]),
            Command::JOIN(c, Some(k)) => write_cmd(f, "JOIN", &[c, k]),
            Command::JOIN(c, None) => write_cmd(f, "JOIN", &[c]),
            Command::PART(c, Some(m)) => write_cmd_freeform(f, "PART", &[c, m]),
            Command::PART(c, None) => write_cmd(f, "PART", &[c]),
            Command::PRIVMSG(t, m) => write_cmd_freeform(f, "PRIVMSG", &[t, m]),
            Command::NOTICE(t, m) => write_cmd_freeform(f, "NOTICE", &[t, m]),
            Command::PING(s, Some(t)) => write_cmd(f, "PING", &[s, t]),
            Command::PING(s, None) => write_cmd(f, "PING", &[s]),
            Command::PONG(s, Some(t)) => write_cmd(f, "PONG", &[s, t]),
            Command::PONG(s, None) => write_cmd(f, "PONG", &[s]),
            Command::QUIT(Some(m)) => write_cmd_freeform(f, "QUIT", &[m]),
            Command::QUIT(None) => write_cmd(f, "QUIT", &[]),
            Command::ERROR(m) => write_cmd_freeform(f, "ERROR", &[m]),
            Command::Response(code, args) => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                write_cmd(f, &format!("{code:03}"), &args)
            }
            Command::Raw(name, args) => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                write_cmd(f, name, &args)
            }
        }
    }
}
