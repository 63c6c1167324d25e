//! Owned IRC message and its wire format.
//!
//! ```text
//! [@tags] [:prefix] <command> [params...] [:trailing]
//! ```
//!
//! IRCv3 tags are accepted on input and discarded; the agent never
//! negotiates capabilities that would make them meaningful.

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::chan::ChannelExt;
use crate::command::Command;
use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

/// An owned IRC message.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    /// Message source (e.g. `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

impl Message {
    /// Create a message from raw components.
    pub fn new(
        prefix: Option<&str>,
        command: &str,
        args: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        Ok(Message {
            prefix: prefix.map(Prefix::new_from_str),
            command: Command::new(command, args)?,
        })
    }

    /// Nickname from the prefix, if the source is a user.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// The channel a PRIVMSG or NOTICE was addressed to, if it was a channel.
    pub fn channel_target(&self) -> Option<&str> {
        match &self.command {
            Command::PRIVMSG(target, _) | Command::NOTICE(target, _)
                if target.is_channel_name() =>
            {
                Some(target.as_str())
            }
            _ => None,
        }
    }

    /// Create a PRIVMSG to a target.
    #[must_use]
    pub fn privmsg<T, M>(target: T, text: M) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// Create a NOTICE to a target.
    #[must_use]
    pub fn notice<T, M>(target: T, text: M) -> Self
    where
        T: Into<String>,
        M: Into<String>,
    {
        Command::NOTICE(target.into(), text.into()).into()
    }

    /// Create a JOIN, carrying the key as a second parameter when present.
    #[must_use]
    pub fn join<C>(channel: C, key: Option<String>) -> Self
    where
        C: Into<String>,
    {
        Command::JOIN(channel.into(), key).into()
    }

    /// Create a NICK.
    #[must_use]
    pub fn nick<N: Into<String>>(nickname: N) -> Self {
        Command::NICK(nickname.into()).into()
    }

    /// Create a USER registration message.
    #[must_use]
    pub fn user<U, R>(username: U, realname: R) -> Self
    where
        U: Into<String>,
        R: Into<String>,
    {
        Command::USER(username.into(), "0".into(), realname.into()).into()
    }

    /// Create a PING.
    #[must_use]
    pub fn ping<S: Into<String>>(token: S) -> Self {
        Command::PING(token.into(), None).into()
    }

    /// Create a PONG echoing a PING token.
    #[must_use]
    pub fn pong<S: Into<String>>(token: S) -> Self {
        Command::PONG(token.into(), None).into()
    }

    /// Create a QUIT with an optional message.
    #[must_use]
    pub fn quit(message: Option<String>) -> Self {
        Command::QUIT(message).into()
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Message {
        Message {
            prefix: None,
            command,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        write!(f, "{}\r\n", self.command)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let invalid = |cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        };

        if s.trim_end_matches(['\r', '\n']).is_empty() {
            return Err(invalid(MessageParseError::EmptyMessage));
        }

        let parsed = match parse_message(s) {
            Ok((_, parsed)) => parsed,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let position = s.len() - e.input.len();
                return Err(invalid(MessageParseError::ParseContext { position }));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(invalid(MessageParseError::ParseContext { position: s.len() }));
            }
        };

        Message::new(parsed.prefix, parsed.command, parsed.params.to_vec()).map_err(invalid)
    }
}

/// Borrowed pieces of one parsed line.
struct ParsedMessage<'a> {
    prefix: Option<&'a str>,
    command: &'a str,
    params: SmallVec<[&'a str; 15]>,
}

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// RFC 2812: `command = 1*letter / 3digit`
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split parameters, honoring the `:trailing` form. At most 15 are kept.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; 15]>) {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        if params.len() >= 15 {
            break;
        }

        rest = rest.trim_start_matches(' ');
        if rest.is_empty() || rest.starts_with(['\r', '\n']) {
            break;
        }

        if let Some(after_colon) = rest.strip_prefix(':') {
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, _tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            prefix,
            command,
            params,
        },
    ))
}
