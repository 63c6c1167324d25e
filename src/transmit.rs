//! Outbound text framing.
//!
//! Answers and notifications can be any length; IRC lines cannot. Text is
//! first cut at line breaks (CR, LF or CRLF, empty lines dropped), then each
//! line is cut into frames of at most [`FRAME_CHARS`] characters, counted in
//! Unicode scalar values so a multi-byte character is never split. A frame
//! also ends early when the next character would push the serialized
//! `PRIVMSG` past [`MAX_IRC_LINE_LEN`]; see [`frame_budget`].
//!
//! All frames of one call are queued as a single batch, so two concurrent
//! answers never interleave on the wire.

use r2d2_proto::{MAX_IRC_LINE_LEN, Message};

use crate::error::SessionError;
use crate::network::Outbound;

/// Maximum characters of text per frame.
pub const FRAME_CHARS: usize = 300;

/// Room left for the `:nick!user@host ` prefix the server adds when it
/// relays our line to the channel.
pub const RELAY_PREFIX_RESERVE: usize = 100;

/// Smallest byte budget honoured, so any single character still fits.
const MIN_FRAME_BYTES: usize = 4;

/// Bytes of text a frame may carry when sent to `destination` behind a
/// `prefix_len`-byte prefix.
pub fn frame_budget(destination: &str, prefix_len: usize) -> usize {
    let overhead = "PRIVMSG ".len() + destination.len() + " :".len() + "\r\n".len();
    MAX_IRC_LINE_LEN
        .saturating_sub(overhead + RELAY_PREFIX_RESERVE + prefix_len)
        .max(MIN_FRAME_BYTES)
}

/// Split `text` into frames of at most [`FRAME_CHARS`] characters and
/// `max_bytes` bytes. Line breaks end a frame and are not part of any frame.
pub fn split_frames(text: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(MIN_FRAME_BYTES);
    let mut frames = Vec::with_capacity(text.len() / FRAME_CHARS + 1);

    for line in text.split(['\r', '\n']).filter(|line| !line.is_empty()) {
        let mut start = 0;
        let mut count = 0;

        for (idx, c) in line.char_indices() {
            if count == FRAME_CHARS || idx + c.len_utf8() - start > max_bytes {
                frames.push(&line[start..idx]);
                start = idx;
                count = 0;
            }
            count += 1;
        }
        if count > 0 {
            frames.push(&line[start..]);
        }
    }

    frames
}

/// Writes framed text to channels and users.
#[derive(Clone, Debug)]
pub struct Transmitter {
    outbound: Outbound,
}

impl Transmitter {
    pub fn new(outbound: Outbound) -> Self {
        Self { outbound }
    }

    /// Answer `nick` in `destination`; each frame reads `<nick>: <frame>`.
    pub async fn send(&self, destination: &str, nick: &str, text: &str) -> Result<(), SessionError> {
        let budget = frame_budget(destination, nick.len() + ": ".len());
        let batch = split_frames(text, budget)
            .into_iter()
            .map(|frame| Message::privmsg(destination, format!("{nick}: {frame}")))
            .collect();
        self.outbound.send_batch(batch).await
    }

    /// Post unsolicited text to `destination` without addressing anyone.
    pub async fn notify(&self, destination: &str, text: &str) -> Result<(), SessionError> {
        let batch = split_frames(text, frame_budget(destination, 0))
            .into_iter()
            .map(|frame| Message::privmsg(destination, frame))
            .collect();
        self.outbound.send_batch(batch).await
    }
}
