//! Handle onto the single writer task.
//!
//! Every line the agent sends goes through one bounded queue. Items are
//! batches: the writer flushes a batch as a unit before taking the next one,
//! so lines of one batch never interleave with lines of another.

use r2d2_proto::Message;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Queue depth for outbound batches.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Lines that must reach the wire back to back.
pub type Batch = Vec<Message>;

/// Cloneable sender half of the outbound queue.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Batch>,
}

impl Outbound {
    /// Create a handle and the receiver the writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a single line.
    pub async fn send(&self, msg: Message) -> Result<(), SessionError> {
        self.send_batch(vec![msg]).await
    }

    /// Queue lines to be written consecutively. Empty batches are skipped.
    pub async fn send_batch(&self, batch: Batch) -> Result<(), SessionError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.tx
            .send(batch)
            .await
            .map_err(|_| SessionError::OutboundClosed)
    }

    /// Queue a line without waiting; fails if the queue is full or closed.
    pub fn try_send(&self, msg: Message) -> Result<(), SessionError> {
        self.tx
            .try_send(vec![msg])
            .map_err(|_| SessionError::OutboundClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
