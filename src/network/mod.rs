//! Connection to the IRC server.
//!
//! - [`transport`]: dial, TLS, registration and the reader/writer/keepalive tasks
//! - [`outbound`]: the queue in front of the single writer
//! - [`events`]: inbound PRIVMSG/NOTICE fan-out with scoped subscriptions

pub mod events;
pub mod outbound;
pub mod stream;
pub mod tls;
pub mod transport;

pub use events::{EventBus, EventKind, InboundEvent, Subscription};
pub use outbound::{Batch, Outbound};
pub use transport::{Connection, connect};
