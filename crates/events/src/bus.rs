//! Event publication towards the projection side.
//!
//! The event store is the source of truth; the bus only distributes committed
//! envelopes to whoever builds read models.
//!
//! ## Delivery model
//!
//! - **After commit**: nothing reaches the bus before the conditional append
//!   that produced it succeeded. A rejected command publishes nothing.
//! - **At-least-once**: a refused publish is reported to the writer and the
//!   envelope can be sent again from the store. Subscribers must tolerate
//!   duplicates; `(tenant_id, aggregate_id, sequence_number)` identifies an
//!   envelope.
//! - **Per-stream order**: envelopes of one command arrive in stream order.
//!   Envelopes of different streams may interleave.
//! - **No persistence**: a subscription only sees what was published after it
//!   was created. Catch-up reads go to the store.
//!
//! ## Subscriber pattern
//!
//! ```ignore
//! let subscription = bus.subscribe();
//! loop {
//!     match subscription.recv_timeout(Duration::from_secs(1)) {
//!         Ok(envelope) => project(envelope)?,
//!         Err(RecvTimeoutError::Timeout) => continue,
//!         Err(RecvTimeoutError::Disconnected) => break,
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a bus. Each subscription receives every message published
/// after it was created, in publication order.
///
/// Meant for one consuming thread. Dropping it unsubscribes; the bus prunes the
/// dead sender on its next publish.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything that is currently buffered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub for committed events.
///
/// `publish` is only ever called after a successful append, so a failed
/// publication never loses data; it can be repeated from the store.
///
/// ## Implementing
///
/// - `publish` should hand the message to every live subscriber or fail as a
///   whole. It must not block on slow subscribers.
/// - `Error` is reported by the writer (logged, and listed as unpublished in
///   the dispatch outcome); it never rolls the commit back.
/// - Implementations are shared across writer threads, hence `Send + Sync`.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
