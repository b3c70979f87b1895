//! Message-driven capabilities
//!
//! A capability is a behavior running on its own tokio task behind a bounded
//! mailbox. Each message consumes the current behavior and yields a reply
//! plus the successor behavior; the task installs the successor before the
//! reply is delivered and before the next message is taken, so messages to
//! one capability are handled strictly one at a time in arrival order.
//! Different capabilities run concurrently.

mod behaviors;
mod subscribe;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::error::{Error, Result};

pub use behaviors::{
    AddEntry, AddMessage, ArchiveCounts, ArchiveCountsMessage, EditEntry, EditMessage, ListByTag,
    ListByTagMessage, ListRecent, RemoveEntry, TagCounts,
};
pub use subscribe::{Listener, Subscribe, SubscribeMessage, SubscribeOptions, Subscription};

/// Default bound on queued messages per capability
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Self-replacing message handler
#[async_trait]
pub trait Behavior: Send + Sized + 'static {
    type Message: Send + 'static;
    type Reply: Send + 'static;

    /// Handle one message, returning the reply and the behavior that handles
    /// the next one
    async fn receive(self, message: Self::Message) -> (Self::Reply, Self);
}

struct Envelope<M, R> {
    message: M,
    reply: Option<oneshot::Sender<R>>,
}

/// Hosts capabilities on the current tokio runtime
#[derive(Debug, Clone)]
pub struct Vat {
    name: Arc<str>,
    mailbox_capacity: usize,
}

impl Vat {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start `behavior` on its own task.
    ///
    /// The task ends, dropping the current behavior, once every handle to
    /// the capability is gone. Must be called within a tokio runtime.
    pub fn spawn<B: Behavior>(&self, label: &'static str, behavior: B) -> Capability<B::Message, B::Reply> {
        let (sender, receiver) = mpsc::channel(self.mailbox_capacity);
        let span = tracing::debug_span!("capability", vat = %self.name, label);
        tokio::spawn(run(behavior, receiver).instrument(span));
        Capability {
            label,
            mailbox: sender,
        }
    }
}

async fn run<B: Behavior>(mut behavior: B, mut mailbox: mpsc::Receiver<Envelope<B::Message, B::Reply>>) {
    tracing::debug!("Capability started");
    while let Some(Envelope { message, reply }) = mailbox.recv().await {
        let (result, next) = behavior.receive(message).await;
        behavior = next;
        if let Some(reply) = reply {
            if reply.send(result).is_err() {
                tracing::trace!("Caller stopped waiting; reply dropped");
            }
        }
    }
    tracing::debug!("Capability stopped");
}

/// Handle used to send messages to a running behavior
pub struct Capability<M, R> {
    label: &'static str,
    mailbox: mpsc::Sender<Envelope<M, R>>,
}

impl<M, R> Clone for Capability<M, R> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<M, R> fmt::Debug for Capability<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("label", &self.label)
            .field("closed", &self.mailbox.is_closed())
            .finish()
    }
}

impl<M: Send + 'static, R: Send + 'static> Capability<M, R> {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    fn closed(&self) -> Error {
        Error::CapabilityClosed(self.label.to_string())
    }

    /// Send a message and wait for the reply
    pub async fn send(&self, message: M) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Envelope {
                message,
                reply: Some(reply),
            })
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    /// Send a message from synchronous code and block until the reply.
    ///
    /// Panics if called from within an async context.
    pub fn send_blocking(&self, message: M) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .blocking_send(Envelope {
                message,
                reply: Some(reply),
            })
            .map_err(|_| self.closed())?;
        response.blocking_recv().map_err(|_| self.closed())
    }

    /// Queue a message without waiting for its reply
    pub async fn send_only(&self, message: M) -> Result<()> {
        self.mailbox
            .send(Envelope {
                message,
                reply: None,
            })
            .await
            .map_err(|_| self.closed())
    }
}
