//! Change subscription capability

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::Behavior;
use crate::error::Result;
use crate::models::Entry;
use crate::store::{ChangesOptions, DocumentStore, Since};

/// Called with each changed entry and whether it was deleted
pub type Listener = Arc<dyn Fn(Entry, bool) + Send + Sync>;

/// Where a subscription starts; defaults to changes after subscribing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub since: Since,
}

pub struct SubscribeMessage {
    pub options: SubscribeOptions,
    pub listener: Listener,
}

impl fmt::Debug for SubscribeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeMessage")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Handle of a registered listener. The subscription stays open for as long
/// as the subscribe capability runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub id: u64,
}

/// Forwarding task, aborted when its owner is dropped
struct Forwarder(JoinHandle<()>);

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Registers listeners on the store's change feed.
///
/// State is the set of running forwarders; each message returns a successor
/// holding one more.
pub struct Subscribe {
    store: Arc<dyn DocumentStore>,
    forwarders: Vec<Forwarder>,
    next_id: u64,
}

impl Subscribe {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            forwarders: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of forwarders still running
    #[must_use]
    pub fn active(&self) -> usize {
        self.forwarders
            .iter()
            .filter(|forwarder| !forwarder.0.is_finished())
            .count()
    }

    async fn open(&self, id: u64, message: SubscribeMessage) -> Result<Forwarder> {
        let mut stream = self
            .store
            .changes(ChangesOptions {
                live: true,
                since: message.options.since,
                include_docs: true,
            })
            .await?;
        let listener = message.listener;

        let forward = async move {
            while let Some(change) = stream.next().await {
                let Some(document) = change.document else {
                    continue;
                };
                match Entry::from_document(&document) {
                    Ok(entry) => listener(entry, change.deleted),
                    Err(error) => {
                        tracing::debug!(id = %change.id, %error, "Skipping non-entry change");
                    }
                }
            }
            tracing::debug!("Change stream ended");
        };
        let span = tracing::debug_span!("subscription", id);
        Ok(Forwarder(tokio::spawn(forward.instrument(span))))
    }
}

#[async_trait]
impl Behavior for Subscribe {
    type Message = SubscribeMessage;
    type Reply = Result<Subscription>;

    async fn receive(mut self, message: SubscribeMessage) -> (Self::Reply, Self) {
        self.forwarders.retain(|forwarder| !forwarder.0.is_finished());

        let id = self.next_id;
        match self.open(id, message).await {
            Ok(forwarder) => {
                self.forwarders.push(forwarder);
                self.next_id += 1;
                tracing::debug!(id, active = self.forwarders.len(), "Subscribed");
                (Ok(Subscription { id }), self)
            }
            Err(error) => (Err(error), self),
        }
    }
}
