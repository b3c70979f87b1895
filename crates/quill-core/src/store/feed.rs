//! Change feed fan-out

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::models::{Document, Revision};

/// One committed mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Commit sequence number, strictly increasing per store
    pub seq: u64,
    pub id: String,
    pub revision: Revision,
    pub deleted: bool,
    /// Committed body; for deletions, the last live body
    pub document: Option<Document>,
}

/// Where a change stream starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Since {
    /// Only commits after the stream is opened
    #[default]
    Now,
    /// Replay every commit first
    Beginning,
    /// Replay commits after this sequence number
    Seq(u64),
}

impl Since {
    /// Sequence number after which history is replayed, given the head
    #[must_use]
    pub const fn checkpoint(self, head: u64) -> u64 {
        match self {
            Self::Now => head,
            Self::Beginning => 0,
            Self::Seq(seq) => seq,
        }
    }
}

/// Options for [`crate::store::DocumentStore::changes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangesOptions {
    /// Keep the stream open for future commits
    pub live: bool,
    pub since: Since,
    pub include_docs: bool,
}

impl Default for ChangesOptions {
    fn default() -> Self {
        Self {
            live: true,
            since: Since::Now,
            include_docs: true,
        }
    }
}

/// Ordered stream of changes: replayed history, then live commits
#[derive(Debug)]
pub struct ChangeStream {
    backlog: VecDeque<Change>,
    live: Option<mpsc::UnboundedReceiver<Change>>,
}

impl ChangeStream {
    /// Next change; `None` once a non-live stream is drained or the store
    /// is gone.
    pub async fn next(&mut self) -> Option<Change> {
        if let Some(change) = self.backlog.pop_front() {
            return Some(change);
        }
        match &mut self.live {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Next change if one is already available
    pub fn try_next(&mut self) -> Option<Change> {
        if let Some(change) = self.backlog.pop_front() {
            return Some(change);
        }
        self.live.as_mut()?.try_recv().ok()
    }
}

#[derive(Debug)]
struct FeedSubscriber {
    sender: mpsc::UnboundedSender<Change>,
    include_docs: bool,
}

/// Live subscribers of one store.
///
/// Stores call [`ChangeFeed::publish`] while still holding their commit
/// lock, so every subscriber sees changes in commit order.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Vec<FeedSubscriber>,
}

impl ChangeFeed {
    /// Deliver a change to every open stream, dropping closed ones
    pub fn publish(&mut self, change: &Change) {
        self.subscribers.retain(|subscriber| {
            subscriber
                .sender
                .send(shape(change.clone(), subscriber.include_docs))
                .is_ok()
        });
    }

    /// Open a stream that first yields `backlog`
    pub fn open(&mut self, options: ChangesOptions, backlog: Vec<Change>) -> ChangeStream {
        let backlog = backlog
            .into_iter()
            .map(|change| shape(change, options.include_docs))
            .collect();
        let live = options.live.then(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            self.subscribers.push(FeedSubscriber {
                sender,
                include_docs: options.include_docs,
            });
            receiver
        });
        ChangeStream { backlog, live }
    }

    /// Number of live streams still attached
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

fn shape(mut change: Change, include_docs: bool) -> Change {
    if !include_docs {
        change.document = None;
    }
    change
}
