//! quill-core - Core library for Quill
//!
//! This crate holds the journal entry model, the document store adapters and
//! their derived views, the conflict-retrying document operations, and the
//! capability layer that hands those operations out as message-driven
//! handlers.

pub mod capability;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod ops;
pub mod queries;
pub mod registry;
pub mod store;
pub mod util;
pub mod views;

pub use capability::{Capability, Listener, SubscribeOptions, Subscription, Vat};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use models::{Entry, EntryId, Revision};
pub use ops::{EditOutcome, EntryStore, RetryPolicy};
pub use queries::{ListOptions, TagCount, TimeBucket};
pub use registry::Rights;
pub use store::{DocumentStore, MemoryStore, SqliteStore};
