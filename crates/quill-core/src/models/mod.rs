//! Data models for Quill

mod document;
mod entry;

pub(crate) use entry::EntryBody;
pub use document::{Document, Revision};
pub use entry::{validate_entry_input, Entry, EntryDraft, EntryId, ENTRY_TYPE, MAX_TAGS};
