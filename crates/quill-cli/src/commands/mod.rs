pub mod add;
pub mod archive;
pub mod common;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod tags;
pub mod watch;
