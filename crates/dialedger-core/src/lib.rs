//! Core types and trait definitions for the dialedger record store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod attachment;
pub mod entry;
pub mod error;
pub mod id;
pub mod metadata;
pub mod search;
pub mod store;
pub mod thread;
pub mod time;

pub use error::{Classify, Error, ErrorKind, Result};
pub use id::{AttachmentId, EntryId, ThreadId};
