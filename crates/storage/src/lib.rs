//! Durable local storage for the consent SDK
//!
//! This crate models the browser's `localStorage` side-channel: an
//! unreliable key-value store the SDK reads and writes defensively.
//! The persisted consent record is a best-effort mirror, never the
//! source of truth once the in-memory store is initialized.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod kv;
pub mod record;

pub use adapter::{
    ConsentStorage, MemoryConsentStorage, SledConsentStorage, UnavailableStorage,
};
pub use kv::{KvConfig, KvError, KvStore};
pub use record::{
    epoch_millis, ConsentDecision, ConsentInfo, QueuedSubmission, StoredConsentRecord,
};
