//! Subscribable consent state
//!
//! The store is the single in-memory source of truth for the visitor's
//! consent decisions. It seeds itself from the persisted record, hands
//! out snapshots to subscribers after every mutation, pushes effective
//! consents to tracking blockers and tag managers, and de-duplicates
//! the banner check so one page load makes at most one network call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod store;

pub use category::{
    default_categories, default_compliance, ComplianceRegion, ComplianceSettings,
    ConsentCategory, ConsentState,
};
pub use store::{
    ConsentStore, StoreConfig, StoreSnapshot, SubscriptionId, TagManagerAdapter, TrackingBlocker,
};
