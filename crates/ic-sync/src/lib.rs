//! Intercept Rule Store Synchronization
//!
//! Applies the active profile to the host's live declarative rule store by
//! fully replacing the dynamic rule set: remove everything, verify, compile,
//! install in one batch, and fall back to an empty set on failure.
//!
//! # Modules
//!
//! - `store`: Collaborator traits (rule store, profile store, notifier) and in-memory implementations
//! - `file`: JSON-file-backed stores used by the CLI
//! - `config`: Synchronizer timing and compile options
//! - `error`: Store and synchronization errors
//! - `synchronizer`: The remove-verify-install protocol

pub mod config;
pub mod error;
pub mod file;
pub mod store;
pub mod synchronizer;

pub use config::SyncConfig;
pub use error::{StoreError, SyncError};
pub use file::{FileProfileStore, FileRuleStore};
pub use store::{
    MemoryNotifier, MemoryProfileStore, MemoryRuleStore, Message, Notifier, ProfileStore, RuleStore,
};
pub use store::apply_update;
pub use synchronizer::{Reply, SyncOutcome, Synchronizer};
