//! TubeFocus Rule Synchronization Engine
//!
//! Keeps the browser's declarative rule table in step with the user's
//! block list. The settings store emits change notifications, the engine
//! coalesces them, gates on the enable flag, synthesizes the desired rule
//! set with `tf-core`, and reconciles the host's live table in one atomic
//! full-replace pass. The host has no transactions of its own; the
//! engine's single-flight gate is the only concurrency control.
//!
//! # Modules
//!
//! - `store`: settings store trait, keys, in-memory implementation
//! - `settings`: typed settings access, mode presets, the enable gate
//! - `host`: rule host trait and in-memory implementation
//! - `reconcile`: one full-replace reconciliation pass
//! - `engine`: serialized, debounced orchestration

pub mod engine;
pub mod host;
pub mod reconcile;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use engine::{SyncEngine, DEBOUNCE};
pub use host::{HostError, MemoryHost, RuleHost, UpdateRequest, DYNAMIC_RULE_QUOTA};
pub use reconcile::{reconcile, ReconcileOutcome, SyncError};
pub use settings::{Mode, Settings};
pub use store::{keys, MemoryStore, SettingsStore, StoreChange, StoreError};
