#![forbid(unsafe_code)]

//! Data-access coordination for Natural components.
//!
//! UI components never talk to the network directly. They describe what they
//! want to list and what they edited, and this crate turns that into a small,
//! well-ordered set of queries and mutations:
//!
//! - [`QueryVariablesManager`]: independent widgets contribute named
//!   fragments of a list query's variables; one merged value is republished
//!   on every change.
//! - [`CumulativeChanges`]: reduces successive form snapshots to the fields
//!   touched since the last save.
//! - [`DebounceCoalescer`]: batches rapid partial updates of a record into a
//!   single update call after a quiet period, with flush and cancel controls.
//! - [`AutoSave`]: the last two wired together for one record.

pub mod autosave;
pub mod cumulative_changes;
pub mod debounce;
pub mod query_variables;
pub mod reactive;

pub use autosave::AutoSave;
pub use cumulative_changes::CumulativeChanges;
pub use debounce::{
    DebounceCoalescer, DebounceConfig, DebounceError, SharedUpdate, UpdateResult, UpdateTarget,
};
pub use query_variables::QueryVariablesManager;
pub use reactive::{Observable, Subscription};
