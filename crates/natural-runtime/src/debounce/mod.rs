#![forbid(unsafe_code)]

//! Debounced, coalesced record updates.
//!
//! Forms that save as the user types would otherwise issue one mutation per
//! keystroke. A [`DebounceCoalescer`] collects the partial updates of each
//! record for a quiet period and sends them as a single
//! [`UpdateTarget::update_now`] call.
//!
//! Construct one coalescer per application and share it (behind an `Arc`)
//! with every component that edits records, so that edits of the same record
//! from different places end up in the same pending update, and so that
//! "flush everything before leaving" sees all of them.
//!
//! ```ignore
//! let coalescer = Arc::new(DebounceCoalescer::new(DebounceConfig::default()));
//! let saved = coalescer.debounce(&users, "42", fields);
//! // ... on navigation:
//! coalescer.flush().await;
//! ```

pub mod coalescer;
pub mod config;
pub mod target;

pub use coalescer::{DebounceCoalescer, SharedUpdate, UpdateResult};
pub use config::{ConfigError, DEFAULT_QUIET_PERIOD, DebounceConfig};
pub use target::{DebounceError, UpdateTarget};
