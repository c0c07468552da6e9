#![forbid(unsafe_code)]

//! Natural: data plumbing for form- and list-heavy UI components.
//!
//! This crate re-exports the public surface of the workspace. Most users only
//! need the [`prelude`].
//!
//! ```ignore
//! use natural::prelude::*;
//!
//! let qvm = QueryVariablesManager::new();
//! qvm.set("pagination", Some(object(json!({"pagination": {"pageSize": 25}}))?));
//! ```

pub use natural_core;
#[cfg(feature = "runtime")]
pub use natural_runtime;

pub use natural_core::{Handle, Map, Value, ValueError};

pub mod prelude {
    //! Commonly used types.

    pub use natural_core::{Handle, Map, Value, object};

    #[cfg(feature = "runtime")]
    pub use natural_runtime::{
        AutoSave, CumulativeChanges, DebounceCoalescer, DebounceConfig, DebounceError,
        Observable, QueryVariablesManager, Subscription, UpdateTarget,
    };
}
