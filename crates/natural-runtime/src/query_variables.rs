#![forbid(unsafe_code)]

//! Query-variable composition from independent contributors.
//!
//! A list view's query variables are assembled from several sources at once:
//! the paginator owns `pagination`, the column headers own `sorting`, the
//! search widget owns part of `filter`, the hosting component may pin a
//! condition of its own. Each source writes into its own named *channel*;
//! [`QueryVariablesManager`] merges all channels into one [`Map`] and
//! republishes it through an [`Observable`] on every change.
//!
//! # Merge order
//!
//! Channels merge in registration order, i.e. the order in which each name
//! was first given to [`set`](QueryVariablesManager::set),
//! [`merge`](QueryVariablesManager::merge) or
//! [`defaults`](QueryVariablesManager::defaults). Re-setting an existing
//! channel never moves it. Merging follows [`natural_core::merge_into`]:
//! nested objects combine, arrays and scalars from later channels replace
//! earlier ones.
//!
//! # Invariants
//!
//! 1. `variables()` always equals the left-to-right merge of every channel
//!    that currently holds a fragment.
//! 2. A channel set to `None` contributes nothing but keeps its position.
//! 3. Every call that changes a channel's fragment republishes, even when a
//!    later channel hides the change and the merged value comes out equal.
//!    A call that leaves the fragment as it was publishes nothing.
//! 4. Recomputation is synchronous: after any mutating call returns, the
//!    observable already holds the new merged value. Coalescing bursts of
//!    changes is the subscriber's business.
//! 5. Fragments are stored as independent copies; mutating the map passed in
//!    afterwards has no effect on the manager.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use natural_core::{Map, defaults_deep, merge_into, merged};

use crate::reactive::{Observable, Subscription};

#[derive(Debug, Clone)]
struct Channel {
    name: String,
    fragment: Option<Map>,
}

/// Named fragments of query variables, merged into one reactive value.
///
/// Clones share the same channels and the same observable.
#[derive(Clone)]
pub struct QueryVariablesManager {
    channels: Rc<RefCell<Vec<Channel>>>,
    variables: Observable<Map>,
}

impl QueryVariablesManager {
    /// Create a manager with no channels; its variables are an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Rc::new(RefCell::new(Vec::new())),
            variables: Observable::new(Map::new()),
        }
    }

    /// Create an independent manager seeded with a copy of `other`'s channels.
    ///
    /// Channel order is preserved. Later changes to either manager are not
    /// seen by the other.
    #[must_use]
    pub fn from_manager(other: &Self) -> Self {
        let channels = other.channels.borrow().clone();
        let manager = Self {
            channels: Rc::new(RefCell::new(channels)),
            variables: Observable::new(Map::new()),
        };
        manager.publish();
        manager
    }

    /// Replace the fragment of `channel`.
    ///
    /// `None` withdraws the channel's contribution without unregistering it.
    pub fn set(&self, channel: &str, fragment: Option<Map>) {
        let changed = self.with_channel(channel, |slot| *slot = fragment);
        tracing::trace!(channel, changed, "query variables channel set");
        if changed {
            self.publish();
        }
    }

    /// Merge `fragment` into the current fragment of `channel`.
    ///
    /// Nested objects combine and arrays are replaced. If the channel holds
    /// nothing yet this behaves like [`set`](Self::set).
    pub fn merge(&self, channel: &str, fragment: &Map) {
        let changed = self.with_channel(channel, |slot| match slot {
            Some(existing) => merge_into(existing, fragment),
            None => *slot = Some(fragment.clone()),
        });
        tracing::trace!(channel, changed, "query variables channel merged");
        if changed {
            self.publish();
        }
    }

    /// Fill keys of `channel`'s fragment that are not defined yet.
    ///
    /// If the channel holds nothing yet this behaves like [`set`](Self::set).
    pub fn defaults(&self, channel: &str, fragment: &Map) {
        let changed = self.with_channel(channel, |slot| match slot {
            Some(existing) => defaults_deep(existing, fragment),
            None => *slot = Some(fragment.clone()),
        });
        tracing::trace!(channel, changed, "query variables channel defaulted");
        if changed {
            self.publish();
        }
    }

    /// Copy of the fragment currently stored for `channel`.
    #[must_use]
    pub fn get(&self, channel: &str) -> Option<Map> {
        self.channels
            .borrow()
            .iter()
            .find(|c| c.name == channel)
            .and_then(|c| c.fragment.clone())
    }

    /// Registered channel names, in merge order.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.channels
            .borrow()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// The current merged variables.
    #[must_use]
    pub fn variables(&self) -> Map {
        self.variables.get()
    }

    /// The observable carrying the merged variables.
    #[must_use]
    pub fn observable(&self) -> &Observable<Map> {
        &self.variables
    }

    /// Subscribe to merged-variable changes.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, callback: impl Fn(&Map) + 'static) -> Subscription {
        self.variables.subscribe(callback)
    }

    /// Number of times the merged variables have been republished.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.variables.version()
    }

    /// Apply `f` to the fragment of `name`, registering the channel if
    /// needed. Returns whether the fragment changed.
    fn with_channel(&self, name: &str, f: impl FnOnce(&mut Option<Map>)) -> bool {
        let mut channels = self.channels.borrow_mut();
        let index = match channels.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                channels.push(Channel {
                    name: name.to_owned(),
                    fragment: None,
                });
                channels.len() - 1
            }
        };
        let slot = &mut channels[index].fragment;
        let before = slot.clone();
        f(slot);
        *slot != before
    }

    fn publish(&self) {
        let next = {
            let channels = self.channels.borrow();
            merged(channels.iter().filter_map(|c| c.fragment.as_ref()))
        };
        self.variables.replace(next);
    }
}

impl Default for QueryVariablesManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryVariablesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryVariablesManager")
            .field("channels", &self.channels())
            .field("version", &self.version())
            .finish()
    }
}
