#![forbid(unsafe_code)]

//! Change-notifying values shared between UI components.
//!
//! [`Observable`] holds one value and tells its subscribers whenever that
//! value actually changes. [`Subscription`] is the RAII guard returned by
//! [`Observable::subscribe`]; dropping it detaches the callback.
//!
//! Everything here is single-threaded (`Rc<RefCell<..>>`): observables live
//! on the UI thread next to the components that read them. Callbacks are held
//! weakly by the observable and strongly by their subscription, so a
//! forgotten subscription never keeps a component alive, and dead callbacks
//! are pruned on the next notification.
//!
//! # Invariants
//!
//! 1. The version counter moves exactly once per notification.
//! 2. Callbacks run in subscription order, after the new value is stored.
//! 3. `set` with a value equal to the current one notifies nobody;
//!    `replace` always notifies.
//! 4. A callback whose [`Subscription`] was dropped never runs again.

pub mod observable;

pub use observable::{Observable, Subscription};
