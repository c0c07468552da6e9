#![forbid(unsafe_code)]

//! Core value model for Natural.
//!
//! Query variables, form snapshots and partial update payloads are all
//! expressed as [`Map`]s of dynamic [`Value`]s. This crate owns that model
//! and the two operations every higher layer builds on:
//!
//! - recursive merging ([`merge::merge_into`], [`merge::defaults_deep`]);
//! - identity-aware equality, where resource [`Handle`]s are shared rather
//!   than copied and compare by reference.

pub mod merge;
pub mod value;

pub use merge::{defaults_deep, merge_into, merged};
pub use value::{Handle, Map, Value, ValueError, object};
