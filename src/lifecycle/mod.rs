//! Cluster Lifecycle Module
//!
//! Atomic creation and deletion of cluster aggregates, with lifecycle
//! events and counters for observers.

pub mod events;
pub mod manager;
pub mod stats;

pub use events::*;
pub use manager::*;
pub use stats::*;
