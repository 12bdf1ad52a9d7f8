//! Cluster Aggregate Model
//!
//! Data types for the cluster entity graph and the companion tool catalog.

pub mod cluster;
pub mod tool;

pub use cluster::*;
pub use tool::*;
