//! Domain layer - Store port definitions
//!
//! This module defines the traits (ports) that persistence adapters
//! implement, following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
