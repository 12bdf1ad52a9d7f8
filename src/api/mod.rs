//! API Module
//!
//! REST surface over the lifecycle manager.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
