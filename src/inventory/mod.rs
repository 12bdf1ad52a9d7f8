//! Provisioning Inventory Module
//!
//! Pure derivations over a loaded cluster aggregate: the grouped host
//! inventory and the provisioning variable projection.

pub mod builder;
pub mod vars;

pub use builder::*;
pub use vars::*;
