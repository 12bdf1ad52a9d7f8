//! Aggregate Store Adapters
//!
//! In-memory transactional implementation of [`AggregateStore`] with
//! optional JSON snapshot persistence, host seeding and fault injection.
//!
//! [`AggregateStore`]: crate::domain::ports::AggregateStore

mod fault;
mod memory;
mod seed;
mod snapshot;
mod tables;

pub use fault::{FaultPlan, StoreOp};
pub use memory::{MemoryStore, MemoryStoreConfig, MemoryTransaction};
pub use seed::{parse_hosts, seed_hosts};
pub use snapshot::{Snapshot, SNAPSHOT_FILE};
pub use tables::Tables;
