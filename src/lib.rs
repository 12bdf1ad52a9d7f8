//! Cluster Lifecycle - Aggregate Store and Provisioning Inventory
//!
//! Manages the lifecycle of cluster aggregates inside a transactional store
//! and derives from them the inventory consumed by the cluster bring-up
//! engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          REST API (axum)                            │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │
//!                   ┌────────────┴────────────┐
//!                   │    Lifecycle Manager    │
//!                   │  create / delete / read │
//!                   └──────┬───────────┬──────┘
//!                          │           │
//!          ┌───────────────┴───┐   ┌───┴──────────────────────────────┐
//!          │  Aggregate Store  │   │  Inventory Builder               │
//!          │  (transactional)  │   │  Variable Projector              │
//!          └───────────────────┘   └──────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST surface and server
//! - [`domain`]: Store ports
//! - [`inventory`]: Inventory and provisioning variable derivation
//! - [`lifecycle`]: Atomic create/delete orchestration
//! - [`model`]: Cluster aggregate types and the companion tool catalog
//! - [`store`]: In-memory transactional store
//! - [`error`]: Error types and handling

pub mod api;
pub mod domain;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod model;
pub mod store;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use domain::ports::{AggregateStore, Record, RecordKind, Relation, StoreTransaction};

pub use error::{Error, Result};

pub use inventory::{
    GroupDescriptor, HostDescriptor, Inventory, InventoryBuilder, ProvisionVars,
    VariableProjector,
};

pub use lifecycle::{LifecycleEvent, LifecycleManager, LifecycleStatsSnapshot};

pub use model::{
    Cluster, ClusterNode, ClusterPhase, ClusterSecret, ClusterSpec, ClusterStatus, ClusterTool,
    Host, HostCredential, NodeRole, ToolCatalog,
};

pub use store::{MemoryStore, MemoryStoreConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
