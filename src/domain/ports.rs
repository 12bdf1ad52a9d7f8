//! Domain Ports - Store contract for the cluster aggregate
//!
//! These traits define the boundary between lifecycle logic and the
//! transactional datastore. Adapters implement them to provide persistence.
//!
//! Every write goes through a [`StoreTransaction`] obtained from
//! [`AggregateStore::begin`]; the handle is passed explicitly through each
//! step and consumed by `commit` or `rollback`.

use crate::error::Result;
use crate::model::{Cluster, ClusterNode, ClusterSecret, ClusterSpec, ClusterStatus, ClusterTool, Host};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Record Types
// =============================================================================

/// Table a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Cluster,
    Spec,
    Status,
    Secret,
    Node,
    Host,
    Tool,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Cluster => write!(f, "cluster"),
            RecordKind::Spec => write!(f, "spec"),
            RecordKind::Status => write!(f, "status"),
            RecordKind::Secret => write!(f, "secret"),
            RecordKind::Node => write!(f, "node"),
            RecordKind::Host => write!(f, "host"),
            RecordKind::Tool => write!(f, "tool"),
        }
    }
}

/// A single row destined for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Cluster(Cluster),
    Spec(ClusterSpec),
    Status(ClusterStatus),
    Secret(ClusterSecret),
    Node(ClusterNode),
    Host(Host),
    Tool(ClusterTool),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Cluster(_) => RecordKind::Cluster,
            Record::Spec(_) => RecordKind::Spec,
            Record::Status(_) => RecordKind::Status,
            Record::Secret(_) => RecordKind::Secret,
            Record::Node(_) => RecordKind::Node,
            Record::Host(_) => RecordKind::Host,
            Record::Tool(_) => RecordKind::Tool,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Cluster(r) => &r.id,
            Record::Spec(r) => &r.id,
            Record::Status(r) => &r.id,
            Record::Secret(r) => &r.id,
            Record::Node(r) => &r.id,
            Record::Host(r) => &r.id,
            Record::Tool(r) => &r.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Record::Cluster(r) => r.id = id,
            Record::Spec(r) => r.id = id,
            Record::Status(r) => r.id = id,
            Record::Secret(r) => r.id = id,
            Record::Node(r) => r.id = id,
            Record::Host(r) => r.id = id,
            Record::Tool(r) => r.id = id,
        }
    }
}

/// Relation eagerly attached when loading a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Spec,
    Status,
    Secret,
    /// Member nodes in creation order, each with its host resolved
    Nodes,
    Tools,
}

impl Relation {
    /// Every relation of the aggregate
    pub const ALL: [Relation; 5] = [
        Relation::Spec,
        Relation::Status,
        Relation::Secret,
        Relation::Nodes,
        Relation::Tools,
    ];
}

// =============================================================================
// Store Ports
// =============================================================================

/// Transaction handle
///
/// Writes are invisible to other readers until `commit` succeeds. A handle
/// dropped without `commit` discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a new row, assigning a fresh id when the record has none
    ///
    /// Returns the row id. Fails with `Conflict` on a duplicate id or a
    /// unique-constraint violation.
    async fn create(&mut self, record: Record) -> Result<String>;

    /// Insert or overwrite a row by id
    async fn save(&mut self, record: Record) -> Result<()>;

    /// Remove a row by id; removing an absent row is not an error
    async fn delete(&mut self, kind: RecordKind, id: &str) -> Result<()>;

    /// Read a host as seen by this transaction
    async fn find_host(&mut self, id: &str) -> Result<Host>;

    /// Move a host from owner `from` to owner `to`
    ///
    /// The current owner must equal `from`, both now and when the
    /// transaction commits; otherwise fails with `HostOwned` (or `Conflict`
    /// when the host has been released). Returns the host as updated.
    async fn transfer_host(&mut self, id: &str, from: Option<&str>, to: Option<&str>)
        -> Result<Host>;

    /// Apply every buffered write atomically
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every buffered write
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transactional persistence for cluster aggregates and hosts
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Load a cluster by id with the given relations attached
    async fn find_cluster(&self, id: &str, preload: &[Relation]) -> Result<Cluster>;

    /// Load a cluster by its unique name with the given relations attached
    async fn find_cluster_by_name(&self, name: &str, preload: &[Relation]) -> Result<Cluster>;

    /// List cluster roots without relations
    async fn list_clusters(&self) -> Result<Vec<Cluster>>;

    /// Load a committed host
    async fn find_host(&self, id: &str) -> Result<Host>;

    /// List committed hosts
    async fn list_hosts(&self) -> Result<Vec<Host>>;

    /// Add an unassigned host, returning its id
    async fn register_host(&self, host: Host) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_and_id() {
        let mut record = Record::Host(Host::new("node-1", "10.0.0.1"));
        assert_eq!(record.kind(), RecordKind::Host);
        assert_eq!(record.id(), "");

        record.set_id("h-1".into());
        assert_eq!(record.id(), "h-1");
    }

    #[test]
    fn test_record_kind_display() {
        assert_eq!(RecordKind::Spec.to_string(), "spec");
        assert_eq!(RecordKind::Tool.to_string(), "tool");
    }
}
