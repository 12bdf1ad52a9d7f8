//! In-Memory Aggregate Store
//!
//! Transactional store backed by ordered in-memory tables. Transactions work
//! on a private copy of the tables and buffer their writes; commit replays
//! the buffered writes against the latest committed state, so constraint
//! violations between concurrent transactions surface at commit time.

use crate::domain::ports::{AggregateStore, Record, RecordKind, Relation, StoreTransaction};
use crate::error::{Error, Result};
use crate::model::{Cluster, Host};
use crate::store::fault::{FaultPlan, StoreOp};
use crate::store::snapshot::Snapshot;
use crate::store::tables::{Tables, WriteOp};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

// =============================================================================
// Memory Store Configuration
// =============================================================================

/// Configuration for the memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// Directory holding the JSON snapshot; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
}

// =============================================================================
// Memory Store
// =============================================================================

struct Shared {
    /// Committed state
    tables: RwLock<Tables>,
    /// Serializes commits, including the snapshot write
    commit_lock: Mutex<()>,
    snapshot: Option<Snapshot>,
    faults: FaultPlan,
    commits: AtomicU64,
}

/// Cloneable handle to an in-memory transactional store
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self::from_parts(Tables::default(), None)
    }

    /// Open a store, loading the snapshot from the data directory if any
    pub async fn open(config: MemoryStoreConfig) -> Result<Self> {
        match config.data_dir {
            Some(dir) => {
                let snapshot = Snapshot::in_dir(dir);
                let tables = snapshot.load().await?;
                Ok(Self::from_parts(tables, Some(snapshot)))
            }
            None => Ok(Self::new()),
        }
    }

    fn from_parts(tables: Tables, snapshot: Option<Snapshot>) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(tables),
                commit_lock: Mutex::new(()),
                snapshot,
                faults: FaultPlan::new(),
                commits: AtomicU64::new(0),
            }),
        }
    }

    /// Fault plan consulted by every store operation
    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }

    /// Copy of the committed tables
    pub fn tables(&self) -> Tables {
        self.shared.tables.read().clone()
    }

    /// Number of committed rows of one kind
    pub fn count(&self, kind: RecordKind) -> usize {
        self.shared.tables.read().len(kind)
    }

    /// Number of successful commits since the store was opened
    pub fn commit_count(&self) -> u64 {
        self.shared.commits.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        self.shared.faults.check(StoreOp::Begin, None)?;
        let working = self.shared.tables.read().clone();
        trace!("Transaction opened");
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            working,
            ops: Vec::new(),
        }))
    }

    async fn find_cluster(&self, id: &str, preload: &[Relation]) -> Result<Cluster> {
        self.shared.tables.read().load_cluster(id, preload)
    }

    async fn find_cluster_by_name(&self, name: &str, preload: &[Relation]) -> Result<Cluster> {
        let tables = self.shared.tables.read();
        let id = tables
            .cluster_id_by_name(name)
            .ok_or_else(|| Error::not_found(RecordKind::Cluster, name))?;
        tables.load_cluster(id, preload)
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        Ok(self.shared.tables.read().clusters().values().cloned().collect())
    }

    async fn find_host(&self, id: &str) -> Result<Host> {
        self.shared.tables.read().host(id)
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        Ok(self.shared.tables.read().hosts().values().cloned().collect())
    }

    async fn register_host(&self, host: Host) -> Result<String> {
        let mut tx = self.begin().await?;
        let id = match tx.create(Record::Host(host)).await {
            Ok(id) => id,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };
        tx.commit().await?;
        Ok(id)
    }
}

// =============================================================================
// Memory Transaction
// =============================================================================

/// Transaction over a private copy of the tables
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    /// Committed state at `begin` plus this transaction's writes
    working: Tables,
    ops: Vec<WriteOp>,
}

impl MemoryTransaction {
    fn record(&mut self, op: WriteOp) -> Result<()> {
        self.working.apply(op.clone())?;
        self.ops.push(op);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn create(&mut self, mut record: Record) -> Result<String> {
        self.shared.faults.check(StoreOp::Create, Some(record.kind()))?;

        if record.id().is_empty() {
            record.set_id(uuid::Uuid::new_v4().to_string());
        }
        let id = record.id().to_string();
        trace!("create {}/{}", record.kind(), id);

        self.record(WriteOp::Create(record))?;
        Ok(id)
    }

    async fn save(&mut self, mut record: Record) -> Result<()> {
        self.shared.faults.check(StoreOp::Save, Some(record.kind()))?;

        if record.id().is_empty() {
            return Err(Error::Store(format!("cannot save {} without an id", record.kind())));
        }
        match &mut record {
            Record::Cluster(c) => c.updated_at = Utc::now(),
            Record::Host(h) => h.updated_at = Utc::now(),
            _ => {}
        }
        trace!("save {}/{}", record.kind(), record.id());

        self.record(WriteOp::Save(record))
    }

    async fn delete(&mut self, kind: RecordKind, id: &str) -> Result<()> {
        self.shared.faults.check(StoreOp::Delete, Some(kind))?;
        trace!("delete {}/{}", kind, id);
        self.record(WriteOp::Delete(kind, id.to_string()))
    }

    async fn find_host(&mut self, id: &str) -> Result<Host> {
        self.working.host(id)
    }

    async fn transfer_host(
        &mut self,
        id: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Host> {
        self.shared.faults.check(StoreOp::Save, Some(RecordKind::Host))?;
        trace!("transfer host/{} {:?} -> {:?}", id, from, to);

        self.record(WriteOp::Transfer {
            host_id: id.to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        })?;
        self.working.host(id)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.shared.faults.check(StoreOp::Commit, None)?;

        let _guard = self.shared.commit_lock.lock().await;
        let mut next = self.shared.tables.read().clone();
        for op in self.ops.iter().cloned() {
            next.apply(op)?;
        }

        if let Some(snapshot) = &self.shared.snapshot {
            snapshot
                .write(&next)
                .await
                .map_err(|e| Error::Store(format!("snapshot write failed: {}", e)))?;
        }

        *self.shared.tables.write() = next;
        self.shared.commits.fetch_add(1, Ordering::Relaxed);
        debug!("Transaction committed ({} writes)", self.ops.len());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.shared.faults.check(StoreOp::Rollback, None)?;
        debug!("Transaction rolled back ({} writes discarded)", self.ops.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClusterSpec;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn named_cluster(name: &str) -> Cluster {
        let mut cluster = Cluster::new(name);
        cluster.id = uuid::Uuid::new_v4().to_string();
        cluster
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let id = tx.create(Record::Spec(ClusterSpec::default())).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.count(RecordKind::Spec), 0);

        tx.commit().await.unwrap();
        assert_eq!(store.count(RecordKind::Spec), 1);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create(Record::Spec(ClusterSpec::default())).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.tables().total_rows(), 0);
    }

    #[tokio::test]
    async fn test_transaction_reads_own_writes() {
        let store = MemoryStore::new();
        let host_id = store.register_host(Host::new("node-1", "10.0.0.1")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut host = tx.find_host(&host_id).await.unwrap();
        host.cluster_id = Some("c-1".into());
        tx.save(Record::Host(host)).await.unwrap();

        let seen = tx.find_host(&host_id).await.unwrap();
        assert_eq!(seen.cluster_id.as_deref(), Some("c-1"));
        assert!(!store.find_host(&host_id).await.unwrap().is_assigned());

        tx.commit().await.unwrap();
        assert!(store.find_host(&host_id).await.unwrap().is_assigned());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_name_fails_at_commit() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.create(Record::Cluster(named_cluster("prod"))).await.unwrap();
        second.create(Record::Cluster(named_cluster("prod"))).await.unwrap();

        first.commit().await.unwrap();
        assert_matches!(
            second.commit().await,
            Err(Error::Conflict { kind: RecordKind::Cluster, .. })
        );
        assert_eq!(store.count(RecordKind::Cluster), 1);
    }

    #[tokio::test]
    async fn test_concurrent_host_claim_fails_at_commit() {
        let store = MemoryStore::new();
        let host_id = store.register_host(Host::new("node-1", "10.0.0.1")).await.unwrap();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.transfer_host(&host_id, None, Some("c-1")).await.unwrap();
        second.transfer_host(&host_id, None, Some("c-2")).await.unwrap();

        first.commit().await.unwrap();
        assert_matches!(
            second.commit().await,
            Err(Error::HostOwned { ref cluster, .. }) if cluster == "c-1"
        );
        let host = store.find_host(&host_id).await.unwrap();
        assert_eq!(host.cluster_id.as_deref(), Some("c-1"));
        assert_eq!(host.name, "node-1");
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let store = MemoryStore::new();
        store.faults().fail_next(StoreOp::Commit, None);

        let mut tx = store.begin().await.unwrap();
        tx.create(Record::Spec(ClusterSpec::default())).await.unwrap();
        assert_matches!(tx.commit().await, Err(Error::Store(_)));
        assert_eq!(store.count(RecordKind::Spec), 0);
    }

    #[tokio::test]
    async fn test_find_cluster_missing() {
        let store = MemoryStore::new();
        assert_matches!(
            store.find_cluster("nope", &Relation::ALL).await,
            Err(Error::NotFound { kind: RecordKind::Cluster, .. })
        );
        assert_matches!(
            store.find_cluster_by_name("nope", &[]).await,
            Err(Error::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let tmp = TempDir::new().unwrap();
        let config = MemoryStoreConfig {
            data_dir: Some(tmp.path().to_path_buf()),
        };

        {
            let store = MemoryStore::open(config.clone()).await.unwrap();
            store.register_host(Host::new("node-1", "10.0.0.1")).await.unwrap();
        }

        let reopened = MemoryStore::open(config).await.unwrap();
        let hosts = reopened.list_hosts().await.unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].name, "node-1");
    }

    #[test]
    fn test_blocking_lookup() {
        let store = MemoryStore::new();
        let id = tokio_test::block_on(store.register_host(Host::new("node-1", "10.0.0.1"))).unwrap();
        let host = tokio_test::block_on(store.find_host(&id)).unwrap();
        assert_eq!(host.ip, "10.0.0.1");
    }
}
