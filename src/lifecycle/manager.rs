//! Lifecycle Manager
//!
//! Creates and deletes cluster aggregates atomically. Every step of an
//! operation runs on one transaction handle that is passed explicitly;
//! any failing step triggers a rollback on that handle before the original
//! error is returned to the caller. No step is retried.

use crate::domain::ports::{AggregateStore, Record, RecordKind, Relation, StoreTransaction};
use crate::error::{Error, Result};
use crate::inventory::{Inventory, InventoryBuilder, ProvisionVars, VariableProjector};
use crate::lifecycle::events::LifecycleEvent;
use crate::lifecycle::stats::{LifecycleStats, LifecycleStatsSnapshot};
use crate::model::{Cluster, ToolCatalog};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Relations loaded before a delete
const DELETE_PRELOAD: [Relation; 4] = [
    Relation::Status,
    Relation::Spec,
    Relation::Nodes,
    Relation::Tools,
];

/// Orchestrates creation and deletion of cluster aggregates
pub struct LifecycleManager {
    store: Arc<dyn AggregateStore>,
    catalog: ToolCatalog,
    stats: LifecycleStats,
    event_sender: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleManager {
    /// Create a manager using the built-in tool catalog
    pub fn new(store: Arc<dyn AggregateStore>) -> Arc<Self> {
        Self::with_catalog(store, ToolCatalog::builtin())
    }

    /// Create a manager with an explicit tool catalog
    pub fn with_catalog(store: Arc<dyn AggregateStore>, catalog: ToolCatalog) -> Arc<Self> {
        let (event_sender, _) = broadcast::channel(1024);
        Arc::new(Self {
            store,
            catalog,
            stats: LifecycleStats::default(),
            event_sender,
        })
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_sender.subscribe()
    }

    pub fn stats(&self) -> LifecycleStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.store
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Persist a new cluster aggregate
    ///
    /// The input carries the specification, status, secret and member nodes
    /// (each naming its target host). On success the returned cluster holds
    /// every assigned id, the bound hosts and the instantiated tools. On
    /// failure nothing is persisted.
    pub async fn create(&self, cluster: Cluster) -> Result<Cluster> {
        let mut cluster = cluster;
        cluster.id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = validate(&cluster) {
            return Err(self.create_failed(&cluster, e));
        }
        info!("Creating cluster {} ({})", cluster.name, cluster.id);

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.create_failed(&cluster, e)),
        };

        if let Err(e) = self.persist_aggregate(tx.as_mut(), &mut cluster).await {
            self.abort(tx, &cluster.id, &e).await;
            return Err(self.create_failed(&cluster, e));
        }

        // A failed commit consumes the handle and applies nothing
        if let Err(e) = tx.commit().await {
            return Err(self.create_failed(&cluster, e));
        }

        LifecycleStats::incr(&self.stats.creates);
        for node in &cluster.nodes {
            let _ = self.event_sender.send(LifecycleEvent::HostAssigned {
                cluster_id: cluster.id.clone(),
                host_id: node.host_id.clone(),
            });
        }
        let _ = self.event_sender.send(LifecycleEvent::ClusterCreated {
            cluster_id: cluster.id.clone(),
            name: cluster.name.clone(),
            node_count: cluster.nodes.len() as u32,
            tool_count: cluster.tools.len() as u32,
        });

        info!(
            "Cluster {} created with {} nodes and {} tools",
            cluster.name,
            cluster.nodes.len(),
            cluster.tools.len()
        );
        Ok(cluster)
    }

    async fn persist_aggregate(
        &self,
        tx: &mut dyn StoreTransaction,
        cluster: &mut Cluster,
    ) -> Result<()> {
        let spec_id = tx.create(Record::Spec(cluster.spec.clone())).await?;
        cluster.spec.id = spec_id.clone();
        cluster.spec_id = Some(spec_id);

        let status_id = tx.create(Record::Status(cluster.status.clone())).await?;
        cluster.status.id = status_id.clone();
        cluster.status_id = Some(status_id);

        let secret_id = tx.create(Record::Secret(cluster.secret.clone())).await?;
        cluster.secret.id = secret_id.clone();
        cluster.secret_id = Some(secret_id);

        tx.create(Record::Cluster(cluster.clone())).await?;

        for node in cluster.nodes.iter_mut() {
            node.cluster_id = cluster.id.clone();
            node.id = tx.create(Record::Node(node.to_row())).await?;

            let host = tx
                .transfer_host(&node.host_id, None, Some(cluster.id.as_str()))
                .await?;
            debug!("Host {} bound to cluster {}", host.name, cluster.id);
            node.host = Some(host);
        }

        let mut tools = self.catalog.instantiate(&cluster.id);
        for tool in tools.iter_mut() {
            tool.id = tx.create(Record::Tool(tool.clone())).await?;
        }
        cluster.tools = tools;

        Ok(())
    }

    fn create_failed(&self, cluster: &Cluster, e: Error) -> Error {
        LifecycleStats::incr(&self.stats.create_failures);
        warn!("Create of cluster {} aborted: {}", cluster.name, e);
        let _ = self.event_sender.send(LifecycleEvent::CreateAborted {
            cluster_id: cluster.id.clone(),
            name: cluster.name.clone(),
            reason: e.to_string(),
        });
        e
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove a cluster aggregate and release its hosts
    ///
    /// Specification, status, secret, nodes, tools and the cluster row are
    /// removed in one transaction, and every member host is unassigned in
    /// that same transaction.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let cluster = self.store.find_cluster(id, &DELETE_PRELOAD).await?;
        info!("Deleting cluster {} ({})", cluster.name, cluster.id);

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                LifecycleStats::incr(&self.stats.delete_failures);
                return Err(e);
            }
        };

        let released = match self.remove_aggregate(tx.as_mut(), &cluster).await {
            Ok(released) => released,
            Err(e) => {
                self.abort(tx, &cluster.id, &e).await;
                LifecycleStats::incr(&self.stats.delete_failures);
                warn!("Delete of cluster {} aborted: {}", cluster.name, e);
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            LifecycleStats::incr(&self.stats.delete_failures);
            warn!("Delete of cluster {} failed at commit: {}", cluster.name, e);
            return Err(e);
        }

        LifecycleStats::incr(&self.stats.deletes);
        for host_id in released {
            let _ = self.event_sender.send(LifecycleEvent::HostReleased {
                cluster_id: cluster.id.clone(),
                host_id,
            });
        }
        let _ = self.event_sender.send(LifecycleEvent::ClusterDeleted {
            cluster_id: cluster.id.clone(),
            name: cluster.name.clone(),
        });

        info!("Cluster {} deleted", cluster.name);
        Ok(())
    }

    /// Returns the ids of the hosts released
    async fn remove_aggregate(
        &self,
        tx: &mut dyn StoreTransaction,
        cluster: &Cluster,
    ) -> Result<Vec<String>> {
        if let Some(spec_id) = &cluster.spec_id {
            tx.delete(RecordKind::Spec, spec_id).await?;
        }
        if let Some(status_id) = &cluster.status_id {
            tx.delete(RecordKind::Status, status_id).await?;
        }
        if let Some(secret_id) = &cluster.secret_id {
            tx.delete(RecordKind::Secret, secret_id).await?;
        }

        let mut released = Vec::new();
        for node in &cluster.nodes {
            tx.delete(RecordKind::Node, &node.id).await?;

            let host = match tx.find_host(&node.host_id).await {
                Ok(host) => host,
                Err(Error::NotFound { .. }) => {
                    warn!("Host {} of node {} no longer exists", node.host_id, node.name);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if host.cluster_id.as_deref() == Some(cluster.id.as_str()) {
                tx.transfer_host(&node.host_id, Some(cluster.id.as_str()), None)
                    .await?;
                released.push(node.host_id.clone());
            }
        }

        for tool in &cluster.tools {
            tx.delete(RecordKind::Tool, &tool.id).await?;
        }

        tx.delete(RecordKind::Cluster, &cluster.id).await?;
        Ok(released)
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Roll back a failed operation
    ///
    /// A failing rollback is logged and counted; the caller still returns
    /// the error of the step that failed.
    async fn abort(&self, tx: Box<dyn StoreTransaction>, cluster_id: &str, cause: &Error) {
        LifecycleStats::incr(&self.stats.rollbacks);
        if let Err(e) = tx.rollback().await {
            LifecycleStats::incr(&self.stats.rollback_failures);
            error!(
                "Rollback failed for cluster {} after '{}': {}",
                cluster_id, cause, e
            );
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load a fully populated aggregate
    pub async fn get(&self, id: &str) -> Result<Cluster> {
        self.store.find_cluster(id, &Relation::ALL).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Cluster> {
        self.store.find_cluster_by_name(name, &Relation::ALL).await
    }

    /// List cluster roots without relations
    pub async fn list(&self) -> Result<Vec<Cluster>> {
        self.store.list_clusters().await
    }

    /// Derive the provisioning inventory of a cluster
    pub async fn inventory(&self, id: &str) -> Result<Inventory> {
        let cluster = self.store.find_cluster(id, &[Relation::Nodes]).await?;
        Ok(InventoryBuilder::build(&cluster))
    }

    /// Project the provisioning variables of a cluster
    pub async fn vars(&self, id: &str) -> Result<ProvisionVars> {
        let cluster = self.store.find_cluster(id, &[Relation::Spec]).await?;
        Ok(VariableProjector::project(&cluster.spec))
    }
}

/// Reject requests no store write could satisfy
fn validate(cluster: &Cluster) -> Result<()> {
    if cluster.name.trim().is_empty() {
        return Err(Error::Validation("cluster name must not be empty".into()));
    }

    let mut names = HashSet::new();
    let mut hosts = HashSet::new();
    for node in &cluster.nodes {
        if !names.insert(node.name.as_str()) {
            return Err(Error::Validation(format!("duplicate node name {}", node.name)));
        }
        if !hosts.insert(node.host_id.as_str()) {
            return Err(Error::Validation(format!(
                "host {} referenced by more than one node",
                node.host_id
            )));
        }
    }
    Ok(())
}
