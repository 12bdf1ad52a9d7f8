//! In-Memory Tables
//!
//! One ordered map per record kind. Insertion order is kept so that eager
//! loads return member nodes in creation order.

use crate::domain::ports::{Record, RecordKind, Relation};
use crate::error::{Error, Result};
use crate::model::{Cluster, ClusterNode, ClusterSecret, ClusterSpec, ClusterStatus, ClusterTool, Host};
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Buffered write recorded by a transaction
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Create(Record),
    Save(Record),
    Delete(RecordKind, String),
    /// Owner change that only applies while the host is still held by `from`
    Transfer {
        host_id: String,
        from: Option<String>,
        to: Option<String>,
    },
}

/// Every table of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    clusters: IndexMap<String, Cluster>,
    specs: IndexMap<String, ClusterSpec>,
    statuses: IndexMap<String, ClusterStatus>,
    secrets: IndexMap<String, ClusterSecret>,
    nodes: IndexMap<String, ClusterNode>,
    hosts: IndexMap<String, Host>,
    tools: IndexMap<String, ClusterTool>,
}

impl Tables {
    pub fn clusters(&self) -> &IndexMap<String, Cluster> {
        &self.clusters
    }

    pub fn specs(&self) -> &IndexMap<String, ClusterSpec> {
        &self.specs
    }

    pub fn statuses(&self) -> &IndexMap<String, ClusterStatus> {
        &self.statuses
    }

    pub fn secrets(&self) -> &IndexMap<String, ClusterSecret> {
        &self.secrets
    }

    pub fn nodes(&self) -> &IndexMap<String, ClusterNode> {
        &self.nodes
    }

    pub fn hosts(&self) -> &IndexMap<String, Host> {
        &self.hosts
    }

    pub fn tools(&self) -> &IndexMap<String, ClusterTool> {
        &self.tools
    }

    /// Number of rows in one table
    pub fn len(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Cluster => self.clusters.len(),
            RecordKind::Spec => self.specs.len(),
            RecordKind::Status => self.statuses.len(),
            RecordKind::Secret => self.secrets.len(),
            RecordKind::Node => self.nodes.len(),
            RecordKind::Host => self.hosts.len(),
            RecordKind::Tool => self.tools.len(),
        }
    }

    /// Total number of rows across all tables
    pub fn total_rows(&self) -> usize {
        [
            RecordKind::Cluster,
            RecordKind::Spec,
            RecordKind::Status,
            RecordKind::Secret,
            RecordKind::Node,
            RecordKind::Host,
            RecordKind::Tool,
        ]
        .iter()
        .map(|k| self.len(*k))
        .sum()
    }

    pub fn contains(&self, kind: RecordKind, id: &str) -> bool {
        match kind {
            RecordKind::Cluster => self.clusters.contains_key(id),
            RecordKind::Spec => self.specs.contains_key(id),
            RecordKind::Status => self.statuses.contains_key(id),
            RecordKind::Secret => self.secrets.contains_key(id),
            RecordKind::Node => self.nodes.contains_key(id),
            RecordKind::Host => self.hosts.contains_key(id),
            RecordKind::Tool => self.tools.contains_key(id),
        }
    }

    /// Apply one write, enforcing primary-key and unique-name constraints
    pub(crate) fn apply(&mut self, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::Create(record) => {
                if self.contains(record.kind(), record.id()) {
                    return Err(Error::Conflict {
                        kind: record.kind(),
                        name: record.id().to_string(),
                    });
                }
                self.upsert(record)
            }
            WriteOp::Save(record) => self.upsert(record),
            WriteOp::Delete(kind, id) => {
                self.remove(kind, &id);
                Ok(())
            }
            WriteOp::Transfer { host_id, from, to } => {
                self.transfer_host(&host_id, from.as_deref(), to)?;
                Ok(())
            }
        }
    }

    /// Compare-and-set the owner of a host
    pub(crate) fn transfer_host(
        &mut self,
        id: &str,
        from: Option<&str>,
        to: Option<String>,
    ) -> Result<&Host> {
        let host = self
            .hosts
            .get_mut(id)
            .ok_or_else(|| Error::not_found(RecordKind::Host, id))?;
        if host.cluster_id.as_deref() != from {
            return Err(match &host.cluster_id {
                Some(owner) => Error::HostOwned {
                    host: id.to_string(),
                    cluster: owner.clone(),
                },
                None => Error::Conflict {
                    kind: RecordKind::Host,
                    name: id.to_string(),
                },
            });
        }
        host.cluster_id = to;
        host.updated_at = Utc::now();
        Ok(host)
    }

    fn upsert(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Cluster(cluster) => {
                if let Some(existing) = self
                    .clusters
                    .values()
                    .find(|c| c.name == cluster.name && c.id != cluster.id)
                {
                    return Err(Error::Conflict {
                        kind: RecordKind::Cluster,
                        name: existing.name.clone(),
                    });
                }
                self.clusters.insert(cluster.id.clone(), cluster.to_row());
            }
            Record::Spec(spec) => {
                self.specs.insert(spec.id.clone(), spec);
            }
            Record::Status(status) => {
                self.statuses.insert(status.id.clone(), status);
            }
            Record::Secret(secret) => {
                self.secrets.insert(secret.id.clone(), secret);
            }
            Record::Node(node) => {
                self.nodes.insert(node.id.clone(), node.to_row());
            }
            Record::Host(host) => {
                self.hosts.insert(host.id.clone(), host);
            }
            Record::Tool(tool) => {
                self.tools.insert(tool.id.clone(), tool);
            }
        }
        Ok(())
    }

    fn remove(&mut self, kind: RecordKind, id: &str) {
        match kind {
            RecordKind::Cluster => {
                self.clusters.shift_remove(id);
            }
            RecordKind::Spec => {
                self.specs.shift_remove(id);
            }
            RecordKind::Status => {
                self.statuses.shift_remove(id);
            }
            RecordKind::Secret => {
                self.secrets.shift_remove(id);
            }
            RecordKind::Node => {
                self.nodes.shift_remove(id);
            }
            RecordKind::Host => {
                self.hosts.shift_remove(id);
            }
            RecordKind::Tool => {
                self.tools.shift_remove(id);
            }
        }
    }

    pub fn host(&self, id: &str) -> Result<Host> {
        self.hosts
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Host, id))
    }

    pub fn cluster_id_by_name(&self, name: &str) -> Option<&str> {
        self.clusters
            .values()
            .find(|c| c.name == name)
            .map(|c| c.id.as_str())
    }

    /// Load a cluster row and attach the requested relations
    pub fn load_cluster(&self, id: &str, preload: &[Relation]) -> Result<Cluster> {
        let mut cluster = self
            .clusters
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Cluster, id))?;

        for relation in preload {
            match relation {
                Relation::Spec => {
                    if let Some(spec) = cluster.spec_id.as_ref().and_then(|sid| self.specs.get(sid)) {
                        cluster.spec = spec.clone();
                    }
                }
                Relation::Status => {
                    if let Some(status) =
                        cluster.status_id.as_ref().and_then(|sid| self.statuses.get(sid))
                    {
                        cluster.status = status.clone();
                    }
                }
                Relation::Secret => {
                    if let Some(secret) =
                        cluster.secret_id.as_ref().and_then(|sid| self.secrets.get(sid))
                    {
                        cluster.secret = secret.clone();
                    }
                }
                Relation::Nodes => {
                    cluster.nodes = self
                        .nodes
                        .values()
                        .filter(|n| n.cluster_id == cluster.id)
                        .map(|n| ClusterNode {
                            host: self.hosts.get(&n.host_id).cloned(),
                            ..n.clone()
                        })
                        .collect();
                }
                Relation::Tools => {
                    cluster.tools = self
                        .tools
                        .values()
                        .filter(|t| t.cluster_id == cluster.id)
                        .cloned()
                        .collect();
                }
            }
        }

        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeRole;
    use assert_matches::assert_matches;

    fn cluster(id: &str, name: &str) -> Cluster {
        let mut c = Cluster::new(name);
        c.id = id.into();
        c
    }

    #[test]
    fn test_unique_cluster_name() {
        let mut tables = Tables::default();
        tables
            .apply(WriteOp::Create(Record::Cluster(cluster("c-1", "prod"))))
            .unwrap();

        let result = tables.apply(WriteOp::Create(Record::Cluster(cluster("c-2", "prod"))));
        assert_matches!(result, Err(Error::Conflict { kind: RecordKind::Cluster, .. }));
        assert_eq!(tables.len(RecordKind::Cluster), 1);

        // Saving the same row again is not a conflict with itself
        tables
            .apply(WriteOp::Save(Record::Cluster(cluster("c-1", "prod"))))
            .unwrap();
    }

    #[test]
    fn test_transfer_requires_expected_owner() {
        let mut tables = Tables::default();
        let host = Host {
            id: "h-1".into(),
            ..Host::new("n1", "10.0.0.1")
        };
        tables.apply(WriteOp::Create(Record::Host(host))).unwrap();

        let claim = |to: &str| WriteOp::Transfer {
            host_id: "h-1".into(),
            from: None,
            to: Some(to.into()),
        };
        tables.apply(claim("c-1")).unwrap();
        assert_matches!(
            tables.apply(claim("c-2")),
            Err(Error::HostOwned { ref cluster, .. }) if cluster == "c-1"
        );
        assert_eq!(tables.host("h-1").unwrap().cluster_id.as_deref(), Some("c-1"));

        let release = WriteOp::Transfer {
            host_id: "h-1".into(),
            from: Some("c-1".into()),
            to: None,
        };
        tables.apply(release.clone()).unwrap();
        assert!(!tables.host("h-1").unwrap().is_assigned());
        assert_matches!(
            tables.apply(release),
            Err(Error::Conflict { kind: RecordKind::Host, .. })
        );

        assert_matches!(
            tables.apply(WriteOp::Transfer {
                host_id: "missing".into(),
                from: None,
                to: Some("c-1".into()),
            }),
            Err(Error::NotFound { kind: RecordKind::Host, .. })
        );
    }

    #[test]
    fn test_duplicate_primary_key() {
        let mut tables = Tables::default();
        let host = Host {
            id: "h-1".into(),
            ..Host::new("n1", "10.0.0.1")
        };
        tables.apply(WriteOp::Create(Record::Host(host.clone()))).unwrap();
        assert_matches!(
            tables.apply(WriteOp::Create(Record::Host(host))),
            Err(Error::Conflict { kind: RecordKind::Host, .. })
        );
    }

    #[test]
    fn test_load_cluster_preserves_node_order() {
        let mut tables = Tables::default();
        tables
            .apply(WriteOp::Create(Record::Cluster(cluster("c-1", "prod"))))
            .unwrap();
        for (i, name) in ["m1", "w1", "w2"].iter().enumerate() {
            let mut node = ClusterNode::new(*name, NodeRole::Worker, format!("h-{}", i));
            node.id = format!("n-{}", name);
            node.cluster_id = "c-1".into();
            tables.apply(WriteOp::Create(Record::Node(node))).unwrap();
        }

        let loaded = tables.load_cluster("c-1", &[Relation::Nodes]).unwrap();
        let names: Vec<_> = loaded.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["m1", "w1", "w2"]);
        assert!(loaded.nodes.iter().all(|n| n.host.is_none()));

        let bare = tables.load_cluster("c-1", &[]).unwrap();
        assert!(bare.nodes.is_empty());
    }

    #[test]
    fn test_delete_absent_row_is_noop() {
        let mut tables = Tables::default();
        tables
            .apply(WriteOp::Delete(RecordKind::Spec, "missing".into()))
            .unwrap();
        assert_eq!(tables.total_rows(), 0);
    }
}
