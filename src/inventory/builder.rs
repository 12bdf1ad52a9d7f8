//! Inventory Builder
//!
//! Derives the provisioning inventory from a loaded cluster. Nodes are
//! classified by role and operational state into a fixed sequence of named
//! groups; the names, order and dependency edges form the contract with the
//! provisioning engine and must not change.

use crate::model::{Cluster, ClusterNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Group Names
// =============================================================================

pub const GROUP_KUBE_MASTER: &str = "kube-master";
pub const GROUP_KUBE_WORKER: &str = "kube-worker";
pub const GROUP_NEW_WORKER: &str = "new-worker";
pub const GROUP_LB: &str = "lb";
pub const GROUP_ETCD: &str = "etcd";
pub const GROUP_CHRONY: &str = "chrony";
pub const GROUP_DEL_WORKER: &str = "del-worker";

/// Every group in emission order
pub const GROUP_ORDER: [&str; 7] = [
    GROUP_KUBE_MASTER,
    GROUP_KUBE_WORKER,
    GROUP_NEW_WORKER,
    GROUP_LB,
    GROUP_ETCD,
    GROUP_CHRONY,
    GROUP_DEL_WORKER,
];

// =============================================================================
// Inventory Types
// =============================================================================

/// Connection details for one inventory host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDescriptor {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub private_key: String,
    pub vars: BTreeMap<String, String>,
}

impl HostDescriptor {
    /// Descriptor for a node, addressed through its resolved host
    pub fn from_node(node: &ClusterNode) -> Self {
        let mut descriptor = Self {
            name: node.name.clone(),
            ..Default::default()
        };
        if let Some(host) = &node.host {
            descriptor.ip = host.ip.clone();
            descriptor.port = host.port;
            descriptor.user = host.credential.username.clone();
            descriptor.password = host.credential.password.clone();
            descriptor.private_key = host.credential.private_key.clone();
        }
        descriptor
    }
}

/// A named group of hosts and the groups it depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub name: String,
    pub hosts: Vec<String>,
    pub children: Vec<String>,
    pub vars: BTreeMap<String, String>,
}

impl GroupDescriptor {
    fn new(name: &str, hosts: Vec<String>, children: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            hosts,
            children: children.iter().map(|c| c.to_string()).collect(),
            vars: BTreeMap::new(),
        }
    }
}

/// Provisioning inventory handed to the provisioning engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub hosts: Vec<HostDescriptor>,
    pub groups: Vec<GroupDescriptor>,
}

impl Inventory {
    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&GroupDescriptor> {
        self.groups.iter().find(|g| g.name == name)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Pure cluster-to-inventory transformation
pub struct InventoryBuilder;

impl InventoryBuilder {
    /// Build the inventory for a cluster whose nodes are loaded
    ///
    /// Every node appears in the host list. A node joins its role group only
    /// when its status is unset or running. The chrony group holds the first
    /// qualifying master, if any.
    pub fn build(cluster: &Cluster) -> Inventory {
        let hosts = cluster.nodes.iter().map(HostDescriptor::from_node).collect();
        let masters = schedulable_names(cluster.masters());
        let workers = schedulable_names(cluster.workers());

        let chrony: Vec<String> = masters.first().cloned().into_iter().collect();

        Inventory {
            hosts,
            groups: vec![
                GroupDescriptor::new(GROUP_KUBE_MASTER, masters.clone(), &[]),
                GroupDescriptor::new(GROUP_KUBE_WORKER, workers, &[GROUP_KUBE_MASTER]),
                GroupDescriptor::new(GROUP_NEW_WORKER, Vec::new(), &[]),
                GroupDescriptor::new(GROUP_LB, Vec::new(), &[]),
                GroupDescriptor::new(GROUP_ETCD, masters, &[GROUP_KUBE_MASTER]),
                GroupDescriptor::new(GROUP_CHRONY, chrony, &[]),
                GroupDescriptor::new(GROUP_DEL_WORKER, Vec::new(), &[]),
            ],
        }
    }
}

fn schedulable_names<'a>(nodes: impl Iterator<Item = &'a ClusterNode>) -> Vec<String> {
    nodes
        .filter(|n| n.is_schedulable())
        .map(|n| n.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClusterPhase, Host, NodeRole};

    fn node(name: &str, role: NodeRole, status: Option<ClusterPhase>) -> ClusterNode {
        let mut node = ClusterNode::new(name, role, format!("h-{}", name));
        node.status = status;
        node
    }

    #[test]
    fn test_groups_by_role_and_status() {
        let cluster = Cluster::new("prod")
            .with_node(node("m1", NodeRole::Master, Some(ClusterPhase::Running)))
            .with_node(node("m2", NodeRole::Master, Some(ClusterPhase::Waiting)))
            .with_node(node("w1", NodeRole::Worker, Some(ClusterPhase::Running)));

        let inventory = InventoryBuilder::build(&cluster);

        assert_eq!(inventory.hosts.len(), 3);
        assert_eq!(inventory.group(GROUP_KUBE_MASTER).unwrap().hosts, ["m1"]);
        assert_eq!(inventory.group(GROUP_KUBE_WORKER).unwrap().hosts, ["w1"]);
        assert_eq!(
            inventory.group(GROUP_KUBE_WORKER).unwrap().children,
            [GROUP_KUBE_MASTER]
        );
        assert_eq!(inventory.group(GROUP_ETCD).unwrap().hosts, ["m1"]);
        assert_eq!(inventory.group(GROUP_CHRONY).unwrap().hosts, ["m1"]);
        for name in [GROUP_NEW_WORKER, GROUP_LB, GROUP_DEL_WORKER] {
            assert!(inventory.group(name).unwrap().hosts.is_empty());
        }
    }

    #[test]
    fn test_empty_cluster_has_all_groups() {
        let inventory = InventoryBuilder::build(&Cluster::new("empty"));

        let names: Vec<_> = inventory.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, GROUP_ORDER);
        assert!(inventory.hosts.is_empty());
        assert!(inventory.groups.iter().all(|g| g.hosts.is_empty()));
        assert!(inventory.groups.iter().all(|g| g.vars.is_empty()));
    }

    #[test]
    fn test_dependency_edges() {
        let inventory = InventoryBuilder::build(&Cluster::new("edges"));
        for group in &inventory.groups {
            let expected: &[&str] = match group.name.as_str() {
                GROUP_KUBE_WORKER | GROUP_ETCD => &[GROUP_KUBE_MASTER],
                _ => &[],
            };
            assert_eq!(group.children, expected, "group {}", group.name);
        }
    }

    #[test]
    fn test_unset_status_counts_and_chrony_picks_first_master() {
        let cluster = Cluster::new("prod")
            .with_node(node("w1", NodeRole::Worker, None))
            .with_node(node("m2", NodeRole::Master, Some(ClusterPhase::Failed)))
            .with_node(node("m3", NodeRole::Master, None))
            .with_node(node("m4", NodeRole::Master, Some(ClusterPhase::Running)));

        let inventory = InventoryBuilder::build(&cluster);
        assert_eq!(inventory.group(GROUP_KUBE_MASTER).unwrap().hosts, ["m3", "m4"]);
        assert_eq!(inventory.group(GROUP_CHRONY).unwrap().hosts, ["m3"]);
        assert_eq!(inventory.group(GROUP_KUBE_WORKER).unwrap().hosts, ["w1"]);
    }

    #[test]
    fn test_no_qualifying_master_leaves_chrony_empty() {
        let cluster = Cluster::new("prod")
            .with_node(node("m1", NodeRole::Master, Some(ClusterPhase::Initializing)))
            .with_node(node("w1", NodeRole::Worker, None));

        let inventory = InventoryBuilder::build(&cluster);
        assert!(inventory.group(GROUP_CHRONY).unwrap().hosts.is_empty());
        assert!(inventory.group(GROUP_ETCD).unwrap().hosts.is_empty());
        assert_eq!(inventory.hosts.len(), 2);
    }

    #[test]
    fn test_host_descriptor_from_resolved_host() {
        let mut host = Host::new("machine-1", "192.168.1.10");
        host.port = 2222;
        host.credential.username = "root".into();
        host.credential.password = "pw".into();

        let mut resolved = node("m1", NodeRole::Master, None);
        resolved.host = Some(host);

        let descriptor = HostDescriptor::from_node(&resolved);
        assert_eq!(descriptor.name, "m1");
        assert_eq!(descriptor.ip, "192.168.1.10");
        assert_eq!(descriptor.port, 2222);
        assert_eq!(descriptor.user, "root");

        let unresolved = HostDescriptor::from_node(&node("m2", NodeRole::Master, None));
        assert_eq!(unresolved.name, "m2");
        assert!(unresolved.ip.is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let cluster = Cluster::new("prod")
            .with_node(node("m1", NodeRole::Master, None))
            .with_node(node("w1", NodeRole::Worker, None));
        assert_eq!(InventoryBuilder::build(&cluster), InventoryBuilder::build(&cluster));
    }
}
