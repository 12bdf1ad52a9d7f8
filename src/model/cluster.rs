//! Cluster Aggregate
//!
//! The entity graph persisted for one provisioned cluster: the cluster root,
//! its specification, status and secret, the ordered member nodes and the
//! companion tools. Relations between entities are identity fields only;
//! loaded relations are filled in by the store on eager-load.

use crate::model::tool::ClusterTool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Phases and Roles
// =============================================================================

/// Operational phase shared by clusters, nodes and tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClusterPhase {
    #[default]
    Waiting,
    Initializing,
    Running,
    Failed,
    NotReady,
    Terminating,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Waiting => write!(f, "Waiting"),
            ClusterPhase::Initializing => write!(f, "Initializing"),
            ClusterPhase::Running => write!(f, "Running"),
            ClusterPhase::Failed => write!(f, "Failed"),
            ClusterPhase::NotReady => write!(f, "NotReady"),
            ClusterPhase::Terminating => write!(f, "Terminating"),
        }
    }
}

/// Role of a member node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Worker,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::Worker => write!(f, "worker"),
        }
    }
}

// =============================================================================
// Owned Records
// =============================================================================

/// Cluster configuration
///
/// Empty fields mean "no override": the provisioning engine falls back to
/// its own default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    pub id: String,
    pub version: String,
    pub provider: String,
    pub network_type: String,
    pub runtime_type: String,
    pub docker_storage_dir: String,
    pub containerd_storage_dir: String,
    pub lb_kube_apiserver_ip: String,
    pub kube_pod_subnet: String,
    pub kube_service_subnet: String,
}

/// Current lifecycle state of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterStatus {
    pub id: String,
    pub phase: ClusterPhase,
    pub message: String,
}

/// Credential material for a cluster
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSecret {
    pub id: String,
    pub kubeadm_token: String,
    pub kubernetes_token: String,
}

impl std::fmt::Debug for ClusterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSecret")
            .field("id", &self.id)
            .field("kubeadm_token", &"<redacted>")
            .field("kubernetes_token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Hosts
// =============================================================================

/// SSH credential used to reach a host
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostCredential {
    pub username: String,
    pub password: String,
    pub private_key: String,
}

impl std::fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCredential")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A machine that can become a cluster member
///
/// `cluster_id` is `None` while the host is unassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub ip: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub credential: HostCredential,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_ssh_port() -> u16 {
    22
}

impl Host {
    pub fn new(name: impl Into<String>, ip: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            ip: ip.into(),
            port: default_ssh_port(),
            credential: HostCredential::default(),
            cluster_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.cluster_id.is_some()
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// One cluster member, bound to an underlying host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNode {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cluster_id: String,
    pub host_id: String,
    pub role: NodeRole,
    /// `None` until the provisioning engine reports a phase
    #[serde(default)]
    pub status: Option<ClusterPhase>,
    /// Resolved on eager-load; never persisted with the node row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Host>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>, role: NodeRole, host_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            cluster_id: String::new(),
            host_id: host_id.into(),
            role,
            status: None,
            host: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ClusterPhase) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether the node may be placed in its role group
    ///
    /// Only unset and running nodes count; in-flight or failed nodes stay
    /// out of every role group.
    pub fn is_schedulable(&self) -> bool {
        matches!(self.status, None | Some(ClusterPhase::Running))
    }

    /// Row form: the node without its resolved host
    pub fn to_row(&self) -> Self {
        Self {
            host: None,
            ..self.clone()
        }
    }
}

// =============================================================================
// Cluster Root
// =============================================================================

/// Cluster aggregate root
///
/// When read from a store, only the relations named in the preload list are
/// populated; the others hold their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub spec_id: Option<String>,
    #[serde(default)]
    pub status_id: Option<String>,
    #[serde(default)]
    pub secret_id: Option<String>,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default)]
    pub status: ClusterStatus,
    #[serde(default, skip_serializing)]
    pub secret: ClusterSecret,
    #[serde(default)]
    pub nodes: Vec<ClusterNode>,
    #[serde(default)]
    pub tools: Vec<ClusterTool>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            source: String::new(),
            spec_id: None,
            status_id: None,
            secret_id: None,
            spec: ClusterSpec::default(),
            status: ClusterStatus::default(),
            secret: ClusterSecret::default(),
            nodes: Vec::new(),
            tools: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_spec(mut self, spec: ClusterSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_node(mut self, node: ClusterNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Row form: the root record with every relation left at its default
    pub fn to_row(&self) -> Self {
        Self {
            spec: ClusterSpec::default(),
            status: ClusterStatus::default(),
            secret: ClusterSecret::default(),
            nodes: Vec::new(),
            tools: Vec::new(),
            ..self.clone()
        }
    }

    pub fn masters(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter().filter(|n| n.role == NodeRole::Master)
    }

    pub fn workers(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter().filter(|n| n.role == NodeRole::Worker)
    }
}
