//! Lifecycle Events
//!
//! Events emitted by the lifecycle manager after a transaction settles, for
//! in-process consumers to react to cluster membership changes.

use serde::{Deserialize, Serialize};

/// Events emitted by the lifecycle manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A cluster aggregate was committed
    ClusterCreated {
        cluster_id: String,
        name: String,
        node_count: u32,
        tool_count: u32,
    },

    /// A create was rolled back; nothing was persisted
    CreateAborted {
        cluster_id: String,
        name: String,
        reason: String,
    },

    /// A cluster aggregate was removed
    ClusterDeleted { cluster_id: String, name: String },

    /// A host was bound to a cluster
    HostAssigned { cluster_id: String, host_id: String },

    /// A host was released by a deleted cluster
    HostReleased { cluster_id: String, host_id: String },
}

impl LifecycleEvent {
    /// Get the cluster ID associated with this event
    pub fn cluster_id(&self) -> &str {
        match self {
            LifecycleEvent::ClusterCreated { cluster_id, .. } => cluster_id,
            LifecycleEvent::CreateAborted { cluster_id, .. } => cluster_id,
            LifecycleEvent::ClusterDeleted { cluster_id, .. } => cluster_id,
            LifecycleEvent::HostAssigned { cluster_id, .. } => cluster_id,
            LifecycleEvent::HostReleased { cluster_id, .. } => cluster_id,
        }
    }

    /// Get the host ID if this is a host ownership event
    pub fn host_id(&self) -> Option<&str> {
        match self {
            LifecycleEvent::HostAssigned { host_id, .. } => Some(host_id),
            LifecycleEvent::HostReleased { host_id, .. } => Some(host_id),
            _ => None,
        }
    }
}
