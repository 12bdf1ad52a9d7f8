//! Companion Tool Catalog
//!
//! Fixed table of companion services instantiated once per cluster at
//! creation time. Entries are copied into each cluster, never shared.

use crate::model::cluster::ClusterPhase;
use serde::{Deserialize, Serialize};

/// Version stamped on every built-in companion tool
pub const TOOL_VERSION: &str = "v1.0.0";

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTemplate {
    pub name: &'static str,
    pub version: &'static str,
    pub describe: &'static str,
    pub logo: &'static str,
}

const BUILTIN_TOOLS: [ToolTemplate; 4] = [
    ToolTemplate {
        name: "prometheus",
        version: TOOL_VERSION,
        describe: "",
        logo: "prometheus.png",
    },
    ToolTemplate {
        name: "dashboard",
        version: TOOL_VERSION,
        describe: "",
        logo: "kubernetes.png",
    },
    ToolTemplate {
        name: "chartmuseum",
        version: TOOL_VERSION,
        describe: "",
        logo: "chartmuseum.png",
    },
    ToolTemplate {
        name: "registry",
        version: TOOL_VERSION,
        describe: "",
        logo: "registry.png",
    },
];

/// Companion tool record owned by a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTool {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub version: String,
    pub describe: String,
    pub status: ClusterPhase,
    pub logo: String,
}

/// Immutable table of companion tools
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    entries: &'static [ToolTemplate],
}

impl ToolCatalog {
    /// The four built-in companion services
    pub fn builtin() -> Self {
        Self {
            entries: &BUILTIN_TOOLS,
        }
    }

    pub fn entries(&self) -> &[ToolTemplate] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh tool records for one cluster, each waiting to be installed
    pub fn instantiate(&self, cluster_id: &str) -> Vec<ClusterTool> {
        self.entries
            .iter()
            .map(|t| ClusterTool {
                id: String::new(),
                cluster_id: cluster_id.to_string(),
                name: t.name.to_string(),
                version: t.version.to_string(),
                describe: t.describe.to_string(),
                status: ClusterPhase::Waiting,
                logo: t.logo.to_string(),
            })
            .collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
