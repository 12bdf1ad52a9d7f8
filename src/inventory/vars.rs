//! Provisioning Variables
//!
//! Sparse projection of a cluster specification onto the fact names
//! understood by the provisioning engine. Values are passed through as-is;
//! the engine validates them.

use crate::model::ClusterSpec;
use std::collections::BTreeMap;

pub const NETWORK_PLUGIN_FACT: &str = "networkPlugin";
pub const CONTAINER_RUNTIME_FACT: &str = "containerRuntime";
pub const DOCKER_STORAGE_DIR_FACT: &str = "dockerStorageDir";
pub const CONTAINERD_STORAGE_DIR_FACT: &str = "containerdStorageDir";
pub const LB_KUBE_APISERVER_IP_FACT: &str = "lbKubeApiserverIp";
pub const KUBE_POD_SUBNET_FACT: &str = "kubePodSubnet";
pub const KUBE_SERVICE_SUBNET_FACT: &str = "kubeServiceSubnet";

/// Fact name to value
pub type ProvisionVars = BTreeMap<String, String>;

/// Pure specification-to-variables transformation
pub struct VariableProjector;

impl VariableProjector {
    /// Project every non-empty recognized field; empty fields are omitted
    pub fn project(spec: &ClusterSpec) -> ProvisionVars {
        let fields = [
            (NETWORK_PLUGIN_FACT, &spec.network_type),
            (CONTAINER_RUNTIME_FACT, &spec.runtime_type),
            (DOCKER_STORAGE_DIR_FACT, &spec.docker_storage_dir),
            (CONTAINERD_STORAGE_DIR_FACT, &spec.containerd_storage_dir),
            (LB_KUBE_APISERVER_IP_FACT, &spec.lb_kube_apiserver_ip),
            (KUBE_POD_SUBNET_FACT, &spec.kube_pod_subnet),
            (KUBE_SERVICE_SUBNET_FACT, &spec.kube_service_subnet),
        ];

        fields
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(fact, value)| (fact.to_string(), value.clone()))
            .collect()
    }
}
