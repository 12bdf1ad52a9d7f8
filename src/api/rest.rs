//! REST API Handlers
//!
//! Endpoints that trigger cluster lifecycle operations and expose the
//! derived inventory and provisioning variables.

use crate::domain::ports::AggregateStore;
use crate::error::Error;
use crate::inventory::{Inventory, ProvisionVars};
use crate::lifecycle::{LifecycleManager, LifecycleStatsSnapshot};
use crate::model::{
    Cluster, ClusterNode, ClusterPhase, ClusterSecret, ClusterSpec, ClusterTool, Host, NodeRole,
};
use axum::{
    extract::{DefaultBodyLimit, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Cluster creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default)]
    pub secret: ClusterSecret,
    #[serde(default)]
    pub nodes: Vec<NodeRequest>,
}

/// Member node in a creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub name: String,
    pub role: NodeRole,
    pub host_id: String,
}

impl CreateClusterRequest {
    fn into_cluster(self) -> Cluster {
        let mut cluster = Cluster::new(self.name)
            .with_source(self.source)
            .with_spec(self.spec);
        cluster.secret = self.secret;
        for node in self.nodes {
            cluster = cluster.with_node(ClusterNode::new(node.name, node.role, node.host_id));
        }
        cluster
    }
}

/// Node info response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResponse {
    pub id: String,
    pub name: String,
    pub role: NodeRole,
    pub status: Option<ClusterPhase>,
    pub host_id: String,
    pub ip: Option<String>,
}

impl From<&ClusterNode> for NodeResponse {
    fn from(node: &ClusterNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role,
            status: node.status,
            host_id: node.host_id.clone(),
            ip: node.host.as_ref().map(|h| h.ip.clone()),
        }
    }
}

/// Cluster info response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResponse {
    pub id: String,
    pub name: String,
    pub source: String,
    pub phase: ClusterPhase,
    pub spec: ClusterSpec,
    pub nodes: Vec<NodeResponse>,
    pub tools: Vec<ClusterTool>,
    pub created_at: DateTime<Utc>,
}

impl From<&Cluster> for ClusterResponse {
    fn from(cluster: &Cluster) -> Self {
        Self {
            id: cluster.id.clone(),
            name: cluster.name.clone(),
            source: cluster.source.clone(),
            phase: cluster.status.phase,
            spec: cluster.spec.clone(),
            nodes: cluster.nodes.iter().map(NodeResponse::from).collect(),
            tools: cluster.tools.clone(),
            created_at: cluster.created_at,
        }
    }
}

/// Cluster list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub id: String,
    pub name: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Host info response; credentials are never returned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResponse {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub cluster_id: Option<String>,
}

impl From<Host> for HostResponse {
    fn from(host: Host) -> Self {
        Self {
            id: host.id,
            name: host.name,
            ip: host.ip,
            port: host.port,
            cluster_id: host.cluster_id,
        }
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(e: Error) -> Response {
    let status = match &e {
        Error::Conflict { .. } | Error::HostOwned { .. } => StatusCode::CONFLICT,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (
        status,
        Json(ApiErrorResponse {
            error: e.kind().into(),
            message: e.to_string(),
        }),
    )
        .into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    manager: Arc<LifecycleManager>,
    max_body_size: usize,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(manager: Arc<LifecycleManager>) -> Self {
        Self {
            manager,
            max_body_size: 10 * 1024 * 1024,
        }
    }

    pub fn with_body_limit(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            manager: self.manager,
        };

        Router::new()
            // Cluster endpoints
            .route("/v1/clusters", get(list_clusters).post(create_cluster))
            .route("/v1/clusters/:id", get(get_cluster).delete(delete_cluster))
            .route("/v1/clusters/:id/inventory", get(get_inventory))
            .route("/v1/clusters/:id/vars", get(get_vars))
            // Host endpoints
            .route("/v1/hosts", get(list_hosts))
            // Stats endpoint
            .route("/v1/stats", get(get_stats))
            // Health endpoint
            .route("/health", get(health_check))
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    manager: Arc<LifecycleManager>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a cluster
async fn create_cluster(
    State(state): State<AppState>,
    Json(request): Json<CreateClusterRequest>,
) -> Response {
    info!("Creating cluster: {}", request.name);

    match state.manager.create(request.into_cluster()).await {
        Ok(cluster) => (StatusCode::CREATED, Json(ClusterResponse::from(&cluster))).into_response(),
        Err(e) => error_response(e),
    }
}

/// List clusters
async fn list_clusters(State(state): State<AppState>) -> Response {
    match state.manager.list().await {
        Ok(clusters) => {
            let summaries: Vec<ClusterSummary> = clusters
                .into_iter()
                .map(|c| ClusterSummary {
                    id: c.id,
                    name: c.name,
                    source: c.source,
                    created_at: c.created_at,
                })
                .collect();
            Json(summaries).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Get a fully loaded cluster
async fn get_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.get(&id).await {
        Ok(cluster) => Json(ClusterResponse::from(&cluster)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Delete a cluster
async fn delete_cluster(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// Get the provisioning inventory
async fn get_inventory(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.inventory(&id).await {
        Ok(inventory) => Json::<Inventory>(inventory).into_response(),
        Err(e) => error_response(e),
    }
}

/// Get the provisioning variables
async fn get_vars(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.manager.vars(&id).await {
        Ok(vars) => Json::<ProvisionVars>(vars).into_response(),
        Err(e) => error_response(e),
    }
}

/// List hosts
async fn list_hosts(State(state): State<AppState>) -> Response {
    match state.manager.store().list_hosts().await {
        Ok(hosts) => {
            let hosts: Vec<HostResponse> = hosts.into_iter().map(HostResponse::from).collect();
            Json(hosts).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Lifecycle counters
async fn get_stats(State(state): State<AppState>) -> Json<LifecycleStatsSnapshot> {
    Json(state.manager.stats())
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
