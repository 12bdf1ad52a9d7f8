//! Cluster Lifecycle Service
//!
//! Serves cluster aggregate lifecycle operations and provisioning inventory
//! over REST, with health and Prometheus metrics endpoints.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cluster_lifecycle::store::seed_hosts;
use cluster_lifecycle::{
    AggregateStore, ApiServer, ApiServerConfig, Error, LifecycleManager, MemoryStore,
    MemoryStoreConfig, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cluster Lifecycle - aggregate store and provisioning inventory service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Directory for the store snapshot (in-memory only when unset)
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// YAML file of hosts to register at startup
    #[arg(long, env = "HOSTS_FILE")]
    hosts_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Cluster Lifecycle service");
    info!("  Version: {}", cluster_lifecycle::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!(
        "  Data dir: {}",
        args.data_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "<memory>".into())
    );

    let store = MemoryStore::open(MemoryStoreConfig {
        data_dir: args.data_dir.clone(),
    })
    .await?;

    if let Some(path) = &args.hosts_file {
        seed_hosts(&store, path).await?;
    }

    let manager = LifecycleManager::new(Arc::new(store));
    info!("Lifecycle manager initialized ({} companion tools)", manager.catalog().len());

    // Log lifecycle events
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!("Lifecycle event: {:?}", event);
        }
    });

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_manager = manager.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_manager).await {
            error!("Metrics server error: {}", e);
        }
    });

    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
        ..Default::default()
    };

    let api_server = Arc::new(ApiServer::new(api_config, manager));

    let signal_server = api_server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_server.shutdown();
        }
    });

    api_server.run().await?;

    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "tower_http=info", "axum=info"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

fn plain_response(status: hyper::StatusCode, body: impl Into<hyper::Body>) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => plain_response(StatusCode::OK, "ok"),
                _ => plain_response(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn render_metrics(manager: &LifecycleManager) -> Result<Vec<u8>> {
    use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

    let metric = |e: prometheus::Error| Error::Internal(format!("metrics error: {}", e));
    let registry = Registry::new();
    let stats = manager.stats();

    let counters = [
        ("cluster_lifecycle_creates_total", "Clusters created", stats.creates),
        ("cluster_lifecycle_create_failures_total", "Cluster creates aborted", stats.create_failures),
        ("cluster_lifecycle_deletes_total", "Clusters deleted", stats.deletes),
        ("cluster_lifecycle_delete_failures_total", "Cluster deletes aborted", stats.delete_failures),
        ("cluster_lifecycle_rollbacks_total", "Transactions rolled back", stats.rollbacks),
        ("cluster_lifecycle_rollback_failures_total", "Rollback requests that failed", stats.rollback_failures),
    ];
    for (name, help, value) in counters {
        let counter = IntCounter::new(name, help).map_err(metric)?;
        counter.inc_by(value);
        registry.register(Box::new(counter)).map_err(metric)?;
    }

    let clusters = manager.list().await?.len() as i64;
    let hosts = manager.store().list_hosts().await?;
    let assigned = hosts.iter().filter(|h| h.is_assigned()).count() as i64;

    let gauges = [
        ("cluster_lifecycle_clusters", "Clusters in the store", clusters),
        ("cluster_lifecycle_hosts", "Registered hosts", hosts.len() as i64),
        ("cluster_lifecycle_hosts_assigned", "Hosts bound to a cluster", assigned),
    ];
    for (name, help, value) in gauges {
        let gauge = IntGauge::new(name, help).map_err(metric)?;
        gauge.set(value);
        registry.register(Box::new(gauge)).map_err(metric)?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(metric)?;
    Ok(buffer)
}

async fn run_metrics_server(addr: &str, manager: Arc<LifecycleManager>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let manager = manager.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let manager = manager.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match render_metrics(&manager).await {
                            Ok(buffer) => {
                                let mut response = plain_response(StatusCode::OK, buffer);
                                response.headers_mut().insert(
                                    hyper::header::CONTENT_TYPE,
                                    hyper::header::HeaderValue::from_static(
                                        "text/plain; version=0.0.4",
                                    ),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Metrics render failed: {}", e);
                                plain_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                            }
                        },
                        _ => plain_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
