//! Benchmark for inventory derivation
//!
//! Builds the provisioning inventory and variable set for clusters of
//! increasing size.

use cluster_lifecycle::{
    Cluster, ClusterNode, ClusterPhase, ClusterSpec, Host, InventoryBuilder, NodeRole,
    VariableProjector,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn make_cluster(masters: usize, workers: usize) -> Cluster {
    let mut cluster = Cluster::new("bench").with_spec(ClusterSpec {
        network_type: "calico".into(),
        runtime_type: "containerd".into(),
        containerd_storage_dir: "/var/lib/containerd".into(),
        lb_kube_apiserver_ip: "10.0.0.100".into(),
        kube_pod_subnet: "10.244.0.0/18".into(),
        kube_service_subnet: "10.96.0.0/18".into(),
        ..Default::default()
    });

    let roles = std::iter::repeat(NodeRole::Master)
        .take(masters)
        .chain(std::iter::repeat(NodeRole::Worker).take(workers));
    for (i, role) in roles.enumerate() {
        let mut host = Host::new(format!("host-{}", i), format!("10.0.{}.{}", i / 250, i % 250));
        host.id = format!("host-{:04}", i);
        let mut node = ClusterNode::new(format!("node-{}", i), role, host.id.clone());
        node.host = Some(host);
        if i % 7 == 3 {
            node = node.with_status(ClusterPhase::Initializing);
        }
        cluster = cluster.with_node(node);
    }
    cluster
}

fn bench_build_inventory(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory");

    for (masters, workers) in [(1, 3), (3, 50), (5, 500)] {
        let cluster = make_cluster(masters, workers);
        group.throughput(Throughput::Elements((masters + workers) as u64));
        group.bench_with_input(
            BenchmarkId::new("build", masters + workers),
            &cluster,
            |b, cluster| b.iter(|| InventoryBuilder::build(black_box(cluster))),
        );
    }

    group.finish();
}

fn bench_project_vars(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory");
    group.throughput(Throughput::Elements(1));

    let cluster = make_cluster(1, 1);
    group.bench_function("project_vars", |b| {
        b.iter(|| VariableProjector::project(black_box(&cluster.spec)));
    });

    group.finish();
}

criterion_group!(benches, bench_build_inventory, bench_project_vars);
criterion_main!(benches);
