//! # NETCONF Engine Benchmarks
//!
//! | Component | Hot Path |
//! |-----------|----------|
//! | nc-01 Keyed Lock | uncontended acquire/release, release-all sweep |
//! | nc-04 RPC Router | full request lifecycle for a unary handler |
//! | nc-05 Coordinator | two-phase apply against the config store |
//!
//! ```bash
//! cargo bench --package nc-tests --bench engine_benchmarks
//! ```

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nc_01_keyed_lock::{KeyedLockManager, OwnerId};
use nc_03_session::{test_utils::detached_session, Session};
use nc_04_rpc_router::{HandlerOutput, RpcHandler, RpcRouter};
use nc_05_subsystem_coordinator::{CompositeSubsystem, CoordinatorConfig};
use netconf_server::adapters::ConfigStore;
use serde_json::json;
use shared_types::{
    Capability, CapabilitySet, ChangeOperation, ChangeSet, Datastore, OperationName, RpcError,
    RpcRequest, SessionId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// NC-01: Keyed Lock
// ============================================================================

fn bench_keyed_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("nc-01-keyed-lock");

    let locks = KeyedLockManager::<String>::exclusive();
    let owner = OwnerId::Session(SessionId(42));
    group.bench_function("try_acquire_release", |b| {
        b.iter(|| {
            let key = "running".to_string();
            black_box(locks.try_acquire(key.clone(), owner));
            locks.release(&key, owner).unwrap();
        })
    });

    for keys in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(keys as u64));
        group.bench_with_input(BenchmarkId::new("release_all", keys), &keys, |b, &keys| {
            b.iter(|| {
                for i in 0..keys {
                    locks.try_acquire(format!("key-{i}"), owner);
                }
                black_box(locks.release_all(owner))
            })
        });
    }

    let rt = runtime();
    group.bench_function("async_lock_guard", |b| {
        b.to_async(&rt).iter(|| async {
            let guard = locks.lock("candidate".to_string(), owner).await.unwrap();
            black_box(guard.owner());
        })
    });

    group.finish();
}

// ============================================================================
// NC-04: RPC Router
// ============================================================================

struct EchoHandler;

#[async_trait]
impl RpcHandler for EchoHandler {
    async fn execute(
        &self,
        request: &RpcRequest,
        _session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        Ok(HandlerOutput::data(request.payload.clone()))
    }
}

fn bench_router_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("nc-04-rpc-router");
    let rt = runtime();

    let router = RpcRouter::builder()
        .register(OperationName::base("echo"), Arc::new(EchoHandler))
        .unwrap()
        .build();
    let (session, mut outbound) = detached_session(
        SessionId(1),
        "admin",
        CapabilitySet::new([Capability::BASE_1_0]),
        1024,
    );
    rt.spawn(async move { while outbound.recv().await.is_some() {} });

    let echo = RpcRequest {
        message_id: "1".into(),
        operation: OperationName::base("echo"),
        payload: json!({ "filter": "/system" }),
        session_id: SessionId(1),
        sequence: 0,
    };
    group.bench_function("dispatch_unary", |b| {
        b.to_async(&rt).iter(|| async { black_box(router.dispatch(&echo, &session).await) })
    });

    let unknown = RpcRequest {
        operation: OperationName::base("frobnicate"),
        ..echo.clone()
    };
    group.bench_function("dispatch_unknown", |b| {
        b.to_async(&rt).iter(|| async { black_box(router.dispatch(&unknown, &session).await) })
    });

    group.finish();
}

// ============================================================================
// NC-05: Subsystem Coordinator
// ============================================================================

fn change_set(edits: usize) -> Arc<ChangeSet> {
    (0..edits)
        .fold(ChangeSet::builder(Datastore::Running), |builder, i| {
            builder.change(
                format!("/interfaces/interface{i}/mtu"),
                ChangeOperation::Replace,
                Some(json!(1500 + i)),
            )
        })
        .origin(SessionId(1))
        .build()
}

fn bench_coordinator_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("nc-05-subsystem-coordinator");
    group.measurement_time(Duration::from_secs(5));
    let rt = runtime();

    let coordinator = CompositeSubsystem::new(CoordinatorConfig::default());
    coordinator.register(Arc::new(ConfigStore::new("config-store")));

    for edits in [1usize, 16, 128] {
        let changes = change_set(edits);
        group.throughput(Throughput::Elements(edits as u64));
        group.bench_with_input(BenchmarkId::new("apply", edits), &changes, |b, changes| {
            b.to_async(&rt)
                .iter(|| async { coordinator.apply(Arc::clone(changes)).await.unwrap() })
        });
    }

    group.finish();
}

criterion_group!(
    name = engine_benches;
    config = Criterion::default().sample_size(50);
    targets = bench_keyed_lock, bench_router_dispatch, bench_coordinator_apply,
);

criterion_main!(engine_benches);
