//! Benchmarks for the lifecycle injector

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lifecycle_injector::{Container, LifecycleHooks, ResolveOptions, Resolver};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

#[allow(dead_code)]
struct DependentService {
    small: Arc<SmallService>,
    medium: Arc<MediumService>,
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_time()
        .build()
        .unwrap()
}

fn populated() -> Container {
    let container = Container::new();
    container.register_instance(SmallService { value: 42 }).unwrap();
    container
        .register_singleton(|_| async {
            Ok(MediumService {
                name: "medium".into(),
                values: (0..64).collect(),
            })
        })
        .unwrap();
    container
        .register_factory(|r: Resolver| async move {
            Ok(DependentService {
                small: r.get::<SmallService>().await?,
                medium: r.get::<MediumService>().await?,
            })
        })
        .unwrap();
    container
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("instance_small", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register_instance(SmallService { value: 42 }).unwrap();
            black_box(container)
        })
    });

    group.bench_function("singleton", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register_singleton(|_| async { Ok(SmallService { value: 1 }) })
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("bind_named_scope", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .bind::<SmallService>()
                .in_scope("named")
                .to_instance(Arc::new(SmallService { value: 6 }))
                .unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let rt = runtime();
    let container = populated();
    rt.block_on(container.get::<MediumService>()).unwrap();

    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_instance", |b| {
        b.to_async(&rt).iter(|| async { black_box(container.get::<SmallService>().await.unwrap()) })
    });

    group.bench_function("get_cached_singleton", |b| {
        b.to_async(&rt).iter(|| async { black_box(container.get::<MediumService>().await.unwrap()) })
    });

    group.bench_function("get_factory_with_deps", |b| {
        b.to_async(&rt).iter(|| async { black_box(container.get::<DependentService>().await.unwrap()) })
    });

    group.bench_function("resolve_silent_miss", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                container
                    .resolve::<String>(ResolveOptions::new().silent(true))
                    .await
                    .unwrap(),
            )
        })
    });

    group.bench_function("contains_check", |b| {
        b.iter(|| black_box(container.contains::<SmallService>(None)))
    });

    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("lifecycle");

    group.bench_function("eager_init_8", |b| {
        b.to_async(&rt).iter(|| async {
            let container = Container::new();
            for scope in 0..8 {
                container
                    .bind::<LifecycleHooks>()
                    .in_scope(format!("worker-{scope}"))
                    .eager()
                    .with_lifecycle()
                    .to_singleton(|_| async {
                        let mut hooks = LifecycleHooks::new();
                        hooks
                            .on_start("open", || async { Ok(()) })
                            .on_stop("close", || async { Ok(()) });
                        Ok(Arc::new(hooks))
                    })
                    .unwrap();
            }
            container.initialize_eager_singletons().await.unwrap();
            container.clear().await;
            black_box(container)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_registration, bench_resolution, bench_lifecycle);
criterion_main!(benches);
