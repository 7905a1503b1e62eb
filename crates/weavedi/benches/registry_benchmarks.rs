//! Performance benchmarks for the registry

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use weavedi::{DiLogLevel, Key, Lifecycle, Registry, RegistryConfig, ScopeKind};

#[derive(Debug, Clone)]
struct TestService {
    id: u32,
    data: Vec<u8>,
}

impl TestService {
    fn new(id: u32) -> Self {
        Self {
            id,
            data: vec![0; 1024],
        }
    }
}

struct Consumer {
    service: Arc<TestService>,
}

fn quiet_registry() -> Registry {
    Registry::with_config(RegistryConfig::default().with_log_level(DiLogLevel::Off))
}

fn benchmark_registration(c: &mut Criterion) {
    c.bench_function("register_singleton", |b| {
        let registry = quiet_registry();
        let key = Key::<TestService>::new();
        b.iter(|| {
            let info = registry.register(&key, Lifecycle::Singleton, |_| {
                Ok(TestService::new(black_box(42)))
            });
            black_box(info)
        })
    });

    c.bench_function("register_into_populated_table", |b| {
        let registry = quiet_registry();
        for i in 0..256u32 {
            registry.register_instance(&Key::<TestService>::named(i.to_string()), TestService::new(i));
        }
        let key = Key::<TestService>::new();
        b.iter(|| {
            let info = registry.register(&key, Lifecycle::Transient, |_| Ok(TestService::new(1)));
            black_box(info)
        })
    });
}

fn benchmark_resolution(c: &mut Criterion) {
    let registry = quiet_registry();
    let singleton = Key::<TestService>::named("singleton");
    let transient = Key::<TestService>::named("transient");
    let scoped = Key::<TestService>::named("scoped");
    let consumer = Key::<Consumer>::new();

    registry.register(&singleton, Lifecycle::Singleton, |_| Ok(TestService::new(1)));
    registry.register(&transient, Lifecycle::Transient, |_| Ok(TestService::new(2)));
    registry.register(&scoped, Lifecycle::Scoped(ScopeKind::Request), |_| {
        Ok(TestService::new(3))
    });
    registry.register(&consumer, Lifecycle::Transient, |r| {
        Ok(Consumer {
            service: r.resolve(&Key::<TestService>::named("singleton"))?,
        })
    });
    registry.activate_scope(ScopeKind::Request, "bench");

    c.bench_function("resolve_singleton_cached", |b| {
        b.iter(|| black_box(registry.resolve(&singleton)))
    });

    c.bench_function("resolve_transient", |b| {
        b.iter(|| black_box(registry.resolve(&transient)))
    });

    c.bench_function("resolve_scoped_cached", |b| {
        b.iter(|| black_box(registry.resolve(&scoped)))
    });

    c.bench_function("resolve_nested", |b| {
        b.iter(|| {
            let consumer = registry.resolve(&consumer);
            black_box(consumer.map(|c| c.service.id))
        })
    });

    c.bench_function("resolve_missing", |b| {
        let missing = Key::<TestService>::named("missing");
        b.iter(|| black_box(registry.resolve_required(&missing).is_err()))
    });
}

fn benchmark_scopes(c: &mut Criterion) {
    let registry = quiet_registry();
    let key = Key::<TestService>::new();
    registry.register(&key, Lifecycle::Scoped(ScopeKind::Session), |_| Ok(TestService::new(7)));

    c.bench_function("activate_resolve_clear_scope", |b| {
        let mut round = 0u64;
        b.iter(|| {
            round += 1;
            registry.activate_scope(ScopeKind::Session, round.to_string());
            let service = registry.resolve(&key);
            registry.clear_scope(&ScopeKind::Session);
            black_box(service.map(|s| s.data.len()))
        })
    });
}

fn benchmark_async_resolution(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let registry = quiet_registry();
    let key = Key::<TestService>::new();
    registry.register_async(&key, Lifecycle::Singleton, |_| async {
        anyhow::Ok(TestService::new(9))
    });
    runtime.block_on(registry.resolve_async(&key));

    c.bench_function("resolve_async_singleton_cached", |b| {
        b.iter(|| black_box(runtime.block_on(registry.resolve_async(&key))))
    });
}

criterion_group!(
    benches,
    benchmark_registration,
    benchmark_resolution,
    benchmark_scopes,
    benchmark_async_resolution
);
criterion_main!(benches);
