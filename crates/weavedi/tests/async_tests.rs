//! Async factory tests
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weavedi::*;

#[derive(Debug)]
struct Database {
    url: String,
}

struct Repository {
    db: Arc<Database>,
}

fn database_key() -> Key<Database> {
    Key::new()
}

#[tokio::test]
async fn test_async_singleton() {
    let registry = Registry::new();
    let info = registry.register_async(&database_key(), Lifecycle::Singleton, |_| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        anyhow::Ok(Database {
            url: "postgres://local".into(),
        })
    });
    assert!(info.is_async);

    let first = registry.resolve_async(&database_key()).await.unwrap();
    let second = registry.resolve_async(&database_key()).await.unwrap();
    assert_eq!(first.url, "postgres://local");
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_async_factory_resolves_dependencies() {
    let registry = Registry::new();
    registry.register_async(&database_key(), Lifecycle::Singleton, |_| async {
        anyhow::Ok(Database { url: "db".into() })
    });
    registry.register_async(&Key::<Repository>::new(), Lifecycle::Transient, |r| async move {
        let db = r.resolve_async(&database_key()).await?;
        anyhow::Ok(Repository { db })
    });

    let a = registry.resolve_async(&Key::<Repository>::new()).await.unwrap();
    let b = registry.resolve_async(&Key::<Repository>::new()).await.unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.db, &b.db));
}

#[tokio::test]
async fn test_sync_bindings_resolve_through_async_api() {
    let registry = Registry::new();
    registry.register(&database_key(), Lifecycle::Singleton, |_| {
        Ok(Database { url: "sync".into() })
    });

    let via_async = registry.resolve_async(&database_key()).await.unwrap();
    let via_sync = registry.resolve(&database_key()).unwrap();
    assert!(Arc::ptr_eq(&via_async, &via_sync));
}

#[tokio::test]
async fn test_sync_resolution_of_async_binding() {
    let registry = Registry::new();
    registry.register_async(&database_key(), Lifecycle::Singleton, |_| async {
        anyhow::Ok(Database { url: "db".into() })
    });

    let err = registry.resolve_required(&database_key()).unwrap_err();
    assert!(matches!(err, DiError::AsyncFactoryRequired { .. }));
    assert!(registry.resolve(&database_key()).is_none());

    let built = registry.resolve_async(&database_key()).await.unwrap();
    let cached = registry.resolve(&database_key()).unwrap();
    assert!(Arc::ptr_eq(&built, &cached));
}

#[tokio::test]
async fn test_async_circular_dependency() {
    #[derive(Debug)]
    struct Ping(#[allow(dead_code)] Arc<Pong>);
    #[derive(Debug)]
    struct Pong(#[allow(dead_code)] Arc<Ping>);

    let registry = Registry::new();
    registry.register_async(&Key::<Ping>::new(), Lifecycle::Singleton, |r| async move {
        anyhow::Ok(Ping(r.resolve_async(&Key::<Pong>::new()).await?))
    });
    registry.register_async(&Key::<Pong>::new(), Lifecycle::Singleton, |r| async move {
        anyhow::Ok(Pong(r.resolve_async(&Key::<Ping>::new()).await?))
    });

    let err = registry
        .resolve_required_async(&Key::<Ping>::new())
        .await
        .unwrap_err();
    match err {
        DiError::CircularDependency { chain } => assert_eq!(chain.len(), 3),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_async_fallback_not_cached() {
    let registry = Registry::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    registry.register_async_with_fallback(
        &database_key(),
        Lifecycle::Singleton,
        move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<Database, _>(anyhow::anyhow!("connection refused"))
            }
        },
        |_| Ok(Database { url: "memory".into() }),
    );

    assert_eq!(registry.resolve_async(&database_key()).await.unwrap().url, "memory");
    assert_eq!(registry.resolve_async(&database_key()).await.unwrap().url, "memory");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_scoped_binding() {
    let registry = Registry::new();
    let key = Key::<Database>::named("session");
    registry.register_async(&key, Lifecycle::Scoped(ScopeKind::Session), |_| async {
        anyhow::Ok(Database { url: "session".into() })
    });

    let unscoped_a = registry.resolve_async(&key).await.unwrap();
    let unscoped_b = registry.resolve_async(&key).await.unwrap();
    assert!(!Arc::ptr_eq(&unscoped_a, &unscoped_b));

    registry.activate_scope(ScopeKind::Session, "s1");
    let scoped_a = registry.resolve_async(&key).await.unwrap();
    let scoped_b = registry.resolve_async(&key).await.unwrap();
    assert!(Arc::ptr_eq(&scoped_a, &scoped_b));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_first_resolution_builds_once() {
    let registry = Registry::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    registry.register_async(&database_key(), Lifecycle::Singleton, move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            anyhow::Ok(Database { url: "shared".into() })
        }
    });

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry.resolve_async(&database_key()).await.unwrap()
        }));
    }

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap());
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|db| Arc::ptr_eq(db, &instances[0])));
}
