//! Demonstrates the events the container logs over its lifetime
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use lifecycle_injector::{Container, LifecycleHooks, ResolveOptions, Resolver};
use std::sync::Arc;

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

fn connection_pool() -> LifecycleHooks {
    let mut hooks = LifecycleHooks::new();
    hooks
        .on_start("connect", || async {
            println!("    pool: connecting");
            Ok(())
        })
        .on_stop("disconnect", || async {
            println!("    pool: disconnecting");
            Ok(())
        });
    hooks
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> lifecycle_injector::Result<()> {
    // JSON if logging-json is enabled, pretty otherwise
    lifecycle_injector::logging::builder()
        .trace()
        .injector_only()
        .from_env()
        .init();

    println!("=== Lifecycle Injector Logging Demo ===\n");

    let container = Container::builder().label("demo").build();

    println!("1. Registering providers...");
    container.register_instance(Database {
        url: "postgres://localhost/mydb".into(),
    })?;
    container.register_singleton(|r: Resolver| async move {
        Ok(UserService {
            db: r.get::<Database>().await?,
        })
    })?;
    container
        .bind::<LifecycleHooks>()
        .in_scope("pool")
        .eager()
        .with_lifecycle()
        .to_singleton(|_| async { Ok(Arc::new(connection_pool())) })?;

    println!("\n2. Starting eager singletons...");
    container.initialize_eager_singletons().await?;
    println!("   state: {}", container.state());

    println!("\n3. Resolving services...");
    let _users = container.get::<UserService>().await?;
    let missing = container
        .resolve::<String>(ResolveOptions::new().silent(true))
        .await?;
    println!("   missing service resolved to {missing:?}");

    println!("\n4. Registry contents:");
    for info in container.providers() {
        println!(
            "   {} [{}] {} produced={}",
            info.type_key,
            info.scope.as_deref().unwrap_or("default"),
            info.kind,
            info.produced
        );
    }

    println!("\n5. Clearing container...");
    container.clear().await;
    println!("   state: {}, providers: {}", container.state(), container.len());

    Ok(())
}
