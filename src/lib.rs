//! # Lifecycle Injector - Async Dependency Injection with Lifecycle Management
//!
//! An async dependency injection container that resolves contracts into
//! values and drives their start/stop lifecycle.
//!
//! ## Features
//!
//! - **Contracts, not just types** - Bind a value under its own type or a trait object
//! - **Named scopes** - Independent registrations of the same contract
//! - **Three provider kinds** - Fixed instances, factories and exactly-once singletons
//! - **Async builders** - Builders resolve their own dependencies through a [`Resolver`]
//! - **Cycle detection** - Reported with the full chain of contracts being built
//! - **Lifecycle hooks** - Start before first use, stop on unregister and clear
//! - **Eager startup** - Concurrent, time-bounded, fail-fast initialization
//! - **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_injector::{Container, Resolver};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: std::sync::Arc<Database>,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> lifecycle_injector::Result<()> {
//! let container = Container::new();
//!
//! container.register_instance(Database { url: "postgres://localhost".into() })?;
//! container.register_singleton(|r: Resolver| async move {
//!     Ok(UserService { db: r.get::<Database>().await? })
//! })?;
//!
//! // Resolve - returns Arc<T> for zero-copy sharing
//! let users = container.get::<UserService>().await?;
//! assert_eq!(users.db.url, "postgres://localhost");
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! ```rust
//! use lifecycle_injector::{Container, ContainerState, LifecycleHooks};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> lifecycle_injector::Result<()> {
//! let container = Container::new();
//!
//! container
//!     .bind::<LifecycleHooks>()
//!     .eager()
//!     .with_lifecycle()
//!     .to_singleton(|_| async {
//!         let mut hooks = LifecycleHooks::new();
//!         hooks
//!             .on_start("open", || async { Ok(()) })
//!             .on_stop("close", || async { Ok(()) });
//!         Ok(Arc::new(hooks))
//!     })?;
//!
//! container.initialize_eager_singletons().await?;
//! assert_eq!(container.state(), ContainerState::Ready);
//!
//! container.clear().await;
//! assert!(container.is_empty());
//! # Ok(())
//! # }
//! ```

mod binding;
mod config;
mod container;
mod error;
mod global;
mod inflight;
mod instance;
mod key;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod resolver;
mod storage;

pub use binding::*;
pub use config::*;
pub use container::*;
pub use error::*;
pub use global::*;
pub use instance::*;
pub use key::*;
pub use lifecycle::*;
pub use provider::*;
pub use resolver::*;

// Re-exported so lifecycle implementations need no direct dependency
pub use async_trait::async_trait;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Binding, Container, ContainerState, DiError, Injectable, LifecycleAware, LifecycleEvent,
        LifecycleHooks, ResolveOptions, Resolver, Result, async_trait, global,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Database {
        url: String,
    }

    #[derive(Debug)]
    struct UserService {
        db: Arc<Database>,
    }

    trait Repository: Send + Sync {
        fn table(&self) -> &str;
    }

    struct UserRepository;

    impl Repository for UserRepository {
        fn table(&self) -> &str {
            "users"
        }
    }

    #[tokio::test]
    async fn test_dependency_chain() {
        let container = Container::new();
        container
            .register_instance(Database { url: "test".into() })
            .unwrap();
        container
            .register_singleton(|r: Resolver| async move {
                Ok(UserService {
                    db: r.get::<Database>().await?,
                })
            })
            .unwrap();

        let users = container.get::<UserService>().await.unwrap();
        let db = container.get::<Database>().await.unwrap();

        // The singleton holds the registered instance
        assert!(Arc::ptr_eq(&users.db, &db));
        assert_eq!(users.db.url, "test");
    }

    #[tokio::test]
    async fn test_trait_object_contract() {
        let container = Container::new();
        container
            .bind::<dyn Repository>()
            .to_singleton(|_| async { Ok(Arc::new(UserRepository) as Arc<dyn Repository>) })
            .unwrap();

        let repo = container.get::<dyn Repository>().await.unwrap();
        assert_eq!(repo.table(), "users");
    }

    #[tokio::test]
    async fn test_not_found_error() {
        let container = Container::new();
        let result = container.get::<Database>().await;
        assert!(matches!(result, Err(DiError::NotRegistered { .. })));
    }

    #[tokio::test]
    async fn test_failed_dependency_propagates() {
        let container = Container::new();
        container
            .register_factory(|r: Resolver| async move {
                Ok(UserService {
                    db: r.get::<Database>().await?,
                })
            })
            .unwrap();

        let err = container.get::<UserService>().await.unwrap_err();
        assert!(matches!(err, DiError::NotRegistered { .. }));
    }
}
