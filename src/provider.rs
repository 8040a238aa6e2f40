//! Providers: how a registered contract produces its value
//!
//! ## Variants
//!
//! - **Instance** - a fixed value, returned as-is on every resolve
//! - **Factory** - a builder invoked on every resolve, never cached
//! - **Singleton** - a builder invoked at most once; the first successful
//!   result is cached and shared. Optionally flagged for eager startup.

use crate::instance::Instance;
use crate::key::{InjectionKey, TypeKey};
use crate::resolver::Resolver;
use crate::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Marker trait for types that can be stored in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Type-erased async builder.
///
/// Receives a [`Resolver`] whose loading stack already contains the
/// contract being built, so nested resolutions extend the same stack.
pub(crate) type Builder = Arc<dyn Fn(Resolver) -> BoxFuture<'static, Result<Instance>> + Send + Sync>;

/// How a provider produces values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Fixed value
    Instance,
    /// New value on every resolve
    Factory,
    /// Built once, then shared
    Singleton,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Instance => f.write_str("instance"),
            ProviderKind::Factory => f.write_str("factory"),
            ProviderKind::Singleton => f.write_str("singleton"),
        }
    }
}

/// Registry entry.
pub(crate) enum Provider {
    /// Fixed value
    Instance(Instance),
    /// Invoked per resolve
    Factory(Builder),
    /// Invoked at most once; `cell` holds the first successful result
    Singleton {
        builder: Builder,
        eager: bool,
        cell: OnceCell<Instance>,
    },
}

impl Provider {
    #[inline]
    pub(crate) fn singleton(builder: Builder, eager: bool) -> Self {
        Provider::Singleton {
            builder,
            eager,
            cell: OnceCell::new(),
        }
    }

    #[inline]
    pub(crate) fn kind(&self) -> ProviderKind {
        match self {
            Provider::Instance(_) => ProviderKind::Instance,
            Provider::Factory(_) => ProviderKind::Factory,
            Provider::Singleton { .. } => ProviderKind::Singleton,
        }
    }

    /// Whether this is a singleton flagged for eager startup.
    #[inline]
    pub(crate) fn is_eager(&self) -> bool {
        matches!(self, Provider::Singleton { eager: true, .. })
    }

    /// The value this provider holds, if it has one.
    ///
    /// Fixed values and cached singletons count; factories never hold one.
    #[inline]
    pub(crate) fn produced(&self) -> Option<&Instance> {
        match self {
            Provider::Instance(instance) => Some(instance),
            Provider::Factory(_) => None,
            Provider::Singleton { cell, .. } => cell.get(),
        }
    }

    /// Produce (or fetch) the instance for this provider.
    ///
    /// Singleton production is exactly-once even when several tasks race;
    /// a failed build leaves the singleton empty. Before waiting on a build
    /// another call tree owns, the wait-for graph is checked so a cycle
    /// spanning trees fails instead of waiting forever.
    pub(crate) async fn produce(&self, key: &InjectionKey, resolver: Resolver) -> Result<Instance> {
        match self {
            Provider::Instance(instance) => Ok(instance.clone()),
            Provider::Factory(builder) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: crate::logging::TARGET,
                    service = key.type_key.name(),
                    "Creating new factory instance"
                );

                builder(resolver).await
            }
            Provider::Singleton { builder, cell, .. } => {
                if let Some(instance) = cell.get() {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: crate::logging::TARGET,
                        service = key.type_key.name(),
                        "Singleton already built, returning cached instance"
                    );

                    return Ok(instance.clone());
                }

                let inflight = Arc::clone(resolver.container().inflight());
                let tree = resolver.tree();
                let held = match resolver.loading_stack().split_last() {
                    Some((_, held)) => held,
                    None => &[],
                };
                let waiting = inflight.wait_for(key, tree, held)?;

                let instance = cell
                    .get_or_try_init(move || {
                        drop(waiting);
                        let owner = inflight.begin(key.clone(), tree);

                        #[cfg(feature = "logging")]
                        debug!(
                            target: crate::logging::TARGET,
                            service = key.type_key.name(),
                            scope = key.scope.as_deref(),
                            "Building singleton"
                        );

                        let build = builder(resolver);
                        async move {
                            let _owner = owner;
                            build.await
                        }
                    })
                    .await?;
                Ok(instance.clone())
            }
        }
    }
}

/// Snapshot of one registry entry, as yielded by
/// [`Container::providers`](crate::Container::providers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Scope name, `None` for the default scope
    pub scope: Option<Arc<str>>,
    /// Registered contract
    pub type_key: TypeKey,
    /// Provider variant
    pub kind: ProviderKind,
    /// Flagged for eager startup
    pub eager: bool,
    /// Holds a value (fixed instance or built singleton)
    pub produced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Container;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestService {
        id: u32,
    }

    fn counting_builder(counter: &'static AtomicU32) -> Builder {
        Arc::new(move |_resolver| {
            async move {
                let id = counter.fetch_add(1, Ordering::SeqCst);
                Ok(Instance::new(Arc::new(TestService { id }), &[]))
            }
            .boxed()
        })
    }

    fn resolver() -> Resolver {
        Resolver::root(Container::new())
    }

    #[tokio::test]
    async fn test_instance_provider() {
        let provider = Provider::Instance(Instance::new(Arc::new(TestService { id: 42 }), &[]));
        let key = InjectionKey::new(TypeKey::of::<TestService>(), None);

        let a = provider.produce(&key, resolver()).await.unwrap();
        let b = provider.produce(&key, resolver()).await.unwrap();

        let a = a.value::<TestService>().unwrap();
        let b = b.value::<TestService>().unwrap();
        assert_eq!(a.id, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_singleton_provider() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let provider = Provider::singleton(counting_builder(&COUNTER), false);
        let key = InjectionKey::new(TypeKey::of::<TestService>(), None);
        assert!(provider.produced().is_none());

        let a = provider.produce(&key, resolver()).await.unwrap();
        assert_eq!(COUNTER.load(Ordering::SeqCst), 1);

        let b = provider.produce(&key, resolver()).await.unwrap();
        assert_eq!(COUNTER.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &a.value::<TestService>().unwrap(),
            &b.value::<TestService>().unwrap()
        ));
        assert!(provider.produced().is_some());
    }

    #[tokio::test]
    async fn test_factory_provider() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let provider = Provider::Factory(counting_builder(&COUNTER));
        let key = InjectionKey::new(TypeKey::of::<TestService>(), None);

        let a = provider.produce(&key, resolver()).await.unwrap();
        let b = provider.produce(&key, resolver()).await.unwrap();

        assert_eq!(a.value::<TestService>().unwrap().id, 0);
        assert_eq!(b.value::<TestService>().unwrap().id, 1);
        assert!(provider.produced().is_none());
    }

    #[tokio::test]
    async fn test_failed_singleton_is_not_cached() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

        let builder: Builder = Arc::new(|_resolver| {
            async {
                if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(crate::DiError::creation_failed::<TestService>("first try"))
                } else {
                    Ok(Instance::new(Arc::new(TestService { id: 9 }), &[]))
                }
            }
            .boxed()
        });
        let provider = Provider::singleton(builder, false);
        let key = InjectionKey::new(TypeKey::of::<TestService>(), None);

        assert!(provider.produce(&key, resolver()).await.is_err());
        assert!(provider.produced().is_none());

        let instance = provider.produce(&key, resolver()).await.unwrap();
        assert_eq!(instance.value::<TestService>().unwrap().id, 9);
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_kinds() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let fixed = Provider::Instance(Instance::new(Arc::new(1_u8), &[]));
        let factory = Provider::Factory(counting_builder(&COUNTER));
        let eager = Provider::singleton(counting_builder(&COUNTER), true);

        assert_eq!(fixed.kind(), ProviderKind::Instance);
        assert_eq!(factory.kind(), ProviderKind::Factory);
        assert_eq!(eager.kind(), ProviderKind::Singleton);
        assert!(eager.is_eager());
        assert!(!factory.is_eager());
    }
}
