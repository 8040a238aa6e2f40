//! Dependency injection container
//!
//! The `Container` owns the provider registry, resolves contracts into
//! values, and drives the container-wide lifecycle: eager startup of
//! flagged singletons and orderly teardown on [`Container::clear`].

use crate::binding::Binding;
use crate::config::{ContainerBuilder, ContainerConfig};
use crate::inflight::InFlight;
use crate::instance::Instance;
use crate::key::{InjectionKey, TypeKey};
use crate::lifecycle::LifecycleEvent;
use crate::provider::{Injectable, Provider, ProviderInfo};
use crate::resolver::{ResolveOptions, Resolver};
use crate::storage::{Insertion, ServiceStorage};
use crate::{DiError, Result};
use futures::TryFutureExt;
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, error, info, warn};

/// Container-wide lifecycle state.
///
/// `Building -> Initializing -> Ready | Error` during eager startup, and
/// `Destroying -> Building` while [`Container::clear`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContainerState {
    /// Accepting registrations; nothing orchestrated yet
    Building = 0,
    /// Eager singletons are being built
    Initializing = 1,
    /// Every eager singleton is ready
    Ready = 2,
    /// Tearing down after `clear`
    Destroying = 3,
    /// Eager startup failed
    Error = 4,
}

impl ContainerState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ContainerState::Building,
            1 => ContainerState::Initializing,
            2 => ContainerState::Ready,
            3 => ContainerState::Destroying,
            _ => ContainerState::Error,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContainerState::Building => "building",
            ContainerState::Initializing => "initializing",
            ContainerState::Ready => "ready",
            ContainerState::Destroying => "destroying",
            ContainerState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Async dependency injection container.
///
/// Cloning is cheap and every clone refers to the same registry.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::Container;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let container = Container::new();
/// container.register_instance(5_i32).unwrap();
/// container.bind::<i32>().in_scope("named").to_instance(Arc::new(6)).unwrap();
///
/// assert_eq!(*container.get::<i32>().await.unwrap(), 5);
/// assert_eq!(*container.get_named::<i32>("named").await.unwrap(), 6);
/// # }
/// ```
#[derive(Clone)]
pub struct Container {
    /// Provider registry (lock-free)
    storage: Arc<ServiceStorage>,
    /// Current [`ContainerState`] as its `u8` discriminant
    state: Arc<AtomicU8>,
    /// Settings fixed at construction
    config: Arc<ContainerConfig>,
    /// Debug label, settable once
    label: Arc<OnceCell<String>>,
    /// Singleton builds in progress, for cross-tree cycle detection
    inflight: Arc<InFlight>,
}

impl Container {
    /// Create a new container with default settings.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lifecycle_injector::Container;
    /// let container = Container::new();
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Start configuring a container.
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Create a container from explicit settings.
    pub fn with_config(config: ContainerConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            label = config.label.as_deref(),
            silent = config.silent,
            allow_override = config.allow_override,
            "Creating new DI container"
        );

        let label = OnceCell::new();
        if let Some(initial) = &config.label {
            let _ = label.set(initial.clone());
        }

        Self {
            storage: Arc::new(ServiceStorage::with_capacity(config.capacity)),
            state: Arc::new(AtomicU8::new(ContainerState::Building as u8)),
            config: Arc::new(config),
            label: Arc::new(label),
            inflight: Arc::new(InFlight::default()),
        }
    }

    /// Settings this container was built with.
    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Debug label, if one was attached.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.get().map(String::as_str)
    }

    /// Attach a debug label. Returns `false` if one is already set.
    pub fn set_label(&self, label: impl Into<String>) -> bool {
        self.label.set(label.into()).is_ok()
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> ContainerState {
        ContainerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ContainerState) -> ContainerState {
        let previous = ContainerState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            label = self.label(),
            from = %previous,
            to = %state,
            "Container state changed"
        );

        previous
    }

    #[inline]
    pub(crate) fn storage(&self) -> &ServiceStorage {
        &self.storage
    }

    #[inline]
    pub(crate) fn inflight(&self) -> &Arc<InFlight> {
        &self.inflight
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Start a registration for contract `T`.
    ///
    /// `T` may be a trait object, so a value can be registered under a
    /// supertype. See [`Binding`] for the available options.
    #[inline]
    pub fn bind<T: ?Sized + Send + Sync + 'static>(&self) -> Binding<T> {
        Binding::new(self.clone())
    }

    /// Register a fixed value under its own type in the default scope.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lifecycle_injector::Container;
    ///
    /// struct Database { url: String }
    ///
    /// let container = Container::new();
    /// container.register_instance(Database { url: "postgres://localhost".into() }).unwrap();
    /// ```
    #[inline]
    pub fn register_instance<T: Injectable>(&self, value: T) -> Result<()> {
        self.bind::<T>().to_instance(Arc::new(value))
    }

    /// Register a builder that runs on every resolve.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lifecycle_injector::{Container, Resolver};
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// static COUNTER: AtomicU64 = AtomicU64::new(0);
    ///
    /// struct RequestId(u64);
    ///
    /// let container = Container::new();
    /// container
    ///     .register_factory(|_: Resolver| async {
    ///         Ok(RequestId(COUNTER.fetch_add(1, Ordering::SeqCst)))
    ///     })
    ///     .unwrap();
    /// ```
    #[inline]
    pub fn register_factory<T, F, Fut>(&self, builder: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.bind::<T>()
            .to_factory(move |resolver| builder(resolver).map_ok(Arc::new))
    }

    /// Register a builder that runs at most once, on first resolve.
    #[inline]
    pub fn register_singleton<T, F, Fut>(&self, builder: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.bind::<T>()
            .to_singleton(move |resolver| builder(resolver).map_ok(Arc::new))
    }

    /// Register a singleton built by [`initialize_eager_singletons`](Self::initialize_eager_singletons).
    #[inline]
    pub fn register_eager_singleton<T, F, Fut>(&self, builder: F) -> Result<()>
    where
        T: Injectable,
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.bind::<T>()
            .eager()
            .to_singleton(move |resolver| builder(resolver).map_ok(Arc::new))
    }

    /// Insert a provider, applying the override and silent rules.
    ///
    /// `None` for either setting falls back to the container default.
    pub(crate) fn register_provider(
        &self,
        key: InjectionKey,
        provider: Provider,
        allow_override: Option<bool>,
        silent: Option<bool>,
    ) -> Result<()> {
        if key.type_key.is_wildcard() {
            return Err(DiError::InvalidType {
                type_name: key.type_key.name(),
            });
        }

        let replace = allow_override.unwrap_or(self.config.allow_override);

        #[cfg(feature = "logging")]
        let (kind, eager) = (provider.kind(), provider.is_eager());

        match self.storage.insert(key.clone(), provider, replace) {
            Insertion::Inserted => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    service = key.type_key.name(),
                    scope = key.scope.as_deref(),
                    kind = %kind,
                    eager,
                    service_count = self.storage.len(),
                    "Registering provider"
                );
            }
            Insertion::Replaced => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    service = key.type_key.name(),
                    scope = key.scope.as_deref(),
                    kind = %kind,
                    eager,
                    "Overriding existing provider"
                );
            }
            Insertion::Kept if silent.unwrap_or(self.config.silent) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: crate::logging::TARGET,
                    service = key.type_key.name(),
                    scope = key.scope.as_deref(),
                    "Ignoring conflicting registration in silent mode"
                );
            }
            Insertion::Kept => {
                return Err(DiError::RegistrationConflict {
                    type_name: key.type_key.name(),
                    scope: key.scope,
                });
            }
        }

        Ok(())
    }

    /// Remove the provider for `T`.
    ///
    /// If it holds a lifecycle-aware value, the stop hook is awaited first.
    /// A stop failure is returned after the provider has been removed.
    /// Returns `Ok(false)` when nothing was registered and the miss is
    /// tolerated (silent mode or override permission).
    pub async fn unregister<T: ?Sized + 'static>(&self, scope: Option<&str>) -> Result<bool> {
        self.unregister_with::<T>(scope, None, None).await
    }

    /// [`unregister`](Self::unregister) with explicit override and silent
    /// settings. `None` uses the container default.
    pub async fn unregister_with<T: ?Sized + 'static>(
        &self,
        scope: Option<&str>,
        allow_override: Option<bool>,
        silent: Option<bool>,
    ) -> Result<bool> {
        let key = InjectionKey::new(TypeKey::of::<T>(), scope.map(Arc::from));

        let Some(provider) = self.storage.get(&key) else {
            let tolerated = allow_override.unwrap_or(self.config.allow_override)
                || silent.unwrap_or(self.config.silent);
            if tolerated {
                return Ok(false);
            }
            return Err(DiError::NotRegistered {
                type_name: key.type_key.name(),
                scope: key.scope,
            });
        };

        let stopped = match provider.produced().and_then(Instance::lifecycle) {
            Some(component) => component.handle_event(LifecycleEvent::Stop).await,
            None => Ok(()),
        };

        let removed = self.storage.remove_if_same(&key, &provider);

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            service = key.type_key.name(),
            scope = key.scope.as_deref(),
            removed,
            stop_failed = stopped.is_err(),
            "Unregistered provider"
        );

        stopped.map(|()| removed)
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// A resolver with an empty loading stack.
    #[inline]
    pub fn resolver(&self) -> Resolver {
        Resolver::root(self.clone())
    }

    /// Resolve `T` from the default scope.
    ///
    /// Returns `Arc<T>` for zero-copy sharing. Always strict: a missing
    /// provider is [`DiError::NotRegistered`] even in silent mode.
    #[inline]
    pub async fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolver().get::<T>().await
    }

    /// Resolve `T` from a named scope.
    #[inline]
    pub async fn get_named<T: ?Sized + Send + Sync + 'static>(&self, scope: &str) -> Result<Arc<T>> {
        self.resolver().get_named::<T>(scope).await
    }

    /// Try to resolve `T`, returning `None` on any failure.
    #[inline]
    pub async fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolver().try_get::<T>().await
    }

    /// Resolve `T` with explicit options (scope, silent override, fallback).
    #[inline]
    pub async fn resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
        options: ResolveOptions,
    ) -> Result<Option<Arc<T>>> {
        self.resolver().resolve::<T>(options).await
    }

    /// Check if a provider for `T` is registered in `scope`.
    #[inline]
    pub fn contains<T: ?Sized + 'static>(&self, scope: Option<&str>) -> bool {
        self.storage
            .contains(&InjectionKey::new(TypeKey::of::<T>(), scope.map(Arc::from)))
    }

    /// Get the number of registered providers across all scopes.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the container is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Every registered `(scope, contract, provider)` entry.
    pub fn providers(&self) -> impl Iterator<Item = ProviderInfo> {
        self.storage.snapshot().into_iter()
    }

    // =========================================================================
    // Lifecycle Methods
    // =========================================================================

    /// Build every eager singleton concurrently and wait until all are ready.
    ///
    /// Each singleton gets [`ContainerConfig::eager_init_timeout`]. The first
    /// failure (builder error, timeout, failed start hook) ends the wait,
    /// moves the container to [`ContainerState::Error`] and is returned
    /// wrapped in [`DiError::EagerInitFailed`]. Builds still running at
    /// that point are left to finish on their own.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// If the returned future is dropped before it completes, the container
    /// moves to [`ContainerState::Error`].
    ///
    /// # Panics
    ///
    /// Panics if eager initialization is already in progress.
    pub async fn initialize_eager_singletons(&self) -> Result<()> {
        if self.set_state(ContainerState::Initializing) == ContainerState::Initializing {
            panic!("Eager initialization is already in progress");
        }
        let guard = InitGuard {
            container: self,
            armed: true,
        };

        let pending = self.storage.eager_pending();
        let timeout = self.config.eager_init_timeout;

        #[cfg(feature = "logging")]
        info!(
            target: crate::logging::TARGET,
            label = self.label(),
            count = pending.len(),
            timeout = ?timeout,
            "Starting eager singleton initialization"
        );

        let waits = pending.into_iter().map(|(key, provider)| {
            let type_key = key.type_key;
            let resolver = self.resolver();
            let handle = tokio::spawn(async move { resolver.produce(&key, &provider).await });

            async move {
                let outcome = match tokio::time::timeout(timeout, handle).await {
                    Err(_) => Err(DiError::EagerInitTimeout {
                        type_name: type_key.name(),
                        timeout,
                    }),
                    Ok(Err(join)) => Err(DiError::CreationFailed {
                        type_name: type_key.name(),
                        reason: join.to_string(),
                    }),
                    Ok(Ok(produced)) => produced.map(|_| ()),
                };
                outcome.map_err(|source| DiError::EagerInitFailed {
                    type_name: type_key.name(),
                    source: Box::new(source),
                })
            }
        });

        match futures::future::try_join_all(waits).await {
            Ok(ready) => {
                guard.finish(ContainerState::Ready);

                #[cfg(feature = "logging")]
                info!(
                    target: crate::logging::TARGET,
                    label = self.label(),
                    count = ready.len(),
                    "Eager singletons ready"
                );
                #[cfg(not(feature = "logging"))]
                let _ = ready;

                Ok(())
            }
            Err(err) => {
                guard.finish(ContainerState::Error);

                #[cfg(feature = "logging")]
                error!(
                    target: crate::logging::TARGET,
                    label = self.label(),
                    error = %err,
                    "Eager singleton initialization failed"
                );

                Err(err)
            }
        }
    }

    /// Remove every provider and stop every lifecycle-aware value.
    ///
    /// Stop hooks run one value at a time. Failures are logged and
    /// otherwise ignored, so one failing component never keeps the others
    /// from being torn down. A value registered under several contracts is
    /// stopped once.
    pub async fn clear(&self) {
        self.set_state(ContainerState::Destroying);

        let removed = self.storage.drain();

        #[cfg(feature = "logging")]
        info!(
            target: crate::logging::TARGET,
            label = self.label(),
            services_removed = removed.len(),
            "Clearing container"
        );

        let mut stopped = HashSet::new();
        for (key, provider) in &removed {
            let Some(component) = provider.produced().and_then(Instance::lifecycle) else {
                continue;
            };
            if !stopped.insert(component.instance_id()) {
                continue;
            }

            if let Err(err) = component.handle_event(LifecycleEvent::Stop).await {
                #[cfg(feature = "logging")]
                error!(
                    target: crate::logging::TARGET,
                    service = key.type_key.name(),
                    scope = key.scope.as_deref(),
                    instance = %component.instance_id(),
                    error = %err,
                    "Stop hook failed during clear"
                );
                #[cfg(not(feature = "logging"))]
                let _ = (key, err);
            }
        }

        self.set_state(ContainerState::Building);
    }
}

/// Moves the container to `Error` if eager startup is abandoned mid-wait.
struct InitGuard<'a> {
    container: &'a Container,
    armed: bool,
}

impl InitGuard<'_> {
    fn finish(mut self, state: ContainerState) {
        self.armed = false;
        self.container.set_state(state);
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            #[cfg(feature = "logging")]
            warn!(
                target: crate::logging::TARGET,
                label = self.container.label(),
                "Eager singleton initialization was cancelled"
            );

            self.container.set_state(ContainerState::Error);
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("label", &self.label())
            .field("state", &self.state())
            .field("service_count", &self.len())
            .finish()
    }
}
