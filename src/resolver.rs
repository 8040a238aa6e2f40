//! Resolution engine
//!
//! A [`Resolver`] is the handle builders receive. It carries the loading
//! stack of the call tree it belongs to: every nested resolution gets a
//! child resolver with the contract being built pushed on top, and the pop
//! happens when that child is dropped, whether production succeeded or not.
//! Concurrent call trees therefore never share a stack.

use crate::inflight::TreeId;
use crate::instance::Instance;
use crate::key::{InjectionKey, TypeKey};
use crate::provider::Provider;
use crate::storage::Insertion;
use crate::{Container, DiError, Result};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Per-call resolution settings.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::ResolveOptions;
///
/// let options = ResolveOptions::new().scope("reporting").silent(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    scope: Option<Arc<str>>,
    silent: Option<bool>,
    auto_register_fallback: bool,
}

impl ResolveOptions {
    /// Default scope, container-wide silent setting, no fallback.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve inside a named scope.
    #[inline]
    pub fn scope(mut self, name: impl Into<Arc<str>>) -> Self {
        self.scope = Some(name.into());
        self
    }

    /// Override the container's silent mode for this call.
    ///
    /// When silent, a missing provider yields `Ok(None)` instead of
    /// [`DiError::NotRegistered`].
    #[inline]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    /// If nothing is registered, adopt an already-produced value that
    /// supports the requested contract.
    ///
    /// The match is registered as a fixed instance under the requested
    /// contract and scope, so later lookups find it directly. Any produced
    /// value that declared the contract as a view qualifies, even one
    /// registered for an unrelated purpose.
    #[inline]
    pub fn auto_register_fallback(mut self) -> Self {
        self.auto_register_fallback = true;
        self
    }
}

/// Handle used to resolve dependencies inside a call tree.
#[derive(Clone)]
pub struct Resolver {
    container: Container,
    tree: TreeId,
    stack: Vec<TypeKey>,
}

impl Resolver {
    /// Start a new call tree with an empty loading stack.
    #[inline]
    pub(crate) fn root(container: Container) -> Self {
        Self {
            container,
            tree: TreeId::next(),
            stack: Vec::new(),
        }
    }

    /// The container this resolver reads from.
    #[inline]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[inline]
    pub(crate) fn tree(&self) -> TreeId {
        self.tree
    }

    /// Contracts currently being produced, outermost first.
    #[inline]
    pub fn loading_stack(&self) -> &[TypeKey] {
        &self.stack
    }

    fn push(&self, key: TypeKey) -> Self {
        let mut stack = Vec::with_capacity(self.stack.len() + 1);
        stack.extend_from_slice(&self.stack);
        stack.push(key);
        Self {
            container: self.container.clone(),
            tree: self.tree,
            stack,
        }
    }

    /// Resolve `T` from the default scope.
    ///
    /// Always strict: a missing provider is an error even in silent mode.
    pub async fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>(ResolveOptions::new().silent(false))
            .await?
            .ok_or_else(|| DiError::not_registered::<T>(None))
    }

    /// Resolve `T` from a named scope.
    pub async fn get_named<T: ?Sized + Send + Sync + 'static>(&self, scope: &str) -> Result<Arc<T>> {
        self.resolve::<T>(ResolveOptions::new().scope(scope).silent(false))
            .await?
            .ok_or_else(|| DiError::not_registered::<T>(Some(Arc::from(scope))))
    }

    /// Resolve `T`, returning `None` on any failure.
    pub async fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().await.ok()
    }

    /// Resolve `T` with explicit options.
    ///
    /// Returns `Ok(None)` only when nothing is registered and silent mode
    /// applies.
    pub async fn resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
        options: ResolveOptions,
    ) -> Result<Option<Arc<T>>> {
        match self.resolve_instance(TypeKey::of::<T>(), options).await? {
            Some(instance) => instance.value::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Untyped resolution: look up, fall back, check for cycles, produce,
    /// and wait for readiness.
    pub async fn resolve_instance(
        &self,
        type_key: TypeKey,
        options: ResolveOptions,
    ) -> Result<Option<Instance>> {
        if type_key.is_wildcard() {
            return Err(DiError::InvalidType {
                type_name: type_key.name(),
            });
        }

        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            service = type_key.name(),
            scope = options.scope.as_deref(),
            depth = self.stack.len(),
            "Resolving service"
        );

        let key = InjectionKey::new(type_key, options.scope.clone());
        let provider = self.container.storage().get(&key);

        let Some(provider) = provider else {
            if options.auto_register_fallback {
                if let Some(instance) = self.adopt(key.clone()) {
                    instance.ready().await?;
                    return Ok(Some(instance));
                }
            }

            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                service = type_key.name(),
                scope = options.scope.as_deref(),
                "Service not registered"
            );

            let silent = options.silent.unwrap_or(self.container.config().silent);
            return if silent {
                Ok(None)
            } else {
                Err(DiError::NotRegistered {
                    type_name: type_key.name(),
                    scope: key.scope,
                })
            };
        };

        self.produce(&key, &provider).await.map(Some)
    }

    /// Cycle check, push, produce, wait for readiness.
    pub(crate) async fn produce(&self, key: &InjectionKey, provider: &Provider) -> Result<Instance> {
        let type_key = key.type_key;
        if self.stack.contains(&type_key) {
            let mut stack: Vec<&'static str> = self.stack.iter().map(TypeKey::name).collect();
            stack.push(type_key.name());

            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                service = type_key.name(),
                stack = ?stack,
                "Circular dependency detected"
            );

            return Err(DiError::CircularDependency {
                type_name: type_key.name(),
                stack,
            });
        }

        let instance = provider.produce(key, self.push(type_key)).await?;
        instance.ready().await?;
        Ok(instance)
    }

    /// Fallback search: adopt a produced value that supports the contract
    /// and memoize it under `key`.
    fn adopt(&self, key: InjectionKey) -> Option<Instance> {
        let storage = self.container.storage();
        let instance = storage.find_produced(key.type_key)?;

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            service = key.type_key.name(),
            scope = key.scope.as_deref(),
            adopted_from = instance.type_key().name(),
            "Adopting existing instance as fallback"
        );

        // A concurrent registration may have claimed the key meanwhile; the
        // adopted value is still returned to this caller.
        if storage.insert(key, Provider::Instance(instance.clone()), false) == Insertion::Kept {
            #[cfg(feature = "logging")]
            trace!(
                target: crate::logging::TARGET,
                "Fallback key was registered concurrently, keeping existing provider"
            );
        }

        Some(instance)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("tree", &self.tree)
            .field("stack", &self.stack)
            .finish()
    }
}
