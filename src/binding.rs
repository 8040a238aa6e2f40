//! Fluent registration
//!
//! [`Container::bind`] starts a [`Binding`] for a contract. The contract can
//! be the value's own type or a supertype such as a trait object; options
//! are chained and a terminal method (`to_instance`, `to_factory`,
//! `to_singleton`) performs the registration.
//!
//! # Examples
//!
//! ```rust
//! use lifecycle_injector::Container;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".into()
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let container = Container::new();
//!
//! container
//!     .bind::<dyn Greeter>()
//!     .in_scope("en")
//!     .to_instance(Arc::new(English))
//!     .unwrap();
//!
//! let greeter = container.get_named::<dyn Greeter>("en").await.unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! # }
//! ```

use crate::instance::{Erased, Instance, ViewCast};
use crate::key::{InjectionKey, TypeKey};
use crate::lifecycle::LifecycleAware;
use crate::provider::{Builder, Provider};
use crate::resolver::Resolver;
use crate::{Container, Result};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Pending registration of contract `T`.
#[must_use = "a binding does nothing until `to_instance`, `to_factory` or `to_singleton` is called"]
pub struct Binding<T: ?Sized + 'static> {
    container: Container,
    scope: Option<Arc<str>>,
    allow_override: Option<bool>,
    silent: Option<bool>,
    eager: bool,
    casts: Vec<(TypeKey, ViewCast<T>)>,
}

/// Registration settings carried from a binding to the container.
struct Policy {
    allow_override: Option<bool>,
    silent: Option<bool>,
}

impl<T: ?Sized + Send + Sync + 'static> Binding<T> {
    pub(crate) fn new(container: Container) -> Self {
        Self {
            container,
            scope: None,
            allow_override: None,
            silent: None,
            eager: false,
            casts: Vec::new(),
        }
    }

    /// Register inside a named scope instead of the default one.
    #[inline]
    pub fn in_scope(mut self, name: impl Into<Arc<str>>) -> Self {
        self.scope = Some(name.into());
        self
    }

    /// Override the container's default for replacing an existing provider.
    #[inline]
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.allow_override = Some(allow);
        self
    }

    /// Override the container's silent mode for this registration.
    ///
    /// When silent, a conflicting registration keeps the existing provider
    /// and returns `Ok(())` instead of [`DiError::RegistrationConflict`](crate::DiError::RegistrationConflict).
    #[inline]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    /// Build during [`Container::initialize_eager_singletons`].
    ///
    /// Only meaningful for [`to_singleton`](Self::to_singleton); fixed
    /// instances and factories ignore it and log that they did.
    #[inline]
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Declare that the value also satisfies contract `I`.
    ///
    /// Views are what capability checks consult: the container finds a
    /// value's lifecycle hooks through its `dyn LifecycleAware` view, and
    /// fallback resolution matches values through their views.
    pub fn exposing<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let cast: ViewCast<T> = Arc::new(move |value: &Arc<T>| {
            Arc::new(cast(Arc::clone(value))) as Erased
        });
        self.casts.push((TypeKey::of::<I>(), cast));
        self
    }

    /// Bind a fixed value.
    pub fn to_instance(self, value: Arc<T>) -> Result<()> {
        self.warn_if_eager("instance");
        let instance = Instance::new(value, &self.casts);
        let (container, key, policy) = self.into_parts();
        container.register_provider(key, Provider::Instance(instance), policy.allow_override, policy.silent)
    }

    /// Bind a builder invoked on every resolve.
    pub fn to_factory<F, Fut>(self, builder: F) -> Result<()>
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        self.warn_if_eager("factory");
        let builder = Self::erase(builder, self.casts.clone());
        let (container, key, policy) = self.into_parts();
        container.register_provider(key, Provider::Factory(builder), policy.allow_override, policy.silent)
    }

    /// Bind a builder invoked at most once.
    pub fn to_singleton<F, Fut>(self, builder: F) -> Result<()>
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        let eager = self.eager;
        let builder = Self::erase(builder, self.casts.clone());
        let (container, key, policy) = self.into_parts();
        container.register_provider(
            key,
            Provider::singleton(builder, eager),
            policy.allow_override,
            policy.silent,
        )
    }

    fn erase<F, Fut>(builder: F, casts: Vec<(TypeKey, ViewCast<T>)>) -> Builder
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>>> + Send + 'static,
    {
        let casts: Arc<[(TypeKey, ViewCast<T>)]> = casts.into();
        Arc::new(move |resolver: Resolver| {
            let casts = Arc::clone(&casts);
            builder(resolver)
                .map(move |value| value.map(|value| Instance::new(value, &casts)))
                .boxed()
        })
    }

    fn warn_if_eager(&self, _kind: &'static str) {
        #[cfg(feature = "logging")]
        if self.eager {
            tracing::debug!(
                target: crate::logging::TARGET,
                service = TypeKey::of::<T>().name(),
                kind = _kind,
                "Eager flag ignored: only singletons are built eagerly"
            );
        }
    }

    fn into_parts(self) -> (Container, InjectionKey, Policy) {
        let key = InjectionKey::new(TypeKey::of::<T>(), self.scope);
        let policy = Policy {
            allow_override: self.allow_override,
            silent: self.silent,
        };
        (self.container, key, policy)
    }
}

impl<T: LifecycleAware + 'static> Binding<T> {
    /// Declare the value's [`LifecycleAware`] capability.
    ///
    /// Its start hook then runs before the value is handed out, and its
    /// stop hook runs on [`Container::unregister`] and [`Container::clear`].
    pub fn with_lifecycle(self) -> Self {
        self.exposing::<dyn LifecycleAware, _>(|value: Arc<T>| value as Arc<dyn LifecycleAware>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiError, LifecycleHooks, ProviderKind, ResolveOptions};

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[tokio::test]
    async fn test_bind_supertype() {
        let container = Container::new();
        container.bind::<dyn Shape>().to_instance(Arc::new(Square)).unwrap();

        let shape = container.get::<dyn Shape>().await.unwrap();
        assert_eq!(shape.sides(), 4);
        assert!(container.get::<Square>().await.is_err());
    }

    #[tokio::test]
    async fn test_bind_wildcard_is_rejected() {
        let container = Container::new();
        let err = container
            .bind::<dyn std::any::Any + Send + Sync>()
            .to_instance(Arc::new(1_u8))
            .unwrap_err();
        assert!(matches!(err, DiError::InvalidType { .. }));
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_views_feed_fallback() {
        let container = Container::new();
        container
            .bind::<Square>()
            .exposing::<dyn Shape, _>(|s| s as Arc<dyn Shape>)
            .to_singleton(|_| async { Ok(Arc::new(Square)) })
            .unwrap();

        // Nothing produced yet, so nothing to adopt
        let none = container
            .resolve::<dyn Shape>(ResolveOptions::new().auto_register_fallback().silent(true))
            .await
            .unwrap();
        assert!(none.is_none());

        container.get::<Square>().await.unwrap();
        let shape = container
            .resolve::<dyn Shape>(ResolveOptions::new().auto_register_fallback())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shape.sides(), 4);
        assert!(container.contains::<dyn Shape>(None));
    }

    #[tokio::test]
    async fn test_silent_binding_keeps_first() {
        let container = Container::new();
        container.bind::<u16>().to_instance(Arc::new(1)).unwrap();

        container
            .bind::<u16>()
            .silent(true)
            .to_instance(Arc::new(2))
            .unwrap();
        assert_eq!(*container.get::<u16>().await.unwrap(), 1);

        let err = container.bind::<u16>().to_instance(Arc::new(3)).unwrap_err();
        assert!(matches!(err, DiError::RegistrationConflict { .. }));
    }

    #[tokio::test]
    async fn test_eager_ignored_outside_singletons() {
        let container = Container::new();
        container.bind::<u8>().eager().to_instance(Arc::new(1)).unwrap();
        container
            .bind::<u16>()
            .eager()
            .to_factory(|_| async { Ok(Arc::new(2_u16)) })
            .unwrap();

        assert!(container.providers().all(|info| !info.eager));
        container.initialize_eager_singletons().await.unwrap();
    }

    #[tokio::test]
    async fn test_eager_flag_is_recorded() {
        let container = Container::new();
        container
            .bind::<LifecycleHooks>()
            .eager()
            .with_lifecycle()
            .to_singleton(|_| async { Ok(Arc::new(LifecycleHooks::new())) })
            .unwrap();

        let info = container.providers().next().unwrap();
        assert_eq!(info.kind, ProviderKind::Singleton);
        assert!(info.eager);
        assert!(!info.produced);
    }
}
