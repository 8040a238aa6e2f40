//! Lifecycle hooks for produced values
//!
//! Any value handed to the container may opt into start/stop handling by
//! implementing [`LifecycleAware`] and declaring the capability at
//! registration (see [`Binding::with_lifecycle`](crate::Binding::with_lifecycle)).
//! Nothing requires a common base type.
//!
//! [`LifecycleHooks`] is the usual way to implement the trait: components
//! register named hooks while they are being built and forward events to
//! [`LifecycleHooks::dispatch`].
//!
//! # Example
//!
//! ```rust
//! use lifecycle_injector::{InstanceId, LifecycleAware, LifecycleEvent, LifecycleHooks, Result};
//! use lifecycle_injector::async_trait;
//!
//! struct Pool {
//!     hooks: LifecycleHooks,
//! }
//!
//! impl Pool {
//!     fn new() -> Self {
//!         let mut hooks = LifecycleHooks::new();
//!         hooks
//!             .on_start("connect", || async { Ok(()) })
//!             .on_stop("disconnect", || async { Ok(()) });
//!         Self { hooks }
//!     }
//! }
//!
//! #[async_trait]
//! impl LifecycleAware for Pool {
//!     fn instance_id(&self) -> InstanceId {
//!         self.hooks.id()
//!     }
//!
//!     async fn handle_event(&self, event: LifecycleEvent) -> Result<()> {
//!         self.hooks.dispatch(event).await
//!     }
//! }
//! ```

use crate::{DiError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{error, trace};

/// Process-unique identifier of a lifecycle-aware value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Generate a new unique instance ID.
    #[inline]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Event delivered to a lifecycle-aware value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The value was produced and should finish its setup
    Start,
    /// The value is being removed from the container
    Stop,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Start => f.write_str("start"),
            LifecycleEvent::Stop => f.write_str("stop"),
        }
    }
}

/// Start/stop capability a produced value may implement.
#[async_trait]
pub trait LifecycleAware: Send + Sync {
    /// Identifier used in diagnostics and error reports.
    fn instance_id(&self) -> InstanceId;

    /// Perform setup (`Start`) or teardown (`Stop`).
    async fn handle_event(&self, event: LifecycleEvent) -> Result<()>;
}

/// Error type returned by an individual hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

type HookFn = Box<dyn Fn() -> BoxFuture<'static, std::result::Result<(), HookError>> + Send + Sync>;

struct NamedHook {
    name: String,
    run: HookFn,
}

/// Ordered, named start and stop hooks of one value.
///
/// Hook names are unique per event. Both events run their hooks in
/// registration order; stop hooks are not reversed.
pub struct LifecycleHooks {
    id: InstanceId,
    start: Vec<NamedHook>,
    stop: Vec<NamedHook>,
}

impl LifecycleHooks {
    /// Create an empty hook set with a fresh [`InstanceId`].
    pub fn new() -> Self {
        Self {
            id: InstanceId::new(),
            start: Vec::new(),
            stop: Vec::new(),
        }
    }

    /// Identifier of the value owning these hooks.
    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Register a start hook.
    ///
    /// # Panics
    ///
    /// Panics if a start hook with the same name is already registered.
    pub fn on_start<F, Fut>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HookError>> + Send + 'static,
    {
        Self::push(&mut self.start, LifecycleEvent::Start, name.into(), hook);
        self
    }

    /// Register a stop hook.
    ///
    /// # Panics
    ///
    /// Panics if a stop hook with the same name is already registered.
    pub fn on_stop<F, Fut>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HookError>> + Send + 'static,
    {
        Self::push(&mut self.stop, LifecycleEvent::Stop, name.into(), hook);
        self
    }

    fn push<F, Fut>(hooks: &mut Vec<NamedHook>, event: LifecycleEvent, name: String, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HookError>> + Send + 'static,
    {
        if hooks.iter().any(|h| h.name == name) {
            panic!("Lifecycle {event} hook `{name}` is already registered");
        }
        hooks.push(NamedHook {
            name,
            run: Box::new(move || hook().boxed()),
        });
    }

    /// Names of the hooks registered for `event`, in run order.
    pub fn hook_names(&self, event: LifecycleEvent) -> impl Iterator<Item = &str> {
        self.hooks(event).iter().map(|h| h.name.as_str())
    }

    fn hooks(&self, event: LifecycleEvent) -> &[NamedHook] {
        match event {
            LifecycleEvent::Start => &self.start,
            LifecycleEvent::Stop => &self.stop,
        }
    }

    /// Run every hook registered for `event`.
    ///
    /// A failing hook does not stop the ones after it. All failures are
    /// collected and reported once as [`DiError::LifecycleFailed`].
    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<()> {
        let mut failures = BTreeMap::new();

        for hook in self.hooks(event) {
            #[cfg(feature = "logging")]
            trace!(
                target: crate::logging::TARGET,
                instance = %self.id,
                event = %event,
                hook = hook.name.as_str(),
                "Running lifecycle hook"
            );

            if let Err(err) = (hook.run)().await {
                #[cfg(feature = "logging")]
                error!(
                    target: crate::logging::TARGET,
                    instance = %self.id,
                    event = %event,
                    hook = hook.name.as_str(),
                    error = %err,
                    "Lifecycle hook failed"
                );

                failures.insert(hook.name.clone(), err.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DiError::LifecycleFailed {
                instance: self.id,
                event,
                failures,
            })
        }
    }
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("id", &self.id)
            .field("start", &self.hook_names(LifecycleEvent::Start).collect::<Vec<_>>())
            .field("stop", &self.hook_names(LifecycleEvent::Stop).collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl LifecycleAware for LifecycleHooks {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    async fn handle_event(&self, event: LifecycleEvent) -> Result<()> {
        self.dispatch(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, entry: &'static str) -> impl Fn() -> futures::future::Ready<std::result::Result<(), HookError>> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move || {
            log.lock().unwrap().push(entry.to_string());
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = LifecycleHooks::new();
        hooks
            .on_start("a", recorder(&log, "start-a"))
            .on_start("b", recorder(&log, "start-b"))
            .on_stop("a", recorder(&log, "stop-a"))
            .on_stop("b", recorder(&log, "stop-b"));

        hooks.dispatch(LifecycleEvent::Start).await.unwrap();
        hooks.dispatch(LifecycleEvent::Stop).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["start-a", "start-b", "stop-a", "stop-b"]
        );
    }

    #[tokio::test]
    async fn test_failures_are_collected_and_siblings_still_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = LifecycleHooks::new();
        hooks
            .on_start("first", || async { Err::<(), HookError>("boom".into()) })
            .on_start("second", recorder(&log, "second"))
            .on_start("third", || async { Err::<(), HookError>("bang".into()) });

        let err = hooks.dispatch(LifecycleEvent::Start).await.unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["second"]);
        match err {
            DiError::LifecycleFailed {
                instance,
                event,
                failures,
            } => {
                assert_eq!(instance, hooks.id());
                assert_eq!(event, LifecycleEvent::Start);
                assert_eq!(failures.len(), 2);
                assert_eq!(failures["first"], "boom");
                assert_eq!(failures["third"], "bang");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "Lifecycle start hook `connect` is already registered")]
    fn test_duplicate_hook_name_panics() {
        let mut hooks = LifecycleHooks::new();
        hooks.on_start("connect", || async { Ok(()) });
        hooks.on_start("connect", || async { Ok(()) });
    }

    #[test]
    fn test_same_name_allowed_across_events() {
        let mut hooks = LifecycleHooks::new();
        hooks
            .on_start("pool", || async { Ok(()) })
            .on_stop("pool", || async { Ok(()) });

        assert_eq!(hooks.hook_names(LifecycleEvent::Start).collect::<Vec<_>>(), ["pool"]);
        assert_eq!(hooks.hook_names(LifecycleEvent::Stop).collect::<Vec<_>>(), ["pool"]);
    }

    #[test]
    fn test_instance_ids_unique() {
        let a = LifecycleHooks::new();
        let b = LifecycleHooks::new();
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("instance-"));
    }
}
