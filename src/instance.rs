//! Produced values and their readiness
//!
//! An [`Instance`] couples a type-erased value with:
//!
//! - the capability views declared at registration (the same value seen
//!   through other contracts, e.g. `dyn LifecycleAware`), and
//! - a shared readiness future that runs the value's start hook exactly
//!   once and lets every waiter observe its outcome.

use crate::key::TypeKey;
use crate::lifecycle::{LifecycleAware, LifecycleEvent};
use crate::{DiError, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::sync::Arc;

/// Type-erased `Arc<T>` (boxed once more so `T` may be unsized).
pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

/// Projection of a typed value onto another contract.
pub(crate) type ViewCast<T> = Arc<dyn Fn(&Arc<T>) -> Erased + Send + Sync>;

#[derive(Clone)]
struct View {
    key: TypeKey,
    value: Erased,
}

/// A produced value plus its readiness signal.
///
/// Cloning is cheap: clones share the value and the readiness future.
#[derive(Clone)]
pub struct Instance {
    key: TypeKey,
    value: Erased,
    views: Arc<[View]>,
    ready: Shared<BoxFuture<'static, Result<()>>>,
}

impl Instance {
    /// Wrap a freshly produced value.
    ///
    /// Every `(key, cast)` pair becomes a view of the value. If one of them
    /// is `dyn LifecycleAware`, readiness runs its start hook.
    pub(crate) fn new<T: ?Sized + Send + Sync + 'static>(
        value: Arc<T>,
        casts: &[(TypeKey, ViewCast<T>)],
    ) -> Self {
        let views: Arc<[View]> = casts
            .iter()
            .map(|(key, cast)| View {
                key: *key,
                value: cast(&value),
            })
            .collect();

        let key = TypeKey::of::<T>();
        let lifecycle = Self::find_lifecycle(&views);
        let ready = match lifecycle {
            Some(component) => async move { component.handle_event(LifecycleEvent::Start).await }
                .boxed()
                .shared(),
            None => futures::future::ready(Ok(())).boxed().shared(),
        };

        Self {
            key,
            value: Arc::new(value) as Erased,
            views,
            ready,
        }
    }

    /// Contract this instance was produced for.
    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Whether the value can stand in for `key`, either directly or through
    /// one of its declared views.
    pub fn supports(&self, key: TypeKey) -> bool {
        self.key == key || self.views.iter().any(|v| v.key == key)
    }

    /// The same value re-keyed under `key`, sharing readiness.
    ///
    /// Returns `None` if [`supports`](Self::supports) would be false.
    pub(crate) fn adopt_as(&self, key: TypeKey) -> Option<Instance> {
        if self.key == key {
            return Some(self.clone());
        }
        let view = self.views.iter().find(|v| v.key == key)?;
        Some(Self {
            key,
            value: Arc::clone(&view.value),
            views: Arc::clone(&self.views),
            ready: self.ready.clone(),
        })
    }

    /// Typed access to the value, without waiting for readiness.
    pub fn value<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(DiError::type_mismatch::<T>)
    }

    /// The lifecycle capability, if the value declared one.
    pub fn lifecycle(&self) -> Option<Arc<dyn LifecycleAware>> {
        Self::find_lifecycle(&self.views)
    }

    fn find_lifecycle(views: &[View]) -> Option<Arc<dyn LifecycleAware>> {
        let key = TypeKey::of::<dyn LifecycleAware>();
        views
            .iter()
            .find(|v| v.key == key)
            .and_then(|v| v.value.downcast_ref::<Arc<dyn LifecycleAware>>())
            .cloned()
    }

    /// Wait until the start hook (if any) has finished.
    ///
    /// The hook runs once no matter how many callers wait; all of them see
    /// the same result.
    pub async fn ready(&self) -> Result<()> {
        self.ready.clone().await
    }

    /// Whether readiness has already completed successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.ready.peek(), Some(Ok(())))
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.key)
            .field("views", &self.views.iter().map(|v| v.key).collect::<Vec<_>>())
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{HookError, LifecycleHooks};
    use std::sync::atomic::{AtomicU32, Ordering};

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Plain;

    impl Named for Plain {
        fn name(&self) -> &str {
            "plain"
        }
    }

    fn lifecycle_cast() -> (TypeKey, ViewCast<LifecycleHooks>) {
        (
            TypeKey::of::<dyn LifecycleAware>(),
            Arc::new(|v: &Arc<LifecycleHooks>| {
                Arc::new(Arc::clone(v) as Arc<dyn LifecycleAware>) as Erased
            }),
        )
    }

    #[tokio::test]
    async fn test_plain_value_is_ready_immediately() {
        let instance = Instance::new(Arc::new(7_u32), &[]);

        instance.ready().await.unwrap();
        assert!(instance.is_ready());
        assert_eq!(*instance.value::<u32>().unwrap(), 7);
        assert!(instance.lifecycle().is_none());
    }

    #[tokio::test]
    async fn test_wrong_type_is_mismatch() {
        let instance = Instance::new(Arc::new(7_u32), &[]);
        assert!(matches!(
            instance.value::<String>(),
            Err(DiError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_hook_runs_once_for_all_waiters() {
        static STARTS: AtomicU32 = AtomicU32::new(0);

        let mut hooks = LifecycleHooks::new();
        hooks.on_start("count", || async {
            STARTS.fetch_add(1, Ordering::SeqCst);
            Ok::<(), HookError>(())
        });

        let instance = Instance::new(Arc::new(hooks), &[lifecycle_cast()]);
        assert!(!instance.is_ready());

        let copy = instance.clone();
        instance.ready().await.unwrap();
        copy.ready().await.unwrap();

        assert_eq!(STARTS.load(Ordering::SeqCst), 1);
        assert!(instance.lifecycle().is_some());
    }

    #[tokio::test]
    async fn test_failed_start_is_sticky() {
        let mut hooks = LifecycleHooks::new();
        hooks.on_start("fail", || async { Err::<(), HookError>("nope".into()) });

        let instance = Instance::new(Arc::new(hooks), &[lifecycle_cast()]);

        assert!(matches!(instance.ready().await, Err(DiError::LifecycleFailed { .. })));
        assert!(matches!(instance.ready().await, Err(DiError::LifecycleFailed { .. })));
        assert!(!instance.is_ready());
    }

    #[test]
    fn test_adopt_through_view() {
        let cast: ViewCast<Plain> =
            Arc::new(|v: &Arc<Plain>| Arc::new(Arc::clone(v) as Arc<dyn Named>) as Erased);
        let instance = Instance::new(Arc::new(Plain), &[(TypeKey::of::<dyn Named>(), cast)]);

        assert!(instance.supports(TypeKey::of::<Plain>()));
        assert!(instance.supports(TypeKey::of::<dyn Named>()));
        assert!(!instance.supports(TypeKey::of::<u32>()));

        let adopted = instance.adopt_as(TypeKey::of::<dyn Named>()).unwrap();
        assert_eq!(adopted.type_key(), TypeKey::of::<dyn Named>());
        assert_eq!(adopted.value::<dyn Named>().unwrap().name(), "plain");
        assert!(instance.adopt_as(TypeKey::of::<u32>()).is_none());
    }
}
