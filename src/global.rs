//! Process-wide default container
//!
//! Applications that want one shared registry can use [`global`] instead
//! of threading a [`Container`] through their setup code. Nothing in the
//! crate depends on it; explicitly created containers work the same way.

use crate::Container;
use once_cell::sync::Lazy;

static GLOBAL: Lazy<Container> = Lazy::new(|| Container::builder().label("global").build());

/// The process-wide container, created on first use.
///
/// # Examples
///
/// ```rust
/// use lifecycle_injector::global;
///
/// assert_eq!(global().label(), Some("global"));
/// ```
#[inline]
pub fn global() -> &'static Container {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_global_is_shared() {
        struct GlobalMarker(u8);

        global()
            .bind::<GlobalMarker>()
            .allow_override(true)
            .to_instance(std::sync::Arc::new(GlobalMarker(7)))
            .unwrap();

        let marker = global().get::<GlobalMarker>().await.unwrap();
        assert_eq!(marker.0, 7);
        assert!(std::ptr::eq(global(), global()));
    }
}
