//! Container configuration
//!
//! # Example
//!
//! ```rust
//! use lifecycle_injector::Container;
//! use std::time::Duration;
//!
//! let container = Container::builder()
//!     .label("app")
//!     .silent(true)
//!     .eager_init_timeout(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(container.label(), Some("app"));
//! ```

use crate::Container;
use std::time::Duration;

/// Default bound on how long one eager singleton may take to become ready.
pub const DEFAULT_EAGER_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by every handle of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Missing providers resolve to `None`, and registration conflicts and
    /// unregistering a missing provider become no-ops.
    pub silent: bool,
    /// Registrations replace existing providers unless told otherwise.
    pub allow_override: bool,
    /// Per-singleton bound used by eager initialization.
    pub eager_init_timeout: Duration,
    /// Debug label shown in logs and `Debug` output.
    pub label: Option<String>,
    /// Expected number of providers, used to size the registry.
    pub capacity: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            silent: false,
            allow_override: false,
            eager_init_timeout: DEFAULT_EAGER_INIT_TIMEOUT,
            label: None,
            capacity: 0,
        }
    }
}

/// Builder for [`Container`].
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
}

impl ContainerBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Downgrade conflicts and misses to no-ops
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    /// Let registrations replace existing providers by default
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.config.allow_override = allow;
        self
    }

    /// Bound each eager singleton's startup
    pub fn eager_init_timeout(mut self, timeout: Duration) -> Self {
        self.config.eager_init_timeout = timeout;
        self
    }

    /// Attach a debug label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Pre-size the registry
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Settings collected so far
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Create the container
    pub fn build(self) -> Container {
        Container::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ContainerBuilder::default();
        assert!(!builder.config().silent);
        assert!(!builder.config().allow_override);
        assert_eq!(builder.config().eager_init_timeout, DEFAULT_EAGER_INIT_TIMEOUT);
        assert!(builder.config().label.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let builder = ContainerBuilder::new()
            .silent(true)
            .allow_override(true)
            .eager_init_timeout(Duration::from_millis(250))
            .label("worker")
            .capacity(32);

        assert!(builder.config().silent);
        assert!(builder.config().allow_override);
        assert_eq!(builder.config().eager_init_timeout, Duration::from_millis(250));
        assert_eq!(builder.config().label.as_deref(), Some("worker"));
        assert_eq!(builder.config().capacity, 32);
    }
}
