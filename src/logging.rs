//! Structured logging setup
//!
//! The container emits `tracing` events under the `lifecycle_injector`
//! target: registrations and state changes at `debug`, per-resolve detail
//! at `trace`, eager startup and teardown at `info`, and hook failures at
//! `error`. This module installs a `tracing-subscriber` for them.
//!
//! # Features
//!
//! - `logging` - Emit events (default)
//! - `logging-json` - JSON output for log aggregation
//! - `logging-pretty` - Multi-line colored output for development
//!
//! # Example
//!
//! ```rust,ignore
//! use lifecycle_injector::logging;
//!
//! logging::builder()
//!     .info()
//!     .injector_only()
//!     .compact()
//!     .init();
//! ```

use tracing::Level;

/// Target every container event is emitted under.
pub const TARGET: &str = "lifecycle_injector";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line human readable output
    Pretty,
    /// Single-line output
    Compact,
}

/// Builder for the logging subscriber
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    from_env: bool,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            from_env: false,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show container events
    pub fn injector_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Prefer `RUST_LOG` when it is set, falling back to the configured level
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Directive string handed to the env filter
    fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Fails if another global subscriber is already set. Without
    /// `logging-json` or `logging-pretty` nothing is installed; JSON falls
    /// back to compact output when `logging-json` is off.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = if self.from_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
        } else {
            EnvFilter::new(self.directive())
        };

        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_target(true);

        let registry = tracing_subscriber::registry().with(filter);
        match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            _ => registry.with(layer.compact()).try_init(),
        }
    }

    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn try_init(self) -> Result<(), std::convert::Infallible> {
        Ok(())
    }

    /// Install the subscriber, ignoring an already-installed one
    pub fn init(self) {
        let _ = self.try_init();
    }
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// JSON if `logging-json` is enabled, pretty otherwise
pub fn init() {
    if cfg!(feature = "logging-json") {
        init_json();
    } else {
        init_pretty();
    }
}

pub fn init_json() {
    builder().json().debug().init();
}

pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Container events only, honoring `RUST_LOG` when set
pub fn init_injector_only() {
    builder().injector_only().from_env().debug().init();
}
