//! Error types for dependency injection

use crate::lifecycle::{InstanceId, LifecycleEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during registration, resolution and lifecycle dispatch
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A provider already exists for the type in this scope
    #[error("Provider already registered: {type_name}{}", in_scope(.scope))]
    RegistrationConflict {
        type_name: &'static str,
        scope: Option<Arc<str>>,
    },

    /// No provider exists for the type in this scope
    #[error("Provider not registered: {type_name}{}", in_scope(.scope))]
    NotRegistered {
        type_name: &'static str,
        scope: Option<Arc<str>>,
    },

    /// The requested type is a wildcard and cannot be registered or resolved
    #[error("Cannot register or resolve wildcard type: {type_name}")]
    InvalidType { type_name: &'static str },

    /// The type is already being produced further up the loading stack
    #[error("Circular dependency detected while resolving {type_name}: {}", .stack.join(" -> "))]
    CircularDependency {
        type_name: &'static str,
        stack: Vec<&'static str>,
    },

    /// A builder failed to create its value
    #[error("Failed to create service {type_name}: {reason}")]
    CreationFailed {
        type_name: &'static str,
        reason: String,
    },

    /// A stored value did not have the type it was registered under
    #[error("Stored value is not a {expected}")]
    TypeMismatch { expected: &'static str },

    /// One or more lifecycle hooks failed during a single dispatch
    #[error("{event} hooks failed for {instance}: {}", describe(.failures))]
    LifecycleFailed {
        instance: InstanceId,
        event: LifecycleEvent,
        failures: BTreeMap<String, String>,
    },

    /// An eager singleton did not become ready in time
    #[error("Eager singleton {type_name} was not ready after {timeout:?}")]
    EagerInitTimeout {
        type_name: &'static str,
        timeout: Duration,
    },

    /// Eager startup was aborted by the first failing singleton
    #[error("Eager initialization failed at {type_name}")]
    EagerInitFailed {
        type_name: &'static str,
        #[source]
        source: Box<DiError>,
    },
}

fn in_scope(scope: &Option<Arc<str>>) -> String {
    match scope {
        Some(name) => format!(" (scope `{name}`)"),
        None => String::new(),
    }
}

fn describe(failures: &BTreeMap<String, String>) -> String {
    failures
        .iter()
        .map(|(hook, reason)| format!("{hook}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl DiError {
    /// Create a NotRegistered error for a type
    #[inline]
    pub fn not_registered<T: ?Sized + 'static>(scope: Option<Arc<str>>) -> Self {
        Self::NotRegistered {
            type_name: std::any::type_name::<T>(),
            scope,
        }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed<T: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub fn type_mismatch<T: ?Sized + 'static>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>(),
        }
    }

    /// The failure that ended eager startup, unwrapping the aggregate.
    pub fn root_cause(&self) -> &DiError {
        match self {
            Self::EagerInitFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
