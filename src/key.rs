//! Registry keys
//!
//! A [`TypeKey`] names a contract (a concrete type or a trait object), and an
//! [`InjectionKey`] qualifies it with an optional scope name.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Comparable token identifying a registered contract.
///
/// Produced at registration and resolution call sites with [`TypeKey::of`].
/// Trait objects are valid contracts, so `TypeKey::of::<dyn Greeter>()` and
/// `TypeKey::of::<English>()` are distinct keys.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Human-readable type name, for diagnostics only.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this key stands for "any type".
    ///
    /// Such a key says nothing about the contract a caller wants, so it can
    /// never be registered or resolved.
    pub fn is_wildcard(&self) -> bool {
        self.id == TypeId::of::<dyn Any>()
            || self.id == TypeId::of::<dyn Any + Send>()
            || self.id == TypeId::of::<dyn Any + Send + Sync>()
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Registry key: a contract inside an optional named scope.
///
/// `scope: None` is the default namespace.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct InjectionKey {
    pub(crate) scope: Option<Arc<str>>,
    pub(crate) type_key: TypeKey,
}

impl InjectionKey {
    #[inline]
    pub(crate) fn new(type_key: TypeKey, scope: Option<Arc<str>>) -> Self {
        Self { scope, type_key }
    }
}

impl fmt::Debug for InjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "Key({}, Scope({}))", self.type_key, scope),
            None => write!(f, "Key({})", self.type_key),
        }
    }
}
