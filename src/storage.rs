//! Provider registry
//!
//! Uses DashMap for lock-free concurrent access. Entries are `Arc`-shared so
//! callers can clone a provider out and await on it without holding a shard
//! lock across the suspension point.

use crate::instance::Instance;
use crate::key::{InjectionKey, TypeKey};
use crate::provider::{Provider, ProviderInfo};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Outcome of [`ServiceStorage::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    /// The key was free
    Inserted,
    /// An existing provider was replaced
    Replaced,
    /// An existing provider was kept and the new one discarded
    Kept,
}

/// Thread-safe storage for providers, keyed by scope and contract.
pub(crate) struct ServiceStorage {
    providers: DashMap<InjectionKey, Arc<Provider>, RandomState>,
}

impl ServiceStorage {
    /// Create new empty storage with optimized shard count.
    ///
    /// Uses 8 shards as a balance between creation overhead and concurrent
    /// read performance; registries rarely hold more than a few dozen
    /// providers.
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity and optimized shards.
    #[inline]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        // Scale shards based on expected capacity and concurrency needs
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            providers: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    /// Insert a provider, replacing an existing one only if `replace` is set.
    pub(crate) fn insert(&self, key: InjectionKey, provider: Provider, replace: bool) -> Insertion {
        match self.providers.entry(key) {
            Entry::Occupied(mut entry) => {
                if replace {
                    entry.insert(Arc::new(provider));
                    Insertion::Replaced
                } else {
                    Insertion::Kept
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(provider));
                Insertion::Inserted
            }
        }
    }

    /// Look up a provider
    #[inline]
    pub(crate) fn get(&self, key: &InjectionKey) -> Option<Arc<Provider>> {
        self.providers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a provider exists
    #[inline]
    pub(crate) fn contains(&self, key: &InjectionKey) -> bool {
        self.providers.contains_key(key)
    }

    /// Remove `key` only if it still maps to `provider`.
    pub(crate) fn remove_if_same(&self, key: &InjectionKey, provider: &Arc<Provider>) -> bool {
        self.providers
            .remove_if(key, |_, current| Arc::ptr_eq(current, provider))
            .is_some()
    }

    /// Find an already-produced instance that can stand in for `type_key`.
    ///
    /// Linear scan across every scope and contract; factories are skipped
    /// because they never hold a value.
    pub(crate) fn find_produced(&self, type_key: TypeKey) -> Option<Instance> {
        self.providers.iter().find_map(|entry| {
            entry
                .value()
                .produced()
                .and_then(|instance| instance.adopt_as(type_key))
        })
    }

    /// Eager singletons that have not been built yet.
    pub(crate) fn eager_pending(&self) -> Vec<(InjectionKey, Arc<Provider>)> {
        self.providers
            .iter()
            .filter(|entry| entry.value().is_eager() && entry.value().produced().is_none())
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Remove every provider, returning what was removed.
    ///
    /// One `retain` pass, so each shard is emptied under its own lock.
    pub(crate) fn drain(&self) -> Vec<(InjectionKey, Arc<Provider>)> {
        let mut removed = Vec::with_capacity(self.providers.len());
        self.providers.retain(|key, provider| {
            removed.push((key.clone(), Arc::clone(provider)));
            false
        });
        removed
    }

    /// Describe every registered provider.
    pub(crate) fn snapshot(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|entry| ProviderInfo {
                scope: entry.key().scope.clone(),
                type_key: entry.key().type_key,
                kind: entry.value().kind(),
                eager: entry.value().is_eager(),
                produced: entry.value().produced().is_some(),
            })
            .collect()
    }

    /// Get number of registered providers
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("count", &self.len())
            .finish()
    }
}
