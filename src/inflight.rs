//! Wait-for graph of singleton builds in progress
//!
//! Each root [`Resolver`](crate::Resolver) starts a call tree with its own
//! [`TreeId`]. A tree that starts building a singleton becomes the cell's
//! owner until the build ends. A tree about to wait on a cell records what
//! it already holds (its loading stack). Before the wait begins, the graph
//! is walked from the cell's owner through the waits of the branch
//! building that cell. If the walk comes back to a build the requester is
//! holding, waiting would never finish and the request fails with
//! [`DiError::CircularDependency`] instead.

use crate::key::{InjectionKey, TypeKey};
use crate::{DiError, Result};
use ahash::RandomState;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[cfg(feature = "logging")]
use tracing::debug;

static NEXT_TREE: AtomicU64 = AtomicU64::new(1);
static NEXT_WAIT: AtomicU64 = AtomicU64::new(1);

/// Identifier of one resolution call tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TreeId(u64);

impl TreeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TREE.fetch_add(1, Ordering::Relaxed))
    }
}

struct Wait {
    tree: TreeId,
    key: InjectionKey,
    /// Loading stack of the waiting branch, without `key`
    held: Vec<TypeKey>,
}

#[derive(Default)]
struct Graph {
    owners: HashMap<InjectionKey, TreeId, RandomState>,
    waits: HashMap<u64, Wait, RandomState>,
}

impl Graph {
    /// Depth-first walk from the build of `key` (owned by `owner`).
    ///
    /// Returns the contracts passed through on the way back to a build the
    /// requester holds.
    fn path_back(
        &self,
        requester: TreeId,
        held: &[TypeKey],
        key: &InjectionKey,
        owner: TreeId,
        visited: &mut HashSet<(TreeId, InjectionKey)>,
    ) -> Option<Vec<TypeKey>> {
        if !visited.insert((owner, key.clone())) {
            return None;
        }

        // Only the branch building `key` blocks it
        let blocking = self
            .waits
            .values()
            .filter(|wait| wait.tree == owner && wait.held.contains(&key.type_key));

        for wait in blocking {
            let mut path: Vec<TypeKey> = wait
                .held
                .iter()
                .skip_while(|held_key| **held_key != key.type_key)
                .skip(1)
                .copied()
                .collect();
            path.push(wait.key.type_key);

            let Some(&next_owner) = self.owners.get(&wait.key) else {
                continue;
            };
            if next_owner == requester && held.contains(&wait.key.type_key) {
                return Some(path);
            }
            if let Some(rest) = self.path_back(requester, held, &wait.key, next_owner, visited) {
                path.extend(rest);
                return Some(path);
            }
        }

        None
    }
}

/// Singleton builds in progress across every call tree of one container.
#[derive(Default)]
pub(crate) struct InFlight {
    graph: Mutex<Graph>,
}

impl InFlight {
    fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `tree` is building `key`. The record is removed when the
    /// returned guard is dropped.
    pub(crate) fn begin(self: &Arc<Self>, key: InjectionKey, tree: TreeId) -> OwnerGuard {
        self.graph().owners.insert(key.clone(), tree);
        OwnerGuard {
            inflight: Arc::clone(self),
            key,
        }
    }

    /// Record that `tree`, holding `held`, is about to wait on the build of
    /// `key`, failing instead if that build transitively waits on one of
    /// the held builds.
    pub(crate) fn wait_for(
        self: &Arc<Self>,
        key: &InjectionKey,
        tree: TreeId,
        held: &[TypeKey],
    ) -> Result<WaitGuard> {
        let mut graph = self.graph();

        if let Some(&owner) = graph.owners.get(key) {
            if owner != tree {
                let mut visited = HashSet::new();
                if let Some(path) = graph.path_back(tree, held, key, owner, &mut visited) {
                    let stack: Vec<&'static str> = held
                        .iter()
                        .chain(std::iter::once(&key.type_key))
                        .chain(path.iter())
                        .map(TypeKey::name)
                        .collect();

                    #[cfg(feature = "logging")]
                    debug!(
                        target: crate::logging::TARGET,
                        service = key.type_key.name(),
                        stack = ?stack,
                        "Circular dependency detected across call trees"
                    );

                    return Err(DiError::CircularDependency {
                        type_name: key.type_key.name(),
                        stack,
                    });
                }
            }
        }

        let id = NEXT_WAIT.fetch_add(1, Ordering::Relaxed);
        graph.waits.insert(
            id,
            Wait {
                tree,
                key: key.clone(),
                held: held.to_vec(),
            },
        );

        Ok(WaitGuard {
            inflight: Arc::clone(self),
            id,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        let graph = self.graph();
        graph.owners.is_empty() && graph.waits.is_empty()
    }
}

impl std::fmt::Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.graph();
        f.debug_struct("InFlight")
            .field("builds", &graph.owners.len())
            .field("waits", &graph.waits.len())
            .finish()
    }
}

/// Ownership record of one build.
pub(crate) struct OwnerGuard {
    inflight: Arc<InFlight>,
    key: InjectionKey,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        self.inflight.graph().owners.remove(&self.key);
    }
}

/// Wait record of one branch.
pub(crate) struct WaitGuard {
    inflight: Arc<InFlight>,
    id: u64,
}

impl std::fmt::Debug for WaitGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitGuard").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.inflight.graph().waits.remove(&self.id);
    }
}
