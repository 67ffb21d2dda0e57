//! Contains the [`Executor`] trait and the registry that maps each query's
//! key type to the executor computing its results.

use std::{
    any::{Any, TypeId},
    sync::Arc,
};

use rustc_hash::FxHashMap;

use crate::{key::Key, Context};

/// Computes the value of a query for a given key.
///
/// Implementations are expected to be stateless, pure functions of the
/// context and the key: the engine caches results and replays them whenever
/// nothing the computation consulted has changed, so a body that reads
/// anything else produces stale answers.
///
/// A body may freely invoke other queries through the context; every such
/// call is recorded as a dependency of this one, in call order. A body must
/// not invoke itself (directly or through other queries) with the same key;
/// doing so is a programming error and aborts.
pub trait Executor<K: Key>: 'static {
    /// Computes the result for `key`.
    fn execute(&self, context: &Context, key: K) -> K::Value;
}

/// Holds the registered [`Executor`] for each key type.
#[derive(Default)]
pub struct Registry {
    executors_by_key_type: FxHashMap<TypeId, Box<dyn Any>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.executors_by_key_type.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Registers the executor for the `K` query. If one was already
    /// registered it is replaced and returned.
    pub fn register_executor<K: Key, E: Executor<K>>(
        &mut self,
        executor: Arc<E>,
    ) -> Option<Arc<dyn Executor<K>>> {
        self.registry
            .executors_by_key_type
            .insert(
                TypeId::of::<K>(),
                Box::new(executor as Arc<dyn Executor<K>>),
            )
            .map(downcast_entry::<K>)
    }

    /// Retrieves the executor registered for the `K` query, if any.
    #[must_use]
    pub fn executor<K: Key>(&self) -> Option<Arc<dyn Executor<K>>> {
        self.registry
            .executors_by_key_type
            .get(&TypeId::of::<K>())
            .map(|entry| {
                entry
                    .downcast_ref::<Arc<dyn Executor<K>>>()
                    .expect("registry entry stored under the wrong key type")
                    .clone()
            })
    }
}

fn downcast_entry<K: Key>(entry: Box<dyn Any>) -> Arc<dyn Executor<K>> {
    *entry
        .downcast::<Arc<dyn Executor<K>>>()
        .expect("registry entry stored under the wrong key type")
}

#[cfg(test)]
mod test;
