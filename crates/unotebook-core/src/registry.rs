//! Execution context registry.
//!
//! Process-wide map from notebook id to its live environment. The map
//! itself is guarded by a mutex so creation and removal are serialized
//! across connections; each environment carries its own lock which the
//! engine holds only while a cell of that notebook runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::notebook::NotebookId;

/// Shared handle to one notebook's environment.
pub type SharedEnv<E> = Arc<Mutex<E>>;

/// Registry of live execution environments, at most one per notebook id.
pub struct Registry<E> {
    envs: Mutex<HashMap<NotebookId, SharedEnv<E>>>,
}

impl<E: Default> Registry<E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            envs: Mutex::new(HashMap::new()),
        }
    }

    /// Get the environment for `id`, creating a fresh one on first use.
    pub fn get_or_create(&self, id: &NotebookId) -> SharedEnv<E> {
        let mut envs = self.lock();
        if let Some(env) = envs.get(id) {
            return env.clone();
        }
        tracing::debug!("Creating execution environment for {}", id);
        let env = Arc::new(Mutex::new(E::default()));
        envs.insert(id.clone(), env.clone());
        env
    }
}

impl<E> Registry<E> {
    /// Drop the environment for `id`. Returns whether one existed.
    ///
    /// A run already holding the environment finishes against the detached
    /// copy; the next run starts fresh.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            tracing::debug!("Removed execution environment for {}", id);
        }
        removed
    }

    /// Whether `id` has a live environment.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of live environments.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no environment is live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NotebookId, SharedEnv<E>>> {
        self.envs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Default> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}
