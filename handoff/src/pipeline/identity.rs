//! Dense 1-based thread identities.
//!
//! Each pipeline run owns an [`IdentityRegistry`]; the process-wide
//! [`assign_worker_identity`] draws from one global registry instead.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use lazy_static::lazy_static;

#[derive(Debug)]
struct Registry {
    next_id: usize,
    ids: HashMap<ThreadId, usize>,
}

/// Maps threads to ordinals in first-call order.
#[derive(Debug)]
pub struct IdentityRegistry {
    inner: Mutex<Registry>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                next_id: 1,
                ids: HashMap::new(),
            }),
        }
    }

    /// Identity of the calling thread, assigned on first call.
    pub fn assign(&self) -> usize {
        let thread_id = thread::current().id();
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = registry.ids.get(&thread_id) {
            return id;
        }
        let id = registry.next_id;
        registry.next_id += 1;
        registry.ids.insert(thread_id, id);
        id
    }

    /// Number of threads registered so far.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: IdentityRegistry = IdentityRegistry::new();
}

/// Process-wide stable ordinal of the calling thread, starting at 1.
pub fn assign_worker_identity() -> usize {
    GLOBAL_REGISTRY.assign()
}
