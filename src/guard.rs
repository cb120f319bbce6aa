//! Per-entity in-flight markers for toggle mutations.
//!
//! Double-taps on a like or follow button must not race two read-modify-write
//! pairs against the store. One guard instance arbitrates all toggle kinds,
//! keyed by `(relation, entity id)`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Liked,
    Following,
    Watched,
}

#[derive(Default)]
pub struct MutationGuard {
    pending: Mutex<HashSet<(Relation, String)>>,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `mutation` unless one is already in flight for the same entity.
    ///
    /// Returns `Ok(None)` when the entity is busy; the caller treats that as
    /// a no-op, not an error. The marker is held from before the mutation
    /// starts until it settles, success and failure alike.
    pub async fn run<T, F, Fut>(
        &self,
        relation: Relation,
        id: &str,
        mutation: F,
    ) -> Result<Option<T>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if !self.mark(relation, id) {
            return Ok(None);
        }

        let result = mutation().await;
        self.clear(relation, id);

        result.map(Some)
    }

    fn mark(&self, relation: Relation, id: &str) -> bool {
        self.pending
            .lock()
            .unwrap()
            .insert((relation, id.to_string()))
    }

    fn clear(&self, relation: Relation, id: &str) {
        self.pending
            .lock()
            .unwrap()
            .remove(&(relation, id.to_string()));
    }
}
