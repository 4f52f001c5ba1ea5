//! Explicit atomic scopes over a [`TripleStore`]
//!
//! [`run_atomically`] returns a nested result. The outer `StorageResult`
//! fails only when the scope itself breaks (begin, commit or rollback
//! failed); the inner `Result` is whatever the work returned. When the work
//! fails, its writes have already been rolled back by the time the caller
//! sees the inner error.

use super::traits::{StorageResult, TripleStore};

/// Run `work` inside an atomic scope: commit on `Ok`, roll back on `Err`.
///
/// If `work` unwinds, the scope is rolled back on the way out, so the
/// store's scope nesting stays balanced.
pub fn run_atomically<S, T, E, F>(store: &S, work: F) -> StorageResult<Result<T, E>>
where
    S: TripleStore + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    let scope = OpenScope::begin(store)?;
    let outcome = work();
    scope.finish(outcome)
}

/// An open scope. Dropped without `finish`, it rolls itself back.
struct OpenScope<'a, S: TripleStore + ?Sized> {
    store: &'a S,
    open: bool,
}

impl<'a, S: TripleStore + ?Sized> OpenScope<'a, S> {
    fn begin(store: &'a S) -> StorageResult<Self> {
        store.begin_atomic()?;
        Ok(Self { store, open: true })
    }

    fn finish<T, E>(mut self, outcome: Result<T, E>) -> StorageResult<Result<T, E>> {
        self.open = false;
        match outcome {
            Ok(value) => {
                if let Err(e) = self.store.commit_atomic() {
                    if let Err(rollback_err) = self.store.rollback_atomic() {
                        tracing::error!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                    return Err(e);
                }
                Ok(Ok(value))
            }
            Err(e) => {
                self.store.rollback_atomic()?;
                Ok(Err(e))
            }
        }
    }
}

impl<S: TripleStore + ?Sized> Drop for OpenScope<'_, S> {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!("atomic scope abandoned, rolling back");
            if let Err(e) = self.store.rollback_atomic() {
                tracing::error!(error = %e, "rollback of abandoned scope failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::storage::{OpenStore, SqliteStore, StorageError};

    #[test]
    fn committed_work_is_kept() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = Triple::new("a", "r", "b");

        let outcome = run_atomically(&store, || store.insert_triple(&t)).unwrap();
        assert!(outcome.is_ok());
        assert!(store.contains_triple(&t).unwrap());
    }

    #[test]
    fn failed_work_is_rolled_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = Triple::new("a", "r", "b");

        let outcome: Result<(), StorageError> = run_atomically(&store, || {
            store.insert_triple(&t)?;
            Err(StorageError::InvalidInput("boom".into()))
        })
        .unwrap();

        assert!(outcome.is_err());
        assert!(!store.contains_triple(&t).unwrap());
    }

    #[test]
    fn inner_rollback_keeps_outer_writes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outer = Triple::new("a", "r", "b");
        let inner = Triple::new("c", "r", "d");

        let outcome: Result<(), StorageError> = run_atomically(&store, || {
            store.insert_triple(&outer)?;
            let nested: Result<(), StorageError> = run_atomically(&store, || {
                store.insert_triple(&inner)?;
                Err(StorageError::InvalidInput("inner".into()))
            })?;
            assert!(nested.is_err());
            Ok(())
        })
        .unwrap();

        assert!(outcome.is_ok());
        assert!(store.contains_triple(&outer).unwrap());
        assert!(!store.contains_triple(&inner).unwrap());
    }

    #[test]
    fn outer_rollback_discards_committed_inner_writes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let inner = Triple::new("c", "r", "d");

        let outcome: Result<(), StorageError> = run_atomically(&store, || {
            run_atomically(&store, || store.insert_triple(&inner))??;
            Err(StorageError::InvalidInput("outer".into()))
        })
        .unwrap();

        assert!(outcome.is_err());
        assert!(!store.contains_triple(&inner).unwrap());
    }

    #[test]
    fn unwinding_work_is_rolled_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = Triple::new("a", "r", "b");

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: StorageResult<Result<(), StorageError>> = run_atomically(&store, || {
                store.insert_triple(&t)?;
                panic!("work aborted mid-scope");
            });
        }));

        assert!(unwound.is_err());
        assert!(!store.contains_triple(&t).unwrap());
        // No scope was left open
        assert!(matches!(store.commit_atomic(), Err(StorageError::AtomicScope(_))));
    }
}
