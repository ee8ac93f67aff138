//! Balance store access.
//!
//! The profile system exposes balances as plain per-account read and write
//! calls with no atomic increment. The trait here adds an optimistic
//! version token so concurrent read-modify-write cycles can detect lost
//! updates, and [`mutate`] wraps the bounded retry loop every mutation
//! goes through.

use async_trait::async_trait;
use thiserror::Error;

use crate::Coins;
use crate::model::AccountId;

mod memory;
pub use memory::MemoryStore;

/// Monotonic per-account write counter used as the optimistic token.
pub type Version = u64;

/// Attempts before a contended mutation gives up with a conflict.
pub const MAX_MUTATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("account {0} not found")]
    NotFound(AccountId),

    #[error("version conflict writing account {0}")]
    Conflict(AccountId),

    #[error("balance store unavailable: {0}")]
    Unavailable(String),
}

/// Versioned get/set access to account balances.
///
/// `set` succeeds only when `expected` matches the version returned by the
/// `get` the caller computed the new value from.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, id: &AccountId) -> Result<(Coins, Version), StoreError>;

    async fn set(&self, id: &AccountId, value: Coins, expected: Version)
    -> Result<(), StoreError>;
}

/// Failure of a [`mutate`] cycle: either the store gave out, or the
/// caller's closure refused the new value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutateError<E> {
    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Aborted(E),
}

/// Read-modify-write with bounded retry on version conflict.
///
/// Returns the previous and new balance. The closure runs once per
/// attempt on a freshly read balance and may abort the mutation.
pub async fn mutate<S, F, E>(
    store: &S,
    id: &AccountId,
    mut op: F,
) -> Result<(Coins, Coins), MutateError<E>>
where
    S: BalanceStore + ?Sized,
    F: FnMut(Coins) -> Result<Coins, E>,
{
    for _ in 0..MAX_MUTATE_ATTEMPTS {
        let (current, version) = store.get(id).await.map_err(MutateError::Store)?;
        let next = op(current).map_err(MutateError::Aborted)?;
        match store.set(id, next, version).await {
            Ok(()) => return Ok((current, next)),
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(MutateError::Store(e)),
        }
    }
    Err(MutateError::Store(StoreError::Conflict(id.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AccountId {
        AccountId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn mutate_applies_closure_and_reports_both_balances() {
        let store = MemoryStore::new();
        store.seed(id("a"), Coins::new(100)).await;

        let (prev, next) = mutate(&store, &id("a"), |bal| {
            Ok::<_, StoreError>(bal.checked_add(Coins::new(25)).unwrap())
        })
        .await
        .unwrap();

        assert_eq!(prev, Coins::new(100));
        assert_eq!(next, Coins::new(125));
        assert_eq!(store.get(&id("a")).await.unwrap().0, Coins::new(125));
    }

    #[tokio::test]
    async fn mutate_missing_account_is_not_found() {
        let store = MemoryStore::new();
        let err = mutate(&store, &id("ghost"), |bal| Ok::<_, StoreError>(bal))
            .await
            .unwrap_err();
        assert_eq!(err, MutateError::Store(StoreError::NotFound(id("ghost"))));
    }

    #[tokio::test]
    async fn mutate_abort_leaves_balance_untouched() {
        let store = MemoryStore::new();
        store.seed(id("a"), Coins::new(10)).await;

        #[derive(Debug, PartialEq, Eq, thiserror::Error)]
        #[error("no")]
        struct No;

        let err = mutate(&store, &id("a"), |_| Err::<Coins, _>(No))
            .await
            .unwrap_err();
        assert_eq!(err, MutateError::Aborted(No));
        assert_eq!(store.get(&id("a")).await.unwrap().0, Coins::new(10));
    }

    /// Store whose first `set` conflicts, as if another writer won the
    /// race; later writes go through.
    struct ContendedOnce {
        inner: MemoryStore,
        conflicted: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl BalanceStore for ContendedOnce {
        async fn get(&self, id: &AccountId) -> Result<(Coins, Version), StoreError> {
            self.inner.get(id).await
        }

        async fn set(
            &self,
            id: &AccountId,
            value: Coins,
            expected: Version,
        ) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            if !self.conflicted.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Conflict(id.clone()));
            }
            self.inner.set(id, value, expected).await
        }
    }

    #[tokio::test]
    async fn mutate_retries_after_conflict() {
        let store = ContendedOnce {
            inner: MemoryStore::new(),
            conflicted: std::sync::atomic::AtomicBool::new(false),
        };
        store.inner.seed(id("a"), Coins::new(100)).await;

        let mut attempts = 0;
        let (prev, next) = mutate(&store, &id("a"), |bal| {
            attempts += 1;
            Ok::<_, StoreError>(bal.checked_add(Coins::new(1)).unwrap())
        })
        .await
        .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!((prev, next), (Coins::new(100), Coins::new(101)));
    }

    #[tokio::test]
    async fn mutate_gives_up_after_bounded_attempts() {
        struct AlwaysConflict;

        #[async_trait::async_trait]
        impl BalanceStore for AlwaysConflict {
            async fn get(&self, _id: &AccountId) -> Result<(Coins, Version), StoreError> {
                Ok((Coins::ZERO, 0))
            }

            async fn set(
                &self,
                id: &AccountId,
                _value: Coins,
                _expected: Version,
            ) -> Result<(), StoreError> {
                Err(StoreError::Conflict(id.clone()))
            }
        }

        let mut attempts = 0u32;
        let err = mutate(&AlwaysConflict, &id("a"), |bal| {
            attempts += 1;
            Ok::<_, StoreError>(bal)
        })
        .await
        .unwrap_err();
        assert_eq!(attempts, MAX_MUTATE_ATTEMPTS);
        assert_eq!(err, MutateError::Store(StoreError::Conflict(id("a"))));
    }

    #[tokio::test]
    async fn stale_version_write_conflicts() {
        let store = MemoryStore::new();
        store.seed(id("a"), Coins::new(5)).await;

        let (_, version) = store.get(&id("a")).await.unwrap();
        store.set(&id("a"), Coins::new(6), version).await.unwrap();
        let err = store.set(&id("a"), Coins::new(7), version).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict(id("a")));
    }
}
