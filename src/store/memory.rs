use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Coins;
use crate::model::AccountId;

use super::{BalanceStore, StoreError, Version};

/// In-memory balance store for the bundled binary and the test suite.
///
/// Accounts exist only if seeded; the real profile system owns account
/// lifecycle, and this mirrors its fail-closed behavior for unknown ids.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, (Coins, Version)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account entry with the given opening balance.
    pub async fn seed(&self, id: AccountId, balance: Coins) {
        self.accounts.write().await.insert(id, (balance, 0));
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn get(&self, id: &AccountId) -> Result<(Coins, Version), StoreError> {
        self.accounts
            .read()
            .await
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn set(
        &self,
        id: &AccountId,
        value: Coins,
        expected: Version,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if entry.1 != expected {
            return Err(StoreError::Conflict(id.clone()));
        }
        *entry = (value, expected + 1);
        Ok(())
    }
}
