//! Append-only transaction log.
//!
//! Every balance mutation leaves one record here. The log is also the
//! settlement idempotency gate: `append` enforces uniqueness on the
//! external reference, so of any number of concurrent deliveries of the
//! same processor event exactly one claims the reference and credits.
//! The claimant appends a pending record first, credits, then marks the
//! record completed; marking it failed releases the reference for a
//! later retry.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{TxRecord, TxStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("transaction log unavailable: {0}")]
    Unavailable(String),

    #[error("a record already exists for reference '{0}'")]
    AlreadyRecorded(String),

    #[error("no record with id {0}")]
    RecordNotFound(Uuid),
}

#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Append a record. Fails with [`LogError::AlreadyRecorded`] when the
    /// record carries an external reference that is already claimed.
    async fn append(&self, record: TxRecord) -> Result<(), LogError>;

    /// Look up a record by its external reference (processor event id or
    /// voucher code).
    async fn find_by_reference(&self, reference: &str) -> Result<Option<TxRecord>, LogError>;

    /// Update a record's status. Marking a record failed releases its
    /// external reference so the operation can be retried.
    async fn set_status(&self, id: Uuid, status: TxStatus) -> Result<(), LogError>;
}

pub use memory::MemoryLog;

mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::{LogError, TransactionLog, TxRecord, TxStatus, Uuid, async_trait};

    /// In-memory append-only log with a unique reference index.
    #[derive(Debug, Default)]
    pub struct MemoryLog {
        inner: RwLock<Inner>,
    }

    #[derive(Debug, Default)]
    struct Inner {
        records: Vec<TxRecord>,
        by_reference: HashMap<String, usize>,
        by_id: HashMap<Uuid, usize>,
    }

    impl MemoryLog {
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of all records, oldest first.
        pub async fn records(&self) -> Vec<TxRecord> {
            self.inner.read().await.records.clone()
        }
    }

    #[async_trait]
    impl TransactionLog for MemoryLog {
        async fn append(&self, record: TxRecord) -> Result<(), LogError> {
            let mut inner = self.inner.write().await;
            let index = inner.records.len();
            if let Some(reference) = &record.external_reference {
                if inner.by_reference.contains_key(reference) {
                    return Err(LogError::AlreadyRecorded(reference.clone()));
                }
                inner.by_reference.insert(reference.clone(), index);
            }
            inner.by_id.insert(record.id, index);
            inner.records.push(record);
            Ok(())
        }

        async fn find_by_reference(
            &self,
            reference: &str,
        ) -> Result<Option<TxRecord>, LogError> {
            let inner = self.inner.read().await;
            Ok(inner
                .by_reference
                .get(reference)
                .map(|&index| inner.records[index].clone()))
        }

        async fn set_status(&self, id: Uuid, status: TxStatus) -> Result<(), LogError> {
            let mut inner = self.inner.write().await;
            let index = *inner.by_id.get(&id).ok_or(LogError::RecordNotFound(id))?;
            inner.records[index].status = status;
            if status == TxStatus::Failed
                && let Some(reference) = inner.records[index].external_reference.clone()
            {
                inner.by_reference.remove(&reference);
            }
            Ok(())
        }
    }
}
