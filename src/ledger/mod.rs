//! Locally persisted transaction history
//!
//! An ordered list, most recent first. Rows are never deleted
//! individually; the whole history is bulk-cleared on logout. Every
//! mutation rewrites the full persisted snapshot under the
//! `transactions_history` key before returning.

mod record;

pub use record::{Direction, TransactionRecord, TxStatus};

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{keys, KeyValueStore};
use crate::{Error, Result};

/// Shared handle over the persisted transaction history
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn KeyValueStore>,
    records: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl TransactionLedger {
    /// Load the ledger from the store, seeding demo history on first use
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let records: Vec<TransactionRecord> = match store.get(keys::TRANSACTIONS).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => {
                let seeded = demo_history();
                store
                    .put(keys::TRANSACTIONS, &serde_json::to_string(&seeded)?)
                    .await?;
                seeded
            }
        };
        debug!(count = records.len(), "Loaded transaction history");
        Ok(Self {
            store,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Append a record at the head of the history
    ///
    /// Assigns a fresh id when the record carries none and forces the
    /// initial `Pending` status. Returns the id of the stored record.
    pub async fn append(&self, mut record: TransactionRecord) -> Result<String> {
        if record.id.is_empty() {
            record.id = record::new_id();
        }
        record.status = TxStatus::Pending;
        record.confirmation_reference = None;
        let id = record.id.clone();

        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == id) {
            return Err(Error::Validation(format!("duplicate transaction id: {id}")));
        }
        records.insert(0, record);
        self.persist(&records).await?;
        debug!(id = %id, "Appended transaction");
        Ok(id)
    }

    /// Move a pending row to a terminal status
    ///
    /// Only `Pending -> Completed` and `Pending -> Failed` are legal.
    /// Completion requires a confirmation reference; the reference is
    /// cleared on any non-completed status.
    pub async fn update_status(
        &self,
        id: &str,
        status: TxStatus,
        confirmation_reference: Option<String>,
    ) -> Result<()> {
        if status == TxStatus::Completed && confirmation_reference.is_none() {
            return Err(Error::Validation(
                "completed transactions need a confirmation reference".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;

        match (record.status, status) {
            (TxStatus::Pending, TxStatus::Completed) | (TxStatus::Pending, TxStatus::Failed) => {}
            (from, to) => {
                return Err(Error::InvalidTransition(format!(
                    "{from:?} -> {to:?} for {id}"
                )));
            }
        }

        record.status = status;
        record.confirmation_reference = if status == TxStatus::Completed {
            confirmation_reference
        } else {
            None
        };
        self.persist(&records).await
    }

    /// Reset a failed row to `Pending` for a retry attempt
    ///
    /// Keeps the original id and clears the confirmation reference.
    pub async fn reset_for_retry(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::TransactionNotFound(id.to_string()))?;
        if record.status != TxStatus::Failed {
            return Err(Error::InvalidTransition(format!(
                "retry needs a failed transaction, {id} is {:?}",
                record.status
            )));
        }
        record.status = TxStatus::Pending;
        record.confirmation_reference = None;
        self.persist(&records).await
    }

    /// Snapshot of the history, most recent first
    pub async fn list(&self) -> Vec<TransactionRecord> {
        self.records.read().await.clone()
    }

    /// Look up a single record by id
    pub async fn get(&self, id: &str) -> Option<TransactionRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    /// Drop all history and erase the persisted key
    pub async fn clear(&self) -> Result<()> {
        let mut records = self.records.write().await;
        records.clear();
        self.store.remove(keys::TRANSACTIONS).await
    }

    async fn persist(&self, records: &[TransactionRecord]) -> Result<()> {
        self.store
            .put(keys::TRANSACTIONS, &serde_json::to_string(records)?)
            .await
    }
}

/// The two demo rows the app ships with before any real activity
fn demo_history() -> Vec<TransactionRecord> {
    vec![
        TransactionRecord {
            id: "tx_1".to_string(),
            direction: Direction::Received,
            counterparty_phone: "+1 (555) 987-6543".to_string(),
            amount: 0.035,
            created_at: Utc::now() - Duration::days(1),
            status: TxStatus::Completed,
            network_fee: 0.0,
            confirmation_reference: Some(
                "0x3f1b6e1d4c9a2e8b7d05c4a1f6e3b9d82c7a5f40e1d8b36c9a2e7f5d4b1c8a30".to_string(),
            ),
            note: None,
        },
        TransactionRecord {
            id: "tx_2".to_string(),
            direction: Direction::Sent,
            counterparty_phone: "+1 (555) 555-5555".to_string(),
            amount: 0.007,
            created_at: Utc::now() - Duration::days(3),
            status: TxStatus::Completed,
            network_fee: 0.0005,
            confirmation_reference: Some(
                "0x9c4e7a2d1f8b5c30e6a9d4f1b8e5c2a7d0f3b6e9c2a5d8f1b4e7c0a3d6f9b250".to_string(),
            ),
            note: None,
        },
    ]
}
