//! Transaction record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the current user sent or received the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// Lifecycle status of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

/// A single entry in the transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique id; assigned by the ledger when empty on append
    pub id: String,
    pub direction: Direction,
    pub counterparty_phone: String,
    /// Amount in ETH
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub status: TxStatus,
    /// Simulated gas fee in ETH
    pub network_fee: f64,
    /// Mock transaction hash; present iff the send completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransactionRecord {
    /// New outgoing payment; the ledger assigns the id on append
    pub fn sent(counterparty_phone: impl Into<String>, amount: f64, network_fee: f64) -> Self {
        Self {
            id: String::new(),
            direction: Direction::Sent,
            counterparty_phone: counterparty_phone.into(),
            amount,
            created_at: Utc::now(),
            status: TxStatus::Pending,
            network_fee,
            confirmation_reference: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Amount plus gas fee
    pub fn total(&self) -> f64 {
        self.amount + self.network_fee
    }
}

/// Fresh ledger id
pub(super) fn new_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}
