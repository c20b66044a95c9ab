//! Simulated confirmation pipeline
//!
//! Drives a submitted send through `Processing -> Submitting ->
//! Confirming` and records the terminal outcome in the ledger. The hold
//! at each stage exists purely to pace UI feedback, and failure is
//! injected at the confirmation stage with a documented probability.
//! No real funds, signatures, or on-chain confirmation are involved at
//! any point.

mod failure;

pub use failure::{FailureSource, RandomFailure, ScriptedFailure};

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::SimulatorConfig;
use crate::ledger::{TransactionLedger, TransactionRecord, TxStatus};
use crate::{validate, Result};

/// Pipeline stage of a simulated send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStage {
    Created,
    Processing,
    Submitting,
    Confirming,
    Completed,
    Failed,
}

impl SendStage {
    /// Progress percentage shown while this stage is active
    pub fn progress_percent(&self) -> u8 {
        match self {
            SendStage::Created => 0,
            SendStage::Processing => 25,
            SendStage::Submitting => 50,
            SendStage::Confirming => 75,
            SendStage::Completed => 100,
            SendStage::Failed => 75,
        }
    }

    /// Status line shown for this stage
    pub fn label(&self) -> &'static str {
        match self {
            SendStage::Created => "Created",
            SendStage::Processing => "Processing...",
            SendStage::Submitting => "Submitting to network...",
            SendStage::Confirming => "Confirming on blockchain...",
            SendStage::Completed => "Success!",
            SendStage::Failed => "Transaction failed",
        }
    }
}

/// A send as submitted from the form, before it enters the pipeline
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub counterparty_phone: String,
    /// Amount in ETH
    pub amount: f64,
    /// Mock gas fee in ETH
    pub network_fee: f64,
    pub note: Option<String>,
}

/// Stage notification emitted as the pipeline advances
#[derive(Debug, Clone)]
pub struct StageEvent {
    pub transaction_id: String,
    pub stage: SendStage,
    pub progress_percent: u8,
}

/// Terminal result of one pipeline attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Confirmed with a synthetic transaction hash
    Completed {
        transaction_id: String,
        confirmation_reference: String,
    },
    /// Injected failure; the row stays `Failed` until retried
    Failed { transaction_id: String },
    /// Teardown stopped the pipeline; the row stays `Pending`
    Cancelled { transaction_id: String },
}

/// Stops further stage transitions; already-written ledger state stays
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives one send at a time through the simulated pipeline
pub struct TransactionSimulator {
    ledger: TransactionLedger,
    failure: Arc<dyn FailureSource>,
    step_delay: Duration,
    events: Option<mpsc::UnboundedSender<StageEvent>>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl TransactionSimulator {
    pub fn new(
        ledger: TransactionLedger,
        failure: Arc<dyn FailureSource>,
        config: &SimulatorConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            ledger,
            failure,
            step_delay: Duration::from_millis(config.step_delay_ms),
            events: None,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    /// Report stage transitions through `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<StageEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle for aborting in-flight transitions from teardown paths
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Validate and submit a new send, driving it to a terminal stage
    ///
    /// The pending ledger row is written before the first hold, so a
    /// cancelled or crashed pipeline still leaves the submission visible.
    pub async fn send(&self, request: SendRequest) -> Result<SendOutcome> {
        validate::phone(&request.counterparty_phone)?;
        validate::amount(request.amount)?;

        let mut record = TransactionRecord::sent(
            request.counterparty_phone.clone(),
            request.amount,
            request.network_fee,
        );
        if let Some(note) = request.note {
            record = record.with_note(note);
        }
        let id = self.ledger.append(record).await?;
        self.emit(&id, SendStage::Created);
        info!(
            id = %id,
            phone = %request.counterparty_phone,
            amount = request.amount,
            "Submitted send"
        );

        self.run_pipeline(id).await
    }

    /// Re-run a failed send under its original id
    pub async fn retry(&self, id: &str) -> Result<SendOutcome> {
        self.ledger.reset_for_retry(id).await?;
        info!(id = %id, "Retrying failed send");
        self.run_pipeline(id.to_string()).await
    }

    async fn run_pipeline(&self, id: String) -> Result<SendOutcome> {
        for stage in [SendStage::Processing, SendStage::Submitting] {
            self.emit(&id, stage);
            if !self.hold().await {
                return Ok(self.cancelled(id));
            }
        }

        self.emit(&id, SendStage::Confirming);
        // Outcome is decided on entry; the hold only paces the reveal
        let failed = self.failure.should_fail();
        if !self.hold().await {
            return Ok(self.cancelled(id));
        }

        if failed {
            self.ledger.update_status(&id, TxStatus::Failed, None).await?;
            self.emit(&id, SendStage::Failed);
            warn!(id = %id, "Simulated network failure at confirmation");
            return Ok(SendOutcome::Failed { transaction_id: id });
        }

        let reference = confirmation_reference();
        self.ledger
            .update_status(&id, TxStatus::Completed, Some(reference.clone()))
            .await?;
        self.emit(&id, SendStage::Completed);
        info!(id = %id, reference = %reference, "Send confirmed");
        Ok(SendOutcome::Completed {
            transaction_id: id,
            confirmation_reference: reference,
        })
    }

    /// Wait one stage delay; `false` when cancelled mid-wait
    async fn hold(&self) -> bool {
        let mut cancel = self.cancel_rx.clone();
        if *cancel.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.step_delay) => true,
            changed = cancel.changed() => match changed {
                Ok(()) => !*cancel.borrow(),
                Err(_) => true,
            },
        }
    }

    fn cancelled(&self, id: String) -> SendOutcome {
        info!(id = %id, "Send cancelled; ledger row stays pending");
        SendOutcome::Cancelled { transaction_id: id }
    }

    fn emit(&self, id: &str, stage: SendStage) {
        if let Some(events) = &self.events {
            let _ = events.send(StageEvent {
                transaction_id: id.to_string(),
                stage,
                progress_percent: stage.progress_percent(),
            });
        }
    }
}

/// Synthetic 32-byte transaction hash
fn confirmation_reference() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{hex}")
}
