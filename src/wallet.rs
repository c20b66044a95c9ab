//! Linked wallet store
//!
//! Holds the single mock wallet address the demo links after login,
//! persisted under the `wallet_address` key. Addresses are random hex
//! strings; no key material exists behind them.

use std::sync::Arc;

use rand::Rng;
use tracing::info;

use crate::store::{keys, KeyValueStore};
use crate::{validate, Result};

/// Shared handle over the persisted wallet link
#[derive(Clone)]
pub struct WalletLinkStore {
    store: Arc<dyn KeyValueStore>,
}

impl WalletLinkStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Link a wallet address, replacing any previous link
    pub async fn link(&self, address: &str) -> Result<()> {
        validate::wallet_address(address)?;
        self.store.put(keys::WALLET_ADDRESS, address).await?;
        info!(address = %address, "Wallet linked");
        Ok(())
    }

    /// The linked address, if any
    pub async fn linked(&self) -> Result<Option<String>> {
        self.store.get(keys::WALLET_ADDRESS).await
    }

    /// Remove the link
    pub async fn unlink(&self) -> Result<()> {
        self.store.remove(keys::WALLET_ADDRESS).await
    }
}

/// Random mock address in the 0x + 40 hex shape
pub fn generate_address() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{hex}")
}
