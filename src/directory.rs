//! Phone-to-wallet directory
//!
//! The registry the demo resolves recipients against: in-memory, with
//! one pre-registered entry. An unregistered recipient resolves to the
//! escrow path.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::{validate, Result};

/// The demo's pre-registered recipient
pub const DEMO_PHONE: &str = "+15551234567";
const DEMO_WALLET: &str = "0xAbC123dEaFBCAdeaBc123DeAFbCADeaBC123dEaF";

/// Result of resolving a recipient phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Registered; payments go straight to this wallet
    Wallet(String),
    /// Unregistered; funds would be held in escrow until they sign up
    Escrow,
}

/// Shared handle over the phone-to-wallet registry
#[derive(Clone)]
pub struct WalletDirectory {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl WalletDirectory {
    /// Directory seeded with the demo's pre-registered user
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(normalize(DEMO_PHONE), DEMO_WALLET.to_string());
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Register (or re-register) a phone number to a wallet
    pub async fn register(&self, phone: &str, address: &str) -> Result<()> {
        validate::phone(phone)?;
        validate::wallet_address(address)?;
        self.entries
            .write()
            .await
            .insert(normalize(phone), address.to_string());
        info!(phone = %phone, "Registered phone to wallet");
        Ok(())
    }

    /// Look up where a payment to `phone` would land
    pub async fn resolve(&self, phone: &str) -> Result<Resolution> {
        validate::phone(phone)?;
        Ok(match self.entries.read().await.get(&normalize(phone)) {
            Some(address) => Resolution::Wallet(address.clone()),
            None => Resolution::Escrow,
        })
    }
}

impl Default for WalletDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys are digits only, so formatting differences still match
fn normalize(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("+{digits}")
}
