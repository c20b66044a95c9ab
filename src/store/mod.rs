//! Flat key-value persistence
//!
//! A handful of well-known string keys, values serialized as text, and
//! absence of a key meaning the empty/default state. Services receive a
//! store handle through their constructors so the backing can be swapped.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::Result;

/// Well-known storage keys
pub mod keys {
    /// Serialized transaction ledger
    pub const TRANSACTIONS: &str = "transactions_history";
    /// Authenticated identity (phone number)
    pub const AUTH_USER_PHONE: &str = "auth_user_phone";
    /// Linked wallet address
    pub const WALLET_ADDRESS: &str = "wallet_address";
    /// Phone verification flag
    pub const PHONE_VERIFIED: &str = "phone_verified";
    /// Favorite contacts
    pub const FAVORITES: &str = "favorites_contacts";
}

/// Flat string-to-string store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}
