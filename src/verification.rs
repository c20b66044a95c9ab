//! Mocked phone verification
//!
//! OTP dispatch and checking are simulated: nothing is texted anywhere,
//! the verifier accepts one fixed demo code, and the result is a
//! persisted boolean flag under the `phone_verified` key.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::{keys, KeyValueStore};
use crate::{validate, Error, Result};

/// The code the mocked verifier accepts
pub const DEMO_OTP_CODE: &str = "123456";

/// Simulated dispatch latency
const SEND_DELAY: Duration = Duration::from_millis(1_500);
/// Simulated verification latency
const VERIFY_DELAY: Duration = Duration::from_millis(2_000);

/// Shared handle over the persisted verification flag
#[derive(Clone)]
pub struct PhoneVerification {
    store: Arc<dyn KeyValueStore>,
}

impl PhoneVerification {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Pretend to text a 6-digit code to `phone`
    pub async fn send_code(&self, phone: &str) -> Result<()> {
        validate::phone(phone)?;
        tokio::time::sleep(SEND_DELAY).await;
        info!(phone = %phone, "Verification code sent");
        Ok(())
    }

    /// Check a submitted code; flips the persisted flag on success
    pub async fn verify_code(&self, code: &str) -> Result<()> {
        tokio::time::sleep(VERIFY_DELAY).await;
        if code != DEMO_OTP_CODE {
            return Err(Error::Verification(
                "The code you entered is incorrect. Please try again.".to_string(),
            ));
        }
        self.store.put(keys::PHONE_VERIFIED, "true").await?;
        info!("Phone verified");
        Ok(())
    }

    /// Mark verified without the code dance (post-login shortcut)
    pub async fn mark_verified(&self) -> Result<()> {
        self.store.put(keys::PHONE_VERIFIED, "true").await
    }

    pub async fn is_verified(&self) -> Result<bool> {
        Ok(self.store.get(keys::PHONE_VERIFIED).await?.as_deref() == Some("true"))
    }

    /// Clear the flag
    pub async fn unverify(&self) -> Result<()> {
        self.store.remove(keys::PHONE_VERIFIED).await
    }
}
