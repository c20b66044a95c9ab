//! Session lifecycle and idle timeout
//!
//! `LoggedOut -> Active <-> WarningPending -> LoggedOut`. Login persists
//! the identity durably or for the current process only depending on
//! remember-me; expiry or explicit logout tears down the wallet link,
//! phone verification flag, and transaction history before returning, so
//! no later read observes pre-logout values.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::ledger::TransactionLedger;
use crate::store::{keys, KeyValueStore};
use crate::verification::PhoneVerification;
use crate::wallet::WalletLinkStore;
use crate::{validate, Error, Result};

/// Observable session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    LoggedOut,
    Active,
    /// Idle too long; the countdown to forced logout is running
    WarningPending,
}

/// Point-in-time session snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub identity: Option<String>,
    /// Seconds left in the warning countdown, when one is running
    pub countdown_secs: Option<u64>,
}

struct SessionInner {
    phase: SessionPhase,
    identity: Option<String>,
    last_activity: Instant,
    warning_deadline: Option<Instant>,
}

enum TickAction {
    None,
    Warn,
    Expire,
}

/// Coordinates authentication state and cross-store teardown
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<SessionInner>>,
    durable: Arc<dyn KeyValueStore>,
    session_scoped: Arc<dyn KeyValueStore>,
    wallet: WalletLinkStore,
    verification: PhoneVerification,
    ledger: TransactionLedger,
    config: SessionConfig,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
}

impl SessionManager {
    /// Build the manager, restoring any persisted identity
    ///
    /// The durable store wins over the session-scoped one.
    pub async fn restore(
        durable: Arc<dyn KeyValueStore>,
        session_scoped: Arc<dyn KeyValueStore>,
        wallet: WalletLinkStore,
        verification: PhoneVerification,
        ledger: TransactionLedger,
        config: SessionConfig,
    ) -> Result<Self> {
        let identity = match durable.get(keys::AUTH_USER_PHONE).await? {
            Some(phone) => Some(phone),
            None => session_scoped.get(keys::AUTH_USER_PHONE).await?,
        };
        let phase = if identity.is_some() {
            SessionPhase::Active
        } else {
            SessionPhase::LoggedOut
        };
        if let Some(phone) = &identity {
            info!(phone = %phone, "Restored session");
        }

        let (phase_tx, _) = watch::channel(phase);
        Ok(Self {
            inner: Arc::new(RwLock::new(SessionInner {
                phase,
                identity,
                last_activity: Instant::now(),
                warning_deadline: None,
            })),
            durable,
            session_scoped,
            wallet,
            verification,
            ledger,
            config,
            phase_tx: Arc::new(phase_tx),
        })
    }

    /// Authenticate as `phone`
    pub async fn login(&self, phone: &str, remember_me: bool) -> Result<()> {
        validate::phone(phone)?;
        if remember_me {
            self.durable.put(keys::AUTH_USER_PHONE, phone).await?;
        } else {
            self.session_scoped.put(keys::AUTH_USER_PHONE, phone).await?;
        }

        let mut inner = self.inner.write().await;
        inner.phase = SessionPhase::Active;
        inner.identity = Some(phone.to_string());
        inner.last_activity = Instant::now();
        inner.warning_deadline = None;
        drop(inner);

        self.set_phase(SessionPhase::Active);
        info!(phone = %phone, remember_me, "Logged in");
        Ok(())
    }

    /// Log out and tear down every per-identity store
    pub async fn logout(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().await;
            inner.phase = SessionPhase::LoggedOut;
            inner.identity = None;
            inner.warning_deadline = None;
        }
        self.durable.remove(keys::AUTH_USER_PHONE).await?;
        self.session_scoped.remove(keys::AUTH_USER_PHONE).await?;
        self.wallet.unlink().await?;
        self.verification.unverify().await?;
        self.ledger.clear().await?;
        self.set_phase(SessionPhase::LoggedOut);
        info!("Logged out; per-identity state cleared");
        Ok(())
    }

    /// Note user activity; resets the idle clock while active
    ///
    /// Deliberately a no-op during the warning window: only the explicit
    /// extend call dismisses the countdown.
    pub async fn record_activity(&self) {
        let mut inner = self.inner.write().await;
        if inner.phase == SessionPhase::Active {
            inner.last_activity = Instant::now();
        }
    }

    /// Dismiss the expiry warning and keep the session alive
    pub async fn extend_session(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.phase != SessionPhase::WarningPending {
            return Err(Error::Session("no expiry warning to extend".to_string()));
        }
        inner.phase = SessionPhase::Active;
        inner.last_activity = Instant::now();
        inner.warning_deadline = None;
        drop(inner);

        self.set_phase(SessionPhase::Active);
        info!("Session extended");
        Ok(())
    }

    pub async fn authenticated(&self) -> bool {
        self.inner.read().await.phase != SessionPhase::LoggedOut
    }

    pub async fn identity(&self) -> Option<String> {
        self.inner.read().await.identity.clone()
    }

    /// Current phase plus the remaining warning countdown
    pub async fn state(&self) -> SessionState {
        let inner = self.inner.read().await;
        let countdown_secs = inner.warning_deadline.map(|deadline| {
            deadline
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO)
                .as_secs()
        });
        SessionState {
            phase: inner.phase,
            identity: inner.identity.clone(),
            countdown_secs,
        }
    }

    /// Watch phase transitions (login, warning, logout)
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Evaluate the idle timers once; `true` when the tick forced a logout
    pub async fn tick(&self) -> Result<bool> {
        let now = Instant::now();
        let action = {
            let mut inner = self.inner.write().await;
            match inner.phase {
                SessionPhase::Active
                    if now.duration_since(inner.last_activity)
                        >= Duration::from_secs(self.config.idle_timeout_secs) =>
                {
                    inner.phase = SessionPhase::WarningPending;
                    inner.warning_deadline =
                        Some(now + Duration::from_secs(self.config.warning_countdown_secs));
                    TickAction::Warn
                }
                SessionPhase::WarningPending
                    if inner.warning_deadline.map_or(false, |d| now >= d) =>
                {
                    TickAction::Expire
                }
                _ => TickAction::None,
            }
        };

        match action {
            TickAction::Warn => {
                warn!(
                    countdown_secs = self.config.warning_countdown_secs,
                    "Session expiring soon due to inactivity"
                );
                self.set_phase(SessionPhase::WarningPending);
                Ok(false)
            }
            TickAction::Expire => {
                warn!("Session expired; logging out");
                self.logout().await?;
                Ok(true)
            }
            TickAction::None => Ok(false),
        }
    }

    /// Watchdog loop; spawn as a tokio task in long-running hosts:
    ///
    /// ```ignore
    /// tokio::spawn(session.clone().run_watchdog());
    /// ```
    pub async fn run_watchdog(self) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.watchdog_interval_ms));
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                warn!(error = %e, "Session watchdog tick failed");
            }
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        let _ = self.phase_tx.send(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn manager(config: SessionConfig) -> (SessionManager, Arc<MemoryStore>) {
        let durable = Arc::new(MemoryStore::new());
        let session_scoped = Arc::new(MemoryStore::new());
        let shared: Arc<dyn KeyValueStore> = durable.clone();
        let wallet = WalletLinkStore::new(shared.clone());
        let verification = PhoneVerification::new(shared.clone());
        let ledger = TransactionLedger::load(shared.clone()).await.unwrap();
        let session = SessionManager::restore(
            shared,
            session_scoped,
            wallet,
            verification,
            ledger,
            config,
        )
        .await
        .unwrap();
        (session, durable)
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            idle_timeout_secs: 5,
            warning_countdown_secs: 2,
            watchdog_interval_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_login_logout_cycle() {
        let (session, durable) = manager(SessionConfig::default()).await;
        assert!(!session.authenticated().await);

        session.login("+15551234567", true).await.unwrap();
        assert!(session.authenticated().await);
        assert_eq!(session.identity().await.as_deref(), Some("+15551234567"));
        assert_eq!(
            durable.get(keys::AUTH_USER_PHONE).await.unwrap().as_deref(),
            Some("+15551234567")
        );

        session.logout().await.unwrap();
        assert!(!session.authenticated().await);
        assert!(durable.get(keys::AUTH_USER_PHONE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remember_me_controls_store_choice() {
        let (session, durable) = manager(SessionConfig::default()).await;
        session.login("+15551234567", false).await.unwrap();
        // Not remembered: the durable store never sees the identity
        assert!(durable.get(keys::AUTH_USER_PHONE).await.unwrap().is_none());
        assert!(session.authenticated().await);
    }

    #[tokio::test]
    async fn test_restore_prefers_durable_identity() {
        let durable: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        durable.put(keys::AUTH_USER_PHONE, "+15551111111").await.unwrap();
        let session_scoped: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        session_scoped
            .put(keys::AUTH_USER_PHONE, "+15552222222")
            .await
            .unwrap();

        let wallet = WalletLinkStore::new(durable.clone());
        let verification = PhoneVerification::new(durable.clone());
        let ledger = TransactionLedger::load(durable.clone()).await.unwrap();
        let session = SessionManager::restore(
            durable,
            session_scoped,
            wallet,
            verification,
            ledger,
            SessionConfig::default(),
        )
        .await
        .unwrap();

        assert!(session.authenticated().await);
        assert_eq!(session.identity().await.as_deref(), Some("+15551111111"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_warns_then_expires() {
        let (session, _durable) = manager(fast_config()).await;
        session.login("+15551234567", true).await.unwrap();

        // Before the idle window nothing happens
        assert!(!session.tick().await.unwrap());
        assert_eq!(session.state().await.phase, SessionPhase::Active);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!session.tick().await.unwrap());
        let state = session.state().await;
        assert_eq!(state.phase, SessionPhase::WarningPending);
        assert!(state.countdown_secs.unwrap_or(0) <= 2);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(session.tick().await.unwrap());
        assert_eq!(session.state().await.phase, SessionPhase::LoggedOut);
        assert!(session.identity().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_dismisses_warning() {
        let (session, _durable) = manager(fast_config()).await;
        session.login("+15551234567", true).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        session.tick().await.unwrap();
        assert_eq!(session.state().await.phase, SessionPhase::WarningPending);

        session.extend_session().await.unwrap();
        assert_eq!(session.state().await.phase, SessionPhase::Active);

        // The idle clock restarted; no immediate re-warning
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!session.tick().await.unwrap());
        assert_eq!(session.state().await.phase, SessionPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_idle_clock() {
        let (session, _durable) = manager(fast_config()).await;
        session.login("+15551234567", true).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        session.record_activity().await;
        tokio::time::advance(Duration::from_secs(4)).await;

        // 8s elapsed overall but only 4s since the last activity
        assert!(!session.tick().await.unwrap());
        assert_eq!(session.state().await.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn test_extend_without_warning_is_an_error() {
        let (session, _durable) = manager(SessionConfig::default()).await;
        session.login("+15551234567", true).await.unwrap();
        assert!(session.extend_session().await.is_err());
    }

    #[tokio::test]
    async fn test_phase_subscription_sees_transitions() {
        let (session, _durable) = manager(SessionConfig::default()).await;
        let rx = session.subscribe();
        assert_eq!(*rx.borrow(), SessionPhase::LoggedOut);

        session.login("+15551234567", true).await.unwrap();
        assert_eq!(*rx.borrow(), SessionPhase::Active);

        session.logout().await.unwrap();
        assert_eq!(*rx.borrow(), SessionPhase::LoggedOut);
    }
}
