//! End-to-end flows: login, send, retry, and session teardown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use wallet_resolver::favorites::FavoritesStore;
use wallet_resolver::simulator::{RandomFailure, ScriptedFailure, SendStage};
use wallet_resolver::store::{keys, KeyValueStore, MemoryStore};
use wallet_resolver::verification::{PhoneVerification, DEMO_OTP_CODE};
use wallet_resolver::wallet::{self, WalletLinkStore};
use wallet_resolver::{
    SendOutcome, SendRequest, SessionConfig, SessionManager, SessionPhase, SimulatorConfig,
    TransactionLedger, TransactionSimulator, TxStatus,
};

struct App {
    durable: Arc<MemoryStore>,
    ledger: TransactionLedger,
    wallet: WalletLinkStore,
    verification: PhoneVerification,
    favorites: FavoritesStore,
    session: SessionManager,
}

async fn app(session_config: SessionConfig) -> App {
    let durable = Arc::new(MemoryStore::new());
    let store: Arc<dyn KeyValueStore> = durable.clone();
    let ledger = TransactionLedger::load(store.clone()).await.unwrap();
    let wallet = WalletLinkStore::new(store.clone());
    let verification = PhoneVerification::new(store.clone());
    let favorites = FavoritesStore::new(store.clone());
    let session = SessionManager::restore(
        store,
        Arc::new(MemoryStore::new()),
        wallet.clone(),
        verification.clone(),
        ledger.clone(),
        session_config,
    )
    .await
    .unwrap();
    App {
        durable,
        ledger,
        wallet,
        verification,
        favorites,
        session,
    }
}

fn send_request(amount: f64) -> SendRequest {
    SendRequest {
        counterparty_phone: "+15551234567".to_string(),
        amount,
        network_fee: 0.0005,
        note: None,
    }
}

#[tokio::test(start_paused = true)]
async fn send_half_eth_end_to_end() {
    let app = app(SessionConfig::default()).await;

    // Mocked login: OTP, session, generated wallet, verified flag
    app.verification.verify_code(DEMO_OTP_CODE).await.unwrap();
    app.session.login("+15550001111", true).await.unwrap();
    app.wallet.link(&wallet::generate_address()).await.unwrap();
    app.verification.mark_verified().await.unwrap();

    let before = app.ledger.list().await.len();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let simulator = TransactionSimulator::new(
        app.ledger.clone(),
        Arc::new(ScriptedFailure::new([false])),
        &SimulatorConfig::default(),
    )
    .with_events(tx);

    let outcome = simulator.send(send_request(0.5)).await.unwrap();
    let (id, reference) = match outcome {
        SendOutcome::Completed {
            transaction_id,
            confirmation_reference,
        } => (transaction_id, confirmation_reference),
        other => panic!("expected completion, got {other:?}"),
    };

    // Exactly one new entry, pending the moment it was created
    let first_event = rx.recv().await.unwrap();
    assert_eq!(first_event.stage, SendStage::Created);
    assert_eq!(first_event.transaction_id, id);

    let records = app.ledger.list().await;
    assert_eq!(records.len(), before + 1);
    let record = &records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.status, TxStatus::Completed);
    assert!((record.amount - 0.5).abs() < f64::EPSILON);
    assert!(!reference.is_empty());
    assert_eq!(record.confirmation_reference.as_deref(), Some(&reference[..]));

    // Ids are unique across the whole history
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), records.len());
}

#[tokio::test(start_paused = true)]
async fn failed_send_retries_under_same_id() {
    let app = app(SessionConfig::default()).await;
    app.session.login("+15550001111", true).await.unwrap();

    let simulator = TransactionSimulator::new(
        app.ledger.clone(),
        Arc::new(ScriptedFailure::new([true, false])),
        &SimulatorConfig::default(),
    );

    let id = match simulator.send(send_request(0.25)).await.unwrap() {
        SendOutcome::Failed { transaction_id } => transaction_id,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(app.ledger.get(&id).await.unwrap().status, TxStatus::Failed);

    match simulator.retry(&id).await.unwrap() {
        SendOutcome::Completed { transaction_id, .. } => assert_eq!(transaction_id, id),
        other => panic!("expected completion, got {other:?}"),
    }

    // Still a single row for the submission
    let records = app.ledger.list().await;
    assert_eq!(records.iter().filter(|r| r.id == id).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn seeded_failure_replays_identically() {
    let run = |seed: u64| async move {
        let app = app(SessionConfig::default()).await;
        let simulator = TransactionSimulator::new(
            app.ledger.clone(),
            Arc::new(RandomFailure::seeded(0.4, seed)),
            &SimulatorConfig::default(),
        );
        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.push(matches!(
                simulator.send(send_request(0.1)).await.unwrap(),
                SendOutcome::Completed { .. }
            ));
        }
        outcomes
    };
    assert_eq!(run(42).await, run(42).await);
}

#[tokio::test(start_paused = true)]
async fn logout_tears_down_every_store() {
    let app = app(SessionConfig::default()).await;
    app.session.login("+15550001111", true).await.unwrap();
    app.wallet.link(&wallet::generate_address()).await.unwrap();
    app.verification.mark_verified().await.unwrap();

    let simulator = TransactionSimulator::new(
        app.ledger.clone(),
        Arc::new(ScriptedFailure::new([false])),
        &SimulatorConfig::default(),
    );
    simulator.send(send_request(0.5)).await.unwrap();

    app.session.logout().await.unwrap();

    // No read after logout observes pre-logout values
    assert!(!app.session.authenticated().await);
    assert!(app.session.identity().await.is_none());
    assert!(app.ledger.list().await.is_empty());
    assert!(app.wallet.linked().await.unwrap().is_none());
    assert!(!app.verification.is_verified().await.unwrap());
    assert!(app
        .durable
        .get(keys::AUTH_USER_PHONE)
        .await
        .unwrap()
        .is_none());
    assert!(app
        .durable
        .get(keys::TRANSACTIONS)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn idle_expiry_logs_out_and_tears_down() {
    let config = SessionConfig {
        idle_timeout_secs: 5,
        warning_countdown_secs: 2,
        watchdog_interval_ms: 100,
    };
    let app = app(config).await;
    app.session.login("+15550001111", true).await.unwrap();
    app.wallet.link(&wallet::generate_address()).await.unwrap();

    let mut phases = app.session.subscribe();
    tokio::spawn(app.session.clone().run_watchdog());

    // Idle straight through the warning countdown with no activity
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(*phases.borrow_and_update(), SessionPhase::LoggedOut);
    assert!(!app.session.authenticated().await);
    assert!(app.ledger.list().await.is_empty());
    assert!(app.wallet.linked().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn favorites_survive_logout() {
    let app = app(SessionConfig::default()).await;
    app.session.login("+15550001111", true).await.unwrap();
    app.favorites
        .add(wallet_resolver::favorites::Favorite {
            phone: "+15551234567".to_string(),
            name: Some("Demo".to_string()),
        })
        .await
        .unwrap();

    app.session.logout().await.unwrap();

    // Teardown is scoped to session, wallet, verification, and history
    assert!(app.favorites.is_favorite("+15551234567").await.unwrap());
}
