//! Wallet Resolver CLI
//!
//! Command-line front end for the demo payment core: mock login with the
//! fixed demo OTP, simulated sends with live progress, and the locally
//! persisted transaction history.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wallet_resolver::directory::{Resolution, WalletDirectory};
use wallet_resolver::favorites::{Favorite, FavoritesStore};
use wallet_resolver::simulator::RandomFailure;
use wallet_resolver::store::{FileStore, KeyValueStore, MemoryStore};
use wallet_resolver::verification::PhoneVerification;
use wallet_resolver::wallet::{self, WalletLinkStore};
use wallet_resolver::{
    Config, Error, Result, SendOutcome, SendRequest, SessionManager, SessionPhase,
    TransactionLedger, TransactionSimulator,
};

#[derive(Parser)]
#[command(name = "wallet-resolver")]
#[command(about = "Send crypto using just a phone number (demo)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with your phone number (demo OTP: 123456)
    Login {
        /// Your phone number, including country code
        #[arg(short, long)]
        phone: String,

        /// Verification code; omit to request one first
        #[arg(long)]
        code: Option<String>,

        /// Keep the session across restarts
        #[arg(long)]
        remember: bool,
    },

    /// Log out and clear wallet, verification, and history state
    Logout,

    /// Show session, wallet, and verification state
    Status,

    /// Send a simulated payment
    Send {
        /// Recipient's phone number
        #[arg(short, long)]
        phone: String,

        /// Amount in ETH
        #[arg(short, long)]
        amount: f64,

        /// Optional note attached to the transaction
        #[arg(long)]
        note: Option<String>,
    },

    /// Retry a failed send under its original id
    Retry {
        #[arg(long)]
        id: String,
    },

    /// List the transaction history, most recent first
    History,

    /// Register a phone number to a wallet address
    Register {
        #[arg(short, long)]
        phone: String,

        #[arg(short, long)]
        address: String,
    },

    /// Look up where a payment to a phone number would land
    Resolve {
        #[arg(short, long)]
        phone: String,
    },

    /// Manage favorite contacts
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// Save a contact
    Add {
        #[arg(short, long)]
        phone: String,

        /// Optional nickname
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Remove a contact
    Remove {
        #[arg(short, long)]
        phone: String,
    },

    /// List saved contacts
    List,
}

/// Everything the subcommands operate on, wired over one durable store
struct Services {
    config: Config,
    session: SessionManager,
    ledger: TransactionLedger,
    wallet: WalletLinkStore,
    verification: PhoneVerification,
    directory: WalletDirectory,
    favorites: FavoritesStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load config
    let config = if let Some(config_path) = cli.config {
        let content =
            std::fs::read_to_string(&config_path).map_err(|e| Error::Config(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
    } else {
        Config::default()
    };

    let services = build_services(config).await?;

    match cli.command {
        Commands::Login {
            phone,
            code,
            remember,
        } => run_login(&services, phone, code, remember).await?,
        Commands::Logout => run_logout(&services).await?,
        Commands::Status => run_status(&services).await?,
        Commands::Send {
            phone,
            amount,
            note,
        } => run_send(&services, phone, amount, note).await?,
        Commands::Retry { id } => run_retry(&services, id).await?,
        Commands::History => run_history(&services).await?,
        Commands::Register { phone, address } => {
            services.directory.register(&phone, &address).await?;
            println!(
                "Successfully registered {} to {}...{}.",
                phone,
                &address[..6],
                &address[38..]
            );
        }
        Commands::Resolve { phone } => match services.directory.resolve(&phone).await? {
            Resolution::Wallet(address) => println!("{phone} -> {address}"),
            Resolution::Escrow => println!(
                "User {phone} is not registered. Funds will be held in escrow until they sign up."
            ),
        },
        Commands::Favorites { action } => run_favorites(&services, action).await?,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&services.config)?);
        }
    }

    Ok(())
}

async fn build_services(config: Config) -> Result<Services> {
    let state_file = match &config.state_file {
        Some(path) => PathBuf::from(path),
        None => {
            let dir = std::env::var(wallet_resolver::config::DATA_DIR_ENV)
                .unwrap_or_else(|_| ".wallet-resolver".to_string());
            PathBuf::from(dir).join("state.json")
        }
    };

    let durable: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&state_file).await?);
    let session_scoped: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let ledger = TransactionLedger::load(durable.clone()).await?;
    let wallet = WalletLinkStore::new(durable.clone());
    let verification = PhoneVerification::new(durable.clone());
    let favorites = FavoritesStore::new(durable.clone());
    let directory = WalletDirectory::new();
    let session = SessionManager::restore(
        durable,
        session_scoped,
        wallet.clone(),
        verification.clone(),
        ledger.clone(),
        config.session.clone(),
    )
    .await?;

    Ok(Services {
        config,
        session,
        ledger,
        wallet,
        verification,
        directory,
        favorites,
    })
}

async fn require_login(services: &Services) -> Result<()> {
    if !services.session.authenticated().await {
        return Err(Error::Session(
            "not logged in; run `wallet-resolver login` first".to_string(),
        ));
    }
    services.session.record_activity().await;
    Ok(())
}

async fn run_login(
    services: &Services,
    phone: String,
    code: Option<String>,
    remember: bool,
) -> Result<()> {
    let Some(code) = code else {
        services.verification.send_code(&phone).await?;
        println!("A verification code has been sent to your phone.");
        println!("Re-run with --code <CODE> to finish logging in.");
        return Ok(());
    };

    services.verification.verify_code(&code).await?;
    services.session.login(&phone, remember).await?;

    // The demo links a freshly generated wallet on every login
    let address = wallet::generate_address();
    services.wallet.link(&address).await?;

    println!("Login successful. Welcome, {phone}!");
    println!("Linked wallet: {address}");
    Ok(())
}

async fn run_logout(services: &Services) -> Result<()> {
    services.session.logout().await?;
    println!("You have been successfully logged out.");
    Ok(())
}

async fn run_status(services: &Services) -> Result<()> {
    let state = services.session.state().await;
    match state.phase {
        SessionPhase::LoggedOut => println!("Session: logged out"),
        SessionPhase::Active => println!(
            "Session: active as {}",
            state.identity.as_deref().unwrap_or("<unknown>")
        ),
        SessionPhase::WarningPending => println!(
            "Session: expiring soon ({}s left to extend)",
            state.countdown_secs.unwrap_or(0)
        ),
    }

    match services.wallet.linked().await? {
        Some(address) => println!("Wallet:  {address}"),
        None => println!("Wallet:  not linked"),
    }
    println!(
        "Phone:   {}",
        if services.verification.is_verified().await? {
            "verified"
        } else {
            "not verified"
        }
    );
    println!("History: {} transactions", services.ledger.list().await.len());
    Ok(())
}

async fn run_send(
    services: &Services,
    phone: String,
    amount: f64,
    note: Option<String>,
) -> Result<()> {
    require_login(services).await?;

    match services.directory.resolve(&phone).await? {
        Resolution::Wallet(address) => {
            println!("Sending to {} (wallet: {}...).", phone, &address[..6]);
        }
        Resolution::Escrow => {
            println!(
                "User {phone} is not registered. Funds will be held in escrow until they sign up."
            );
        }
    }

    let request = SendRequest {
        counterparty_phone: phone,
        amount,
        network_fee: services.config.simulator.network_fee,
        note,
    };
    let outcome = simulate(services, |sim| async move { sim.send(request).await }).await?;
    report_outcome(services, outcome).await
}

async fn run_retry(services: &Services, id: String) -> Result<()> {
    require_login(services).await?;
    let outcome = simulate(services, |sim| async move { sim.retry(&id).await }).await?;
    report_outcome(services, outcome).await
}

/// Build a simulator wired for live progress output and run one attempt
async fn simulate<F, Fut>(services: &Services, attempt: F) -> Result<SendOutcome>
where
    F: FnOnce(Arc<TransactionSimulator>) -> Fut,
    Fut: std::future::Future<Output = Result<SendOutcome>>,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let simulator = Arc::new(
        TransactionSimulator::new(
            services.ledger.clone(),
            Arc::new(RandomFailure::new(
                services.config.simulator.failure_probability,
            )),
            &services.config.simulator,
        )
        .with_events(tx),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("[{:>3}%] {}", event.progress_percent, event.stage.label());
        }
    });

    let outcome = attempt(simulator).await;
    // Dropping the last simulator handle closes the event channel
    printer.await.ok();
    outcome
}

async fn report_outcome(services: &Services, outcome: SendOutcome) -> Result<()> {
    match outcome {
        SendOutcome::Completed {
            transaction_id,
            confirmation_reference,
        } => {
            let record = services.ledger.get(&transaction_id).await;
            println!("Transaction Sent!");
            if let Some(record) = record {
                println!(
                    "  You successfully sent {:.4} ETH to {}.",
                    record.amount, record.counterparty_phone
                );
                println!("  Gas fee: {:.4} ETH  Total: {:.4} ETH", record.network_fee, record.total());
            }
            println!("  Transaction hash: {confirmation_reference}");
        }
        SendOutcome::Failed { transaction_id } => {
            println!("Transaction Failed");
            println!("  Unfortunately, we were unable to process your transaction.");
            println!("  Try again with: wallet-resolver retry --id {transaction_id}");
        }
        SendOutcome::Cancelled { transaction_id } => {
            println!("Send cancelled; {transaction_id} is still pending.");
        }
    }
    Ok(())
}

async fn run_history(services: &Services) -> Result<()> {
    require_login(services).await?;

    let records = services.ledger.list().await;
    if records.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }
    for record in records {
        let direction = match record.direction {
            wallet_resolver::Direction::Sent => "->",
            wallet_resolver::Direction::Received => "<-",
        };
        println!(
            "{}  {} {} {}  {:.4} ETH  [{:?}]",
            record.id,
            record.created_at.format("%Y-%m-%d %H:%M"),
            direction,
            record.counterparty_phone,
            record.amount,
            record.status,
        );
        if let Some(reference) = &record.confirmation_reference {
            println!("    hash: {reference}");
        }
        if let Some(note) = &record.note {
            println!("    note: {note}");
        }
    }
    Ok(())
}

async fn run_favorites(services: &Services, action: FavoritesAction) -> Result<()> {
    match action {
        FavoritesAction::Add { phone, name } => {
            services.favorites.add(Favorite { phone, name }).await?;
            println!("Saved.");
        }
        FavoritesAction::Remove { phone } => {
            services.favorites.remove(&phone).await?;
            println!("Removed.");
        }
        FavoritesAction::List => {
            let favorites = services.favorites.list().await?;
            if favorites.is_empty() {
                println!("No favorites saved.");
            }
            for favorite in favorites {
                match favorite.name {
                    Some(name) => println!("{}  ({})", favorite.phone, name),
                    None => println!("{}", favorite.phone),
                }
            }
        }
    }
    Ok(())
}
