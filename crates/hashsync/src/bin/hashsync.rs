//! hashsync command-line tool.
//!
//! # Commands
//!
//! - `serve` - Run the sync server
//! - `push` - Register one record and reconcile it with a server

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hashsync::{client, Record, ServerConfig, SessionConfig, Store, StoreBackend, SyncServer};
use tracing_subscriber::EnvFilter;

/// Digest-checked record sync between a client and a server.
#[derive(Parser)]
#[command(name = "hashsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync server
    Serve {
        /// Listen address (overrides HASHSYNC_ADDR)
        #[arg(short, long)]
        addr: Option<String>,

        /// Store backend: memory, sqlite:PATH or postgres:URL (overrides HASHSYNC_STORE)
        #[arg(short, long)]
        store: Option<StoreBackend>,
    },

    /// Register a record and reconcile with a server
    Push {
        /// Server address
        #[arg(short, long, default_value = hashsync::DEFAULT_ADDR)]
        addr: String,

        /// Record content
        #[arg(short, long)]
        content: String,

        /// Local store backend
        #[arg(short, long, default_value = "memory")]
        store: StoreBackend,

        /// Seconds to wait for convergence
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { addr, store } => serve(addr, store).await,
        Commands::Push {
            addr,
            content,
            store,
            timeout,
        } => push(&addr, content, store, Duration::from_secs(timeout)).await,
    }
}

async fn serve(addr: Option<String>, store: Option<StoreBackend>) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env().context("reading server environment")?;
    if let Some(addr) = addr {
        config = config.with_addr(addr);
    }
    if let Some(store) = store {
        config = config.with_store(store);
    }

    tracing::info!(store = %config.store, "opening store");
    let server = SyncServer::bind(config).await.context("starting server")?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

async fn push(
    addr: &str,
    content: String,
    backend: StoreBackend,
    timeout: Duration,
) -> anyhow::Result<()> {
    let store = backend.open().await.context("opening local store")?;
    let record = Record::create(content);
    store.put(&record).await?;
    println!("registered {}", record.id);

    let session = client::connect(addr, store, SessionConfig::client())
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    let mut events = session.subscribe();

    let runner = session.clone();
    let running = tokio::spawn(async move { runner.run().await });

    let outcome = client::await_convergence(session.store().as_ref(), &mut events, timeout).await;
    session.close().await?;
    running.abort();

    let event = outcome.context("waiting for the server to converge")?;
    println!("converged: {event:?}");
    let report = session.report();
    println!(
        "frames={} snapshots_served={} snapshots_applied={}",
        report.frames_received, report.snapshots_served, report.snapshots_applied
    );
    Ok(())
}
