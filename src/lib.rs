pub mod capture;
pub mod commands;
pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod services;
pub mod store;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use crate::capture::pcap_backend::PcapProvider;
use crate::capture::CaptureProvider;
use crate::commands::Coordinator;
use crate::core::{CommandNotifier, LogNotifier, Notifier};
use crate::services::BackgroundServices;
use crate::store::StatusStore;

/// Count today's network traffic on one interface and notify once when a
/// daily threshold is exceeded.
#[derive(Debug, Parser)]
#[command(name = "traffic-ledger", version, about)]
pub struct AgentOptions {
    /// Interface to monitor (overrides the persisted selection).
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Path of the persisted ledger record.
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Daily threshold in bytes (overrides the persisted threshold).
    #[arg(short, long, value_name = "BYTES")]
    pub threshold: Option<u64>,

    /// Seconds between rollover/threshold checks.
    #[arg(long, default_value_t = config::TICK_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_secs: u64,

    /// Program run as `<program> <title> <body>` for notifications.
    #[arg(long, value_name = "PROGRAM")]
    pub notify_cmd: Option<String>,

    /// Print capture-capable interfaces and exit.
    #[arg(long)]
    pub list_interfaces: bool,

    /// Do not read commands from stdin; run until interrupted.
    #[arg(long)]
    pub no_console: bool,
}

/// Process entry point: logging, argument parsing, runtime.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in traffic-ledger: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_ledger=info".into()),
        )
        .init();

    let options = AgentOptions::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;
    let result = runtime.block_on(run_agent(options));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Load the ledger, start the accounting loop and serve commands until quit.
pub async fn run_agent(options: AgentOptions) -> anyhow::Result<()> {
    let provider: Arc<dyn CaptureProvider> = Arc::new(PcapProvider);

    if options.list_interfaces {
        for iface in provider.list_interfaces()? {
            println!(
                "{}\t{}{}",
                iface.name,
                iface.description,
                if iface.has_address { "" } else { " (no address)" }
            );
        }
        return Ok(());
    }

    let store = StatusStore::new(
        options
            .state_file
            .clone()
            .unwrap_or_else(StatusStore::default_path),
    );
    let mut status = store
        .load_or_default(config::DEFAULT_THRESHOLD_BYTES)
        .context("cannot load the usage ledger; move or fix the file to continue")?;
    if let Some(threshold) = options.threshold {
        status.threshold_bytes = threshold;
    }
    tracing::info!(
        "Ledger {} loaded: {}",
        store.path().display(),
        status.usage_summary()
    );
    let status = Arc::new(Mutex::new(status));

    let notifier: Arc<dyn Notifier> = match &options.notify_cmd {
        Some(program) => Arc::new(CommandNotifier::new(program)),
        None => Arc::new(LogNotifier),
    };

    let ticker = BackgroundServices::start_status_ticker(
        Arc::clone(&status),
        store.clone(),
        Arc::clone(&notifier),
        Duration::from_secs(options.tick_secs),
    );

    let mut coordinator = Coordinator::new(Arc::clone(&status), store, provider, notifier);
    if let Err(e) = coordinator.bootstrap(options.interface.as_deref()) {
        ticker.abort();
        return Err(e).context("cannot start monitoring");
    }
    let (handle, coordinator_task) = coordinator.spawn();

    let served: anyhow::Result<()> = if options.no_console {
        tokio::signal::ctrl_c().await.map_err(Into::into)
    } else {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        tokio::select! {
            served = console::run_console(handle.clone(), stdin, tokio::io::stdout()) => served,
            signal = tokio::signal::ctrl_c() => signal.map_err(Into::into),
        }
    };
    if let Err(e) = &served {
        tracing::error!("Control input failed: {e:#}");
    }

    // Runs however the control input ended so the last accounting is persisted.
    tracing::info!("Shutting down");
    if let Err(e) = handle.shutdown().await {
        tracing::warn!("Coordinator shutdown failed: {e}");
    }
    ticker.abort();
    coordinator_task.await?;
    served
}
