//! SecureMonitor daemon entrypoint.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use securemonitor::api::{self, AppState};
use securemonitor::cli::Cli;
use securemonitor::config::Config;
use securemonitor::firewall::{self, FirewallBackend, UfwFirewall};
use securemonitor::lock::LockGuard;
use securemonitor::monitor::Monitor;
use securemonitor::simulator::Simulator;
use securemonitor::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("securemonitor starting up");

    let config = Config::load(&cli.config)
        .with_context(|| format!("cannot start without config {:?}", cli.config))?;

    let _lock = LockGuard::acquire()?;

    if let Err(e) = firewall::check_root() {
        warn!("{}; blocks will be attempted and failures logged", e);
    }

    let store = Arc::new(Store::new());
    store.load_from_file(Path::new(&config.blocked_ips_file));
    info!("loaded blocked ip list from {}", config.blocked_ips_file);

    let simulator = Arc::new(Simulator::new());
    let firewall: Arc<dyn FirewallBackend> = Arc::new(UfwFirewall::new());

    let listen = cli.listen.as_deref().unwrap_or(&config.listen_addr);
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", listen))?;
    api::serve(
        addr,
        AppState {
            store: store.clone(),
            simulator: simulator.clone(),
            firewall: firewall.clone(),
        },
    )
    .await?;

    info!("entering monitoring loop");
    let monitor = Monitor::new(config, store, simulator, firewall)?;
    monitor.run().await;

    Ok(())
}
