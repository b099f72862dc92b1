//! tshragd: the scheduling daemon.
//!
//! Holds a single-instance lock on the scheduler root, runs the admission
//! tick on a fixed interval and shuts down on SIGINT/SIGTERM. Admitted tests
//! run the stock test main (distribution, then execution).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};

use tshrag_core::config::{load_dotenv, Config};
use tshrag_core::ScopedLock;
use tshrag_scheduler::Tshrag;

/// Hardware-in-the-loop test scheduler daemon.
#[derive(Parser, Debug)]
#[command(name = "tshragd", version, about)]
struct Cli {
    /// Directory holding every test's state.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Address exported to steps as TSHRAG_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Worker pool capacity; 0 means available parallelism.
    #[arg(long)]
    max_workers: Option<usize>,

    /// Admission tick interval in milliseconds.
    #[arg(long)]
    refresh_interval_ms: Option<u64>,

    /// Configuration profile prefix (e.g. LAB reads LAB_TSHRAG_ROOT first).
    #[arg(long, env = "TSHRAG_PROFILE")]
    profile: Option<String>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = match &self.profile {
            Some(profile) => Config::for_profile(profile),
            None => Config::from_env(),
        };
        if let Some(root) = &self.root {
            config.scheduler.root = root.clone();
        }
        if let Some(host) = &self.host {
            config.scheduler.host = host.clone();
        }
        if let Some(max_workers) = self.max_workers {
            config.scheduler.max_workers = max_workers;
        }
        if let Some(interval) = self.refresh_interval_ms {
            config.scheduler.refresh_interval_ms = interval;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    config.log_summary();

    let scheduler = Tshrag::new(&config.scheduler, config.mdb.clone())
        .context("failed to initialize scheduler")?
        .with_default_test_main();

    let Some(_daemon_lock) = ScopedLock::try_acquire(scheduler.daemon_lock_file())
        .context("failed to open daemon lock")?
    else {
        bail!(
            "another tshragd already serves {}",
            scheduler.root().display()
        );
    };

    let mut interval =
        tokio::time::interval(Duration::from_millis(config.scheduler.refresh_interval_ms.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(root = %scheduler.root().display(), "tshragd started");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let tick = scheduler.clone();
                match tokio::task::spawn_blocking(move || tick.refresh()).await {
                    Ok(Ok(admitted)) if !admitted.is_empty() => {
                        info!(admitted = admitted.len(), "Tests admitted");
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Refresh failed"),
                    Err(e) => error!(error = %e, "Refresh task panicked"),
                }
            }
        }
    }

    info!("Shutdown signal received");
    let in_flight = scheduler.shutdown();
    info!(in_flight, "tshragd exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
