//! linrelay - mirror a Claude Code session journal to a Linear agent session
//!
//! Tails the on-disk conversation journal for one session and projects each
//! new record into a structured activity on the tracker, maintaining the
//! mirrored plan as a side effect.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use linrelay_core::lock::SessionLock;
use linrelay_core::{Config, HttpTrackerClient, Watcher};

#[derive(Parser)]
#[command(name = "linrelay")]
#[command(about = "Mirror a Claude Code session journal to a Linear agent session")]
#[command(version)]
struct Args {
    /// Agent session id (UUID shared with the tracker)
    session_id: String,

    /// Poll interval in milliseconds when the journal is idle
    #[arg(long, default_value = "500")]
    poll: u64,

    /// Config file path (defaults to $XDG_CONFIG_HOME/linrelay/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let _log_guard =
        linrelay_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(session_id = %args.session_id, "linrelay starting");

    // Exactly one watcher per session id per host; contention is not an error
    let Some(_lock) = SessionLock::acquire(&args.session_id)
        .context("failed to acquire session lock")?
    else {
        println!(
            "Another watcher is already running for session {}",
            args.session_id
        );
        tracing::info!(session_id = %args.session_id, "Session lock held elsewhere, exiting");
        return Ok(());
    };

    let tracker =
        HttpTrackerClient::new(&config.tracker).context("failed to create tracker client")?;

    let stopping = Arc::new(AtomicBool::new(false));
    let flag = stopping.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to set signal handler")?;

    let mut watcher = Watcher::new(
        args.session_id.clone(),
        config.watcher.projects_dir(),
        tracker,
        stopping,
    )
    .with_poll_interval(Duration::from_millis(args.poll));

    let summary = watcher.run().await.context("watcher failed")?;

    println!(
        "Watched {} file(s): {} journal line(s), {} byte(s), {} activities",
        summary.files, summary.lines, summary.bytes, summary.activities
    );
    tracing::info!(
        files = summary.files,
        lines = summary.lines,
        bytes = summary.bytes,
        activities = summary.activities,
        "linrelay stopped"
    );

    Ok(())
}
