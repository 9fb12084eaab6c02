use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use uistatus_core::MprisStyle;

use uistatus_daemon::error::DaemonError;
use uistatus_daemon::sources::mpris::{MprisConfig, MprisTracker};
use uistatus_daemon::sources::{proc, volume};
use uistatus_daemon::{store, watch, writer};

/// Store directory name under the user runtime dir.
const STORE_DIR_NAME: &str = "ui-statuses";

#[derive(Parser)]
#[command(name = "uistatus", about = "Host telemetry aggregator for status bars")]
struct Cli {
    #[command(flatten)]
    daemon: DaemonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct DaemonArgs {
    /// Enable every source
    #[arg(short = 'a', long)]
    all: bool,

    /// CPU busy percentage (1s)
    #[arg(short = 'c', long)]
    cpu: bool,

    /// Load averages (10s)
    #[arg(short = 'l', long)]
    load: bool,

    /// Memory and swap usage (5s)
    #[arg(short = 'm', long)]
    mem: bool,

    /// Network device and throughput (1s)
    #[arg(short = 'n', long)]
    net: bool,

    /// Default sink volume via pactl
    #[arg(short = 'v', long)]
    vol: bool,

    /// Media players on the session bus
    #[arg(short = 'p', long)]
    mpris: bool,

    /// Player identity to ignore (repeatable)
    #[arg(short = 'b', long = "blacklist", value_name = "PLAYER")]
    blacklist: Vec<String>,

    /// Marker appended to truncated media fields
    #[arg(long, default_value = "…")]
    truncate_text: String,

    #[arg(long, default_value = "▶")]
    icon_playing: String,

    #[arg(long, default_value = "⏸")]
    icon_paused: String,

    #[arg(long, default_value = "⏹")]
    icon_stopped: String,

    #[arg(long, default_value = "○")]
    icon_none: String,

    /// Status store root (default: $XDG_RUNTIME_DIR/ui-statuses)
    #[arg(long)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow status files and print composed polybar output
    Watch {
        /// Polybar foreground color for the icon glyphs
        #[arg(long, default_value = "#ffb52a")]
        color: String,

        /// Status store root (default: $XDG_RUNTIME_DIR/ui-statuses)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Tags to follow (default: every file currently in the store)
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing. Respects RUST_LOG env var, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => run_daemon(cli.daemon).await?,
        Some(Commands::Watch { color, root, tags }) => {
            let root = resolve_root(root)?;
            let handle = tokio::task::spawn_blocking(move || watch::run_watch(root, tags, color));
            tokio::select! {
                result = handle => result??,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }

    Ok(())
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf, DaemonError> {
    match root {
        Some(root) => Ok(root),
        None => std::env::var_os("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join(STORE_DIR_NAME))
            .ok_or(DaemonError::RuntimeDirUnset),
    }
}

async fn run_daemon(mut args: DaemonArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.all {
        args.cpu = true;
        args.load = true;
        args.mem = true;
        args.net = true;
        args.vol = true;
        args.mpris = true;
    }

    let root = resolve_root(args.root.take())?;
    let store = store::StatusStore::open(root)?;
    tracing::info!(root = %store.root().display(), "starting uistatus daemon");

    // StatusUpdate channel: sources -> writer. Unbounded: producers are
    // paced by their own intervals, never by the consumer.
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if args.cpu {
        tasks.push(tokio::spawn(proc::cpu_percent(tx.clone(), cancel.clone())));
    }
    if args.load {
        tasks.push(tokio::spawn(proc::load_avg(tx.clone(), cancel.clone())));
    }
    if args.mem {
        tasks.push(tokio::spawn(proc::memory(tx.clone(), cancel.clone())));
    }
    if args.net {
        tasks.push(tokio::spawn(proc::network(tx.clone(), cancel.clone())));
    }
    if args.vol {
        tasks.push(tokio::spawn(volume::volume(tx.clone(), cancel.clone())));
    }
    if args.mpris {
        let config = MprisConfig {
            blacklist: args.blacklist.clone(),
            style: MprisStyle {
                icon_playing: args.icon_playing.clone(),
                icon_paused: args.icon_paused.clone(),
                icon_stopped: args.icon_stopped.clone(),
                icon_none: args.icon_none.clone(),
                truncate_marker: args.truncate_text.clone(),
            },
        };
        // Connect before spawning so a missing session bus fails startup
        // instead of being swallowed inside a task.
        let tracker = MprisTracker::connect(config, tx.clone()).await?;
        let tracker_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(err) = tracker.run(tracker_cancel).await {
                tracing::error!("mpris tracker failed: {err}");
            }
        }));
    }

    if tasks.is_empty() {
        tracing::warn!("no sources enabled, try --all");
    }

    // The writer exits once every source has dropped its sender.
    let writer = tokio::spawn(writer::run_writer(store, rx));
    drop(tx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    let _ = writer.await;
    tracing::info!("uistatus daemon stopped");

    Ok(())
}
