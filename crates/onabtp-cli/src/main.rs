//! onabtp - command-line client for the ONA BTP Odoo server.
//!
//! Lists projects, tasks and colleagues, edits tasks, and keeps working
//! from the local cache when the server cannot be reached. Writes made
//! offline are queued and replayed with `onabtp sync` or `onabtp watch`.

mod app;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use onabtp_core::Config;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "onabtp")]
#[command(about = "ONA BTP field client for Odoo, with offline cache and sync queue")]
#[command(version)]
struct Args {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Never contact the server; read from the cache and queue writes
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in to Odoo
    Login {
        /// Login email (defaults to the last one used)
        #[arg(short, long)]
        email: Option<String>,
        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the cached user
    Logout,
    /// Session, connectivity and cache summary
    Status,
    /// List my projects
    Projects,
    /// Show one project
    Project { id: i64 },
    /// List active tasks
    Tasks {
        /// Only tasks of this project
        #[arg(short, long)]
        project: Option<i64>,
    },
    /// Show one task
    Task { id: i64 },
    /// Create a task
    TaskCreate {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        project: Option<i64>,
        /// Assignee user id
        #[arg(short, long)]
        assignee: Option<i64>,
        /// Deadline as YYYY-MM-DD
        #[arg(short, long)]
        deadline: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// 0 normal, 1 high, 2 very high
        #[arg(long)]
        priority: Option<String>,
    },
    /// Update fields of a task
    TaskUpdate {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        /// Progress percentage
        #[arg(long)]
        progress: Option<f64>,
        /// Deadline as YYYY-MM-DD
        #[arg(short, long)]
        deadline: Option<String>,
        /// Raw `field=value` pairs, value parsed as JSON when possible
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    /// Delete a task
    TaskDelete { id: i64 },
    /// Show my profile
    Profile,
    /// List active colleagues
    Employees,
    /// Show the offline sync queue
    Queue {
        /// Remove actions that were already synced
        #[arg(long)]
        purge: bool,
    },
    /// Replay queued offline actions now
    Sync,
    /// Stay running and replay the queue whenever the server comes back
    Watch {
        /// Seconds between connectivity checks
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },
    /// Run a network diagnostic
    Diagnose,
    /// Delete all cached data, queue included
    ClearCache,
}

/// Initialize the tracing subscriber for logging.
///
/// Stderr gets `RUST_LOG` (default `warn`); a daily log file in the cache
/// directory gets everything at debug level.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr).with_filter(filter);

    match log_dir.and_then(|dir| std::fs::create_dir_all(dir).ok().map(|_| dir)) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "onabtp.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("onabtp_core=debug,onabtp=debug"));
            tracing_subscriber::registry().with(stderr).with(file).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let stored = Config::load()?;
    let mut config = stored.with_env();
    config.offline_mode |= args.offline;

    let log_dir = config.cache_dir().ok().map(|dir| dir.join("logs"));
    let _guard = init_tracing(log_dir.as_deref());
    info!(url = %config.url, database = %config.database, offline = config.offline_mode, "onabtp starting");

    let app = App::new(stored, config, args.json)?;
    app.run(args.command).await
}
