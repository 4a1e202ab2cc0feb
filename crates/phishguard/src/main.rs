//! phishguard - navigation-aware phishing verdict overlay
//!
//! `watch` runs the overlay against an address feed (stdin, or a polled file
//! with `--follow`); `scan`, `history` and `clear-history` are the manual
//! panel operations.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use phishguard_core::config::{Config, LogFormat};
use phishguard_core::history::{DEFAULT_HISTORY_LIMIT, summarize};
use phishguard_core::logging::{LogConfig, init_logging};
use phishguard_core::navigation::{ChangeSource, ChannelChangeSource, PollingChangeSource};
use phishguard_core::overlay::{SIGNAL_QUEUE_CAPACITY, run_overlay};
use phishguard_core::relay::RelayHost;
use phishguard_core::renderer::Indicator;
use phishguard_core::service::AnalysisClient;
use phishguard_core::{Error, RelayError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod terminal;

use terminal::TerminalSurface;

/// phishguard - navigation-aware phishing verdict overlay
#[derive(Parser, Debug)]
#[command(name = "phishguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to phishguard.toml (defaults to the user config directory)
    #[arg(short, long, global = true, env = "PHISHGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a page: reads its address from stdin, one line per change,
    /// and prints the verdict banner for every settled navigation
    Watch {
        /// Address of the page at load time
        url: String,

        /// Sample the address from this file every [watcher].poll_interval_ms
        /// instead of reading stdin
        #[arg(long, value_name = "PATH")]
        follow: Option<PathBuf>,
    },

    /// Scan one address now
    Scan {
        /// Page address
        url: String,

        /// Print the service record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show past scans, most recent first
    History {
        /// Number of rows to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear the service-side scan history
    ClearHistory,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let remediation = err
                .downcast_ref::<Error>()
                .and_then(Error::remediation)
                .or_else(|| err.downcast_ref::<RelayError>().map(RelayError::remediation));
            if let Some(remediation) = remediation {
                eprintln!("\n{}", remediation.render_plain());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    init_logging(&LogConfig::from(&config.general)).context("Failed to initialize logging")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Watch { url, follow } => watch(&config, url, follow).await,
            Commands::Scan { url, json } => scan(&config, &url, json).await,
            Commands::History { limit, json } => history(&config, limit, json).await,
            Commands::ClearHistory => clear_history(&config).await,
        }
    });
    // A pending stdin read would otherwise hold shutdown until the next line.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn watch(config: &Config, url: String, follow: Option<PathBuf>) -> Result<()> {
    match follow {
        Some(path) => {
            let source = file_source(path, config.watcher.poll_interval(), url.clone());
            watch_with(config, url, source).await
        }
        None => {
            let (feed, source) = ChannelChangeSource::channel(SIGNAL_QUEUE_CAPACITY);
            tokio::spawn(feed_from_stdin(feed));
            watch_with(config, url, source).await
        }
    }
}

async fn watch_with<C: ChangeSource + 'static>(config: &Config, url: String, source: C) -> Result<()> {
    let client = AnalysisClient::new(&config.relay)?;
    let (relay, host_task) = RelayHost::new(Arc::new(client)).spawn(&config.relay);

    info!(url = %url, endpoint = %config.relay.endpoint, "Watching page");
    let (summary, overlay) = run_overlay(
        config,
        url,
        source,
        Arc::new(relay),
        TerminalSurface::new(std::io::stdout()),
    )
    .await?;
    drop(overlay);
    join_relay_host(host_task).await;

    info!(
        relay_calls = summary.relay_calls,
        rendered = summary.sessions.rendered,
        muted = summary.sessions.muted,
        failed = summary.sessions.failed,
        "Watch finished"
    );
    Ok(())
}

/// Wait for the relay host to stop. Returns false when its task failed.
async fn join_relay_host(host_task: JoinHandle<()>) -> bool {
    match host_task.await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Relay host task failed");
            false
        }
    }
}

/// Sample the address stored in `path` every `interval` until interrupted.
/// An unreadable or empty file keeps the last address.
fn file_source(
    path: PathBuf,
    interval: Duration,
    initial: String,
) -> PollingChangeSource<impl FnMut() -> Option<String> + Send> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::Relaxed);
        }
    });

    let mut last = initial;
    PollingChangeSource::new(
        move || {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            if let Ok(raw) = std::fs::read_to_string(&path) {
                let address = raw.trim();
                if !address.is_empty() {
                    address.clone_into(&mut last);
                }
            }
            Some(last.clone())
        },
        interval,
    )
}

/// Forward stdin lines as address changes until end of input or Ctrl-C.
async fn feed_from_stdin(feed: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if feed.send(line.to_string()).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    debug!(error = %err, "Stopped reading stdin");
                    return;
                }
            },
            _ = tokio::signal::ctrl_c() => return,
        }
    }
}

async fn scan(config: &Config, url: &str, json: bool) -> Result<()> {
    let client = AnalysisClient::new(&config.relay)?;
    let entry = client.analyze(url).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    let verdict = entry.verdict()?;
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{}",
        Indicator::for_verdict(&verdict, &config.renderer.brand).text
    )?;
    writeln!(out, "Verdict:    {}", verdict.classification)?;
    writeln!(out, "Risk score: {}/100", verdict.risk_score)?;
    if let Some(domain) = entry.result.as_ref().and_then(|r| r.domain.as_deref()) {
        writeln!(out, "Domain:     {domain}")?;
    }
    if !verdict.reasons.is_empty() {
        writeln!(out, "Reasons:")?;
        for reason in &verdict.reasons {
            writeln!(out, "  - {reason}")?;
        }
    }
    if let Some(model) = entry.model.as_deref() {
        writeln!(out, "Model:      {model}")?;
    }
    if let Some(ai_error) = entry.ai_error.as_deref() {
        writeln!(out, "AI error:   {ai_error}")?;
    }
    Ok(())
}

async fn history(config: &Config, limit: usize, json: bool) -> Result<()> {
    let client = AnalysisClient::new(&config.relay)?;
    let entries = client.history().await?;
    let rows = summarize(&entries, limit);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No scans yet.");
        return Ok(());
    }

    let mut out = std::io::stdout().lock();
    for row in &rows {
        let when = row
            .scanned_at()
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        writeln!(
            out,
            "{when:<16}  {:<6}  {:<10}  {}",
            row.mode.as_str(),
            row.classification.as_str(),
            row.url
        )?;
    }
    Ok(())
}

async fn clear_history(config: &Config) -> Result<()> {
    let client = AnalysisClient::new(&config.relay)?;
    client.clear_history().await?;
    println!("History cleared.");
    Ok(())
}
