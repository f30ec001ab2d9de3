use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hostwatch_core::{
    DirectoryWatcher, PerformanceLog, PerformanceTracker, Report, WatchConfig,
};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostwatch")]
#[command(about = "Directory change watcher and host performance tracker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a directory and report created, modified and deleted entries
    Watch {
        /// Directory to watch (immediate entries only)
        #[arg(short, long, default_value = "test_folder")]
        dir: PathBuf,

        /// Seconds between polls
        #[arg(short, long, default_value_t = 3)]
        interval: u64,

        /// CSV event log
        #[arg(short, long, default_value = "file_monitor_log.csv")]
        log: PathBuf,

        /// Do not create the watched directory if it is missing
        #[arg(long)]
        no_create: bool,
    },

    /// Periodically sample CPU, memory, disk and process figures
    Perf {
        /// Seconds between samples
        #[arg(short, long, default_value_t = 5)]
        interval: u64,

        /// CSV performance log
        #[arg(short, long, default_value = "logs/performance_report.csv")]
        log: PathBuf,

        /// Mount point whose usage is reported as disk_percent
        #[arg(short, long, default_value = "/")]
        mount: PathBuf,

        /// Stop after this many samples
        #[arg(short, long)]
        count: Option<u64>,
    },

    /// Summarise the performance and event logs
    Report {
        #[arg(long, default_value = "logs/performance_report.csv")]
        perf_log: PathBuf,

        #[arg(long, default_value = "file_monitor_log.csv")]
        event_log: PathBuf,

        /// Text summary output
        #[arg(short, long, default_value = "summary.txt")]
        output: PathBuf,

        /// Also print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so event lines on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            dir,
            interval,
            log,
            no_create,
        } => watch(dir, interval, log, !no_create).await,
        Commands::Perf {
            interval,
            log,
            mount,
            count,
        } => perf(interval, log, mount, count).await,
        Commands::Report {
            perf_log,
            event_log,
            output,
            json,
        } => report(perf_log, event_log, output, json),
    }
}

async fn watch(dir: PathBuf, interval: u64, log: PathBuf, create_directory: bool) -> Result<()> {
    let shutdown = shutdown_signal()?;
    let mut watcher = DirectoryWatcher::new(WatchConfig {
        directory: dir,
        interval: Duration::from_secs(interval.max(1)),
        event_log: log,
        create_directory,
    });

    let summary = watcher.run(shutdown).await;
    info!(
        "Watched {} cycles, reported {} events",
        summary.cycles, summary.events
    );
    Ok(())
}

async fn perf(interval: u64, log: PathBuf, mount: PathBuf, count: Option<u64>) -> Result<()> {
    let shutdown = shutdown_signal()?;
    tokio::pin!(shutdown);
    let mut tracker = PerformanceTracker::new(mount);
    let log = PerformanceLog::new(log);
    let interval = Duration::from_secs(interval.max(1));

    let mut taken = 0u64;
    loop {
        let sample = tracker.sample();
        println!("{}", sample.status_report());
        if let Err(err) = log.append(&sample) {
            warn!("{:#}", err);
        }

        taken += 1;
        if count.is_some_and(|count| taken >= count) {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    println!("[INFO] Performance tracking stopped after {taken} samples.");
    Ok(())
}

fn report(perf_log: PathBuf, event_log: PathBuf, output: PathBuf, json: bool) -> Result<()> {
    let report = Report::generate(&perf_log, &event_log)?;
    report.write_summary(&output)?;
    print!("{}", report.render_text());

    if json {
        println!("{}", report.to_json().context("Failed to serialise report")?);
    }

    info!("Summary written to {}", output.display());
    Ok(())
}

/// Installs the SIGINT handler immediately; the returned future resolves on Ctrl+C.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install Ctrl+C handler")?;
    Ok(async move {
        interrupt.recv().await;
    })
}
