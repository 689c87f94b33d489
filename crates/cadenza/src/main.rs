//! Cadenza command-line scanner
//!
//! Runs the in-process host and drives one `create_library` job through the
//! scan orchestrator, rendering progress on stderr and the result on stdout.

use anyhow::{Context, Result};
use cadenza::{
    Bridge, CadenzaConfig, CancellationToken, LibraryHost, LocalHost, ScanOrchestrator,
    ScanRequest, ScanSession, ScanTerminal,
};
use cadenza_logging::{init_logging, LogConfig};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EXIT_FAILED: u8 = 1;
const EXIT_CONTRACT_VIOLATION: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "cadenza", version, about = "Scan directories into a music library")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Cadenza home directory (config.toml and logs/)
    #[arg(long, global = true, env = "CADENZA_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a library from one or more directories and scan it
    Scan {
        /// Library name
        #[arg(short, long)]
        name: Option<String>,

        /// Directories to scan
        locations: Vec<String>,

        /// Print the final session as JSON
        #[arg(long)]
        json: bool,

        /// Item failures to print before collapsing the rest
        #[arg(long)]
        max_failures: Option<usize>,

        /// Follow symbolic links while walking
        #[arg(long)]
        follow_symlinks: bool,

        /// Include dot-files and dot-directories
        #[arg(long)]
        include_hidden: bool,
    },
}

struct ScanOptions {
    name: Option<String>,
    locations: Vec<String>,
    json: bool,
    max_failures: Option<usize>,
    follow_symlinks: bool,
    include_hidden: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let home = cli.home.clone().unwrap_or_else(cadenza::config::cadenza_home);
    let log_config = LogConfig {
        verbose: cli.verbose,
        quiet: !cli.verbose,
        log_dir: Some(home.join("logs")),
        ..LogConfig::new("cadenza")
    };
    if let Err(err) = init_logging(log_config) {
        eprintln!("Warning: failed to initialise logging: {:#}", err);
    }

    let result = match cli.command {
        Commands::Scan {
            name,
            locations,
            json,
            max_failures,
            follow_symlinks,
            include_hidden,
        } => {
            let options = ScanOptions {
                name,
                locations,
                json,
                max_failures,
                follow_symlinks,
                include_hidden,
            };
            run_scan(options, home, cli.verbose).await
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run_scan(options: ScanOptions, home: PathBuf, verbose: bool) -> Result<ExitCode> {
    let locations = (!options.locations.is_empty()).then_some(options.locations);
    let request = match ScanRequest::from_parts(options.name, locations) {
        Ok(request) => request,
        Err(violation) => {
            if options.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "invalid", "error": violation.to_string() })
                );
            } else {
                eprintln!("Error: {}", violation);
            }
            return Ok(ExitCode::from(EXIT_CONTRACT_VIOLATION));
        }
    };

    let config_path = home.join("config.toml");
    let config = CadenzaConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let mut scan_config = config.host_scan_config();
    scan_config.follow_symlinks |= options.follow_symlinks;
    scan_config.include_hidden |= options.include_hidden;
    let max_failures = options
        .max_failures
        .unwrap_or(config.display.max_failures_shown);

    let host = LocalHost::new();
    LibraryHost::new(scan_config).install(&host);

    let cancel = CancellationToken::new();
    let orchestrator =
        ScanOrchestrator::new(Bridge::new(Arc::new(host))).with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    let progress = (!options.json && !verbose).then(|| spawn_progress(orchestrator.state()));

    let terminal = orchestrator
        .start_scan(&request)
        .await
        .context("Scan could not start")?;

    if let Some(handle) = progress {
        if let Err(err) = handle.await {
            warn!("Progress display task failed: {}", err);
        }
    }

    let session = orchestrator.session();
    info!(job_id = %session.job_id, %terminal, "Scan complete");

    if options.json {
        let rendered =
            serde_json::to_string_pretty(&session).context("Failed to serialise scan session")?;
        println!("{}", rendered);
    } else {
        print_summary(&session, request.name(), max_failures);
    }

    Ok(match terminal {
        ScanTerminal::Failed => ExitCode::from(EXIT_FAILED),
        _ => ExitCode::SUCCESS,
    })
}

fn spawn_progress(mut state: watch::Receiver<ScanSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {prefix:>8} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }

        loop {
            let session = state.borrow_and_update().clone();
            if let Some(progress) = &session.latest_progress {
                bar.set_prefix(progress.phase.to_string());
                bar.set_length(progress.total);
                bar.set_position(progress.current);
                bar.set_message(progress.path.clone());
            }
            if session.terminal.is_finished() || state.changed().await.is_err() {
                break;
            }
        }
        bar.finish_and_clear();
    })
}

fn print_summary(session: &ScanSession, name: &str, max_failures: usize) {
    match session.terminal {
        ScanTerminal::Failed => {
            if let Some(error) = &session.command_error {
                eprintln!("Library scan failed: {}", error.message);
                for line in error.context_lines() {
                    eprintln!("  {}", line);
                }
            }
        }
        ScanTerminal::CompletedClean | ScanTerminal::CompletedWithErrors => {
            if let Some(outcome) = &session.outcome {
                println!(
                    "Created library '{}' (id {}) with {} tracks",
                    name, outcome.id, outcome.track_count
                );
            }
            if !session.item_failures.is_empty() {
                println!(
                    "{} files could not be indexed:",
                    session.item_failures.len()
                );
                print!("{}", session.failure_digest(max_failures));
            }
        }
        ScanTerminal::Idle | ScanTerminal::Running => {}
    }
}
