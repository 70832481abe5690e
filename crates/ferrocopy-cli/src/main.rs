//! ferrocopy - high-performance file copying tool
//!
//! Copies, moves and synchronizes files and directory trees through the
//! ferrocopy engine, with device-aware buffering, optional compression and
//! post-copy verification.

mod display;
mod json_output;
mod progress;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use ferrocopy_config::{Config, ConfigLoader};
use ferrocopy_device::DeviceProfiler;
use ferrocopy_engine::{CopyEngine, CopyRequest, OperationReport};
use ferrocopy_types::CopyMode;
use progress::ProgressDisplay;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// ferrocopy - high-performance file copying tool
#[derive(Parser)]
#[command(
    name = "ferrocopy",
    version = env!("CARGO_PKG_VERSION"),
    about = "High-performance file copying tool",
    long_about = "ferrocopy copies, moves and synchronizes files and directory trees.\n\
                  Buffer sizes and worker counts adapt to the detected storage devices,\n\
                  and copies can be compressed and verified."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - log at the configured level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy files and directories
    Copy(TransferArgs),
    /// Move files and directories
    Move(TransferArgs),
    /// Make the destination directory mirror the source
    Sync {
        #[command(flatten)]
        transfer: TransferArgs,
        /// Keep destination entries that are not in the source
        #[arg(long)]
        no_delete: bool,
    },
    /// Show device information
    Device {
        /// Path to analyze
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Show the built-in defaults instead of the loaded configuration
        #[arg(long)]
        default: bool,
        /// Write the configuration to a file (format from its extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TransferArgs {
    /// Source path
    source: PathBuf,
    /// Destination path
    destination: PathBuf,
    /// Compress destination files
    #[arg(long)]
    compress: bool,
    /// Preserve timestamps and permissions
    #[arg(short, long)]
    preserve: bool,
    /// Verify every file after copying
    #[arg(long)]
    verify: bool,
    /// Number of worker threads (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    threads: u32,
    /// Buffer size in bytes (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    buffer_size: u64,
    /// Cancel the operation after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl TransferArgs {
    fn into_request(self, mode: CopyMode) -> (CopyRequest, bool) {
        let mut request = CopyRequest::new(self.source, self.destination)
            .with_mode(mode)
            .compress(self.compress)
            .preserve_metadata(self.preserve)
            .verify_copy(self.verify)
            .with_threads(self.threads)
            .with_buffer_size(self.buffer_size);
        if let Some(seconds) = self.timeout {
            request = request.with_timeout(Duration::from_secs(seconds));
        }
        (request, self.json)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    init_logging(&config, cli.debug, cli.quiet, cli.verbose);
    info!("ferrocopy v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Copy(args) => {
            let (request, json) = args.into_request(CopyMode::Copy);
            transfer_command(config, request, json, cli.quiet).await
        }
        Commands::Move(args) => {
            let (request, json) = args.into_request(CopyMode::Move);
            transfer_command(config, request, json, cli.quiet).await
        }
        Commands::Sync {
            transfer,
            no_delete,
        } => {
            let (mut request, json) = transfer.into_request(CopyMode::Sync);
            if no_delete {
                let mut policy = config.policy.clone();
                policy.delete_extraneous = false;
                request = request.with_policy(policy);
            }
            transfer_command(config, request, json, cli.quiet).await
        }
        Commands::Device { path, json } => device_command(&config, path, json).await,
        Commands::Config { default, output } => config_command(config, default, output),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => ConfigLoader::load_default().context("failed to load configuration"),
    }
}

fn init_logging(config: &Config, debug: bool, quiet: bool, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else if verbose {
        config.logging.level.as_str()
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn transfer_command(config: Config, request: CopyRequest, json: bool, quiet: bool) -> Result<()> {
    let mode = request.mode;
    let source = request.source.clone();
    let destination = request.destination.clone();
    let quiet = quiet || json;

    if !quiet {
        display::display_operation_header(mode, &source, &destination);
    }

    let engine = CopyEngine::new(config)?;
    let (id, events) = engine.submit_with_events(request)?;
    debug!("Submitted operation {}", id);

    let display = ProgressDisplay::new(quiet);
    let progress = tokio::spawn(display.run(events));

    let canceller = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} Cancelling...", style("⚠").yellow().bold());
                let _ = engine.cancel(id);
            }
        })
    };
    let report: OperationReport = engine.wait(id).await?;
    canceller.abort();
    let _ = progress.await;

    if json {
        let output = json_output::OperationJson::new(mode, &source, &destination, &report);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        display::display_report(&report);
    }

    match report.error {
        Some(error) => bail!("{} failed: {}", mode, error),
        None => Ok(()),
    }
}

async fn device_command(config: &Config, path: PathBuf, json: bool) -> Result<()> {
    info!("Analyzing device for path: {}", path.display());
    let profiler = DeviceProfiler::with_cache_ttl(config.device.cache_ttl());
    let info = profiler.profile(&path).await?;

    if json {
        let output = json_output::DeviceInfoJson::from(&info);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        display::display_device_info(&path.display().to_string(), &info, &config.performance.tuning);
    }
    Ok(())
}

fn config_command(config: Config, default: bool, output: Option<PathBuf>) -> Result<()> {
    let config = if default { Config::default() } else { config };
    match output {
        Some(path) => {
            ConfigLoader::save_to_file(&config, &path)?;
            display::display_success(&format!("Configuration written to {}", path.display()));
        }
        None => print!("{}", ConfigLoader::render(&config, Some("yaml"))?),
    }
    Ok(())
}
