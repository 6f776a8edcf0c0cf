//! Equicast CLI: reference-list download, chunking, fetch and upload commands.
//!
//! Commands:
//! - `download`: pull a mode's reference files from object storage
//! - `split`: deduplicate a reference list and write chunk files
//! - `stock`: fetch per-ticker artifacts for a chunk file
//! - `fx <signal>`: fetch one FX signal for every pair in a chunk file
//! - `upload`: push matching artifacts to a bucket
//! - `cost`: estimate monthly storage cost of matching artifacts

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use equicast_core::extract::{CircuitBreaker, FxSignal, StockSignal, YahooExtractor};
use equicast_core::splitter::Splitter;
use equicast_core::storage::{LocalStore, ObjectStore, S3Store};
use equicast_runner::processor::ProcessSummary;
use equicast_runner::{
    cost, parse_mode, BarProgress, Downloader, FxProcessor, GithubReport, IngestConfig,
    StockProcessor, UploadMode, UploadRequest, Uploader,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "equicast",
    about = "Equicast: batch market-data ingestion for tickers and currency pairs"
)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a local directory (`<dir>/<bucket>/<key>`) instead of S3.
    #[arg(long, global = true)]
    local_store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the mode's reference files from its bucket.
    Download {
        /// stock or fx.
        #[arg(long)]
        mode: String,

        #[arg(long, default_value = "downloads")]
        download_dir: PathBuf,
    },
    /// Deduplicate a reference list and write it out as chunk files.
    Split {
        /// JSON array of tickers or currency pairs.
        #[arg(long)]
        file: PathBuf,

        /// Preferred number of identifiers per chunk.
        #[arg(long)]
        chunk_size: usize,

        /// stock or fx.
        #[arg(long)]
        mode: String,

        #[arg(long, default_value = "chunks")]
        output_dir: PathBuf,

        /// Upper bound on the number of chunks. Defaults to the config value.
        #[arg(long)]
        max_chunks: Option<usize>,
    },
    /// Fetch per-ticker artifacts for every ticker in a chunk file.
    Stock {
        #[arg(long)]
        ticker_file: PathBuf,

        /// Directory holding the optional `ticker_status.json`.
        #[arg(long, default_value = "downloads")]
        download_dir: PathBuf,

        #[arg(long, default_value = "stock_downloads")]
        output_dir: PathBuf,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long)]
        max_attempts: Option<u32>,

        /// Comma-separated: prices, dividends, company_profile, fundamentals.
        #[arg(long, value_delimiter = ',')]
        signals: Vec<StockSignal>,
    },
    /// Fetch one FX signal for every pair in a chunk file.
    Fx {
        /// prices, profile, fundamentals, calculations or forecast.
        signal: FxSignal,

        #[arg(long)]
        file: PathBuf,

        #[arg(long, default_value = "fx_downloads")]
        output_dir: PathBuf,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long)]
        max_attempts: Option<u32>,

        /// Fetch the full history instead of year-to-date.
        #[arg(long, default_value_t = false)]
        full_run: bool,
    },
    /// Upload files matching a pattern to a bucket.
    Upload {
        #[arg(long)]
        directory_path: PathBuf,

        #[arg(long)]
        file_pattern: String,

        #[arg(long)]
        custom_message: String,

        #[arg(long)]
        s3_bucket: String,

        /// generic, stock or fx.
        #[arg(long, default_value = "generic")]
        mode: String,

        #[arg(long, default_value = "")]
        s3_prefix: String,
    },
    /// Estimate the monthly storage cost of files matching a pattern.
    Cost {
        #[arg(long)]
        directory_path: PathBuf,

        #[arg(long)]
        file_pattern: String,

        #[arg(long, default_value = "Storage Cost Estimate")]
        custom_message: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download { mode, download_dir } => {
            let store = open_store(&config, cli.local_store.as_deref())?;
            run_download(store.as_ref(), &config, &mode, download_dir)
        }
        Commands::Split {
            file,
            chunk_size,
            mode,
            output_dir,
            max_chunks,
        } => run_split(&config, &file, chunk_size, &mode, output_dir, max_chunks),
        Commands::Stock {
            ticker_file,
            download_dir,
            output_dir,
            max_workers,
            max_attempts,
            signals,
        } => run_stock(
            &config,
            &ticker_file,
            &download_dir,
            output_dir,
            max_workers,
            max_attempts,
            signals,
        ),
        Commands::Fx {
            signal,
            file,
            output_dir,
            max_workers,
            max_attempts,
            full_run,
        } => run_fx(
            &config,
            signal,
            &file,
            output_dir,
            max_workers,
            max_attempts,
            full_run,
        ),
        Commands::Upload {
            directory_path,
            file_pattern,
            custom_message,
            s3_bucket,
            mode,
            s3_prefix,
        } => {
            let store = open_store(&config, cli.local_store.as_deref())?;
            let request = UploadRequest {
                directory: directory_path,
                pattern: file_pattern,
                message: custom_message,
                bucket: s3_bucket,
                mode: mode.parse::<UploadMode>()?,
                prefix: s3_prefix,
                fx_artifact_name: config.upload.fx_artifact_name.clone(),
            };
            run_upload(store.as_ref(), &request)
        }
        Commands::Cost {
            directory_path,
            file_pattern,
            custom_message,
        } => run_cost(directory_path, &file_pattern, &custom_message),
    }
}

fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    match path {
        Some(path) => IngestConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(IngestConfig::default()),
    }
}

fn open_store(config: &IngestConfig, local: Option<&Path>) -> Result<Box<dyn ObjectStore>> {
    Ok(match local {
        Some(root) => Box::new(LocalStore::new(root)),
        None => Box::new(S3Store::connect(&config.s3_settings())?),
    })
}

/// Step summary and output files from the Actions environment, when set.
fn github_report() -> GithubReport {
    GithubReport::new(
        std::env::var_os("GITHUB_STEP_SUMMARY").map(PathBuf::from),
        std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from),
    )
}

fn yahoo() -> Result<YahooExtractor> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(YahooExtractor::new(circuit_breaker)?)
}

fn run_download(
    store: &dyn ObjectStore,
    config: &IngestConfig,
    mode: &str,
    download_dir: PathBuf,
) -> Result<()> {
    let mode = parse_mode(mode)?;
    let report = Downloader::new(store, config, download_dir).download(mode)?;

    println!(
        "Downloaded {} file(s) from {} to {}",
        report.downloaded.len(),
        report.bucket,
        report.download_dir.display()
    );
    for key in &report.missing_optional {
        println!("  (optional, not found: {key})");
    }
    Ok(())
}

fn run_split(
    config: &IngestConfig,
    file: &Path,
    chunk_size: usize,
    mode: &str,
    output_dir: PathBuf,
    max_chunks: Option<usize>,
) -> Result<()> {
    let mode = parse_mode(mode)?;
    let output = Splitter::new(mode, output_dir, chunk_size)
        .with_max_chunks(max_chunks.unwrap_or(config.splitter.max_chunks))
        .split_file(file)?;

    if output.capped {
        println!(
            "Chunk size raised to {} to stay within the chunk limit",
            output.chunk_size
        );
    }
    println!(
        "Wrote {} chunk(s) of up to {} identifier(s) ({} unique) to {}",
        output.chunk_files.len(),
        output.chunk_size,
        output.unique_count,
        output.output_dir.display()
    );
    println!("Manifest: {}", output.manifest_path.display());
    Ok(())
}

fn run_stock(
    config: &IngestConfig,
    ticker_file: &Path,
    download_dir: &Path,
    output_dir: PathBuf,
    max_workers: Option<usize>,
    max_attempts: Option<u32>,
    signals: Vec<StockSignal>,
) -> Result<()> {
    let mut policy = config.stock_policy();
    if let Some(n) = max_workers {
        policy.max_workers = n;
    }
    if let Some(n) = max_attempts {
        policy.max_attempts = n;
    }

    let mut processor = StockProcessor::new(Arc::new(yahoo()?), policy, output_dir)
        .with_progress(Box::new(BarProgress::new("stock")));
    if !signals.is_empty() {
        processor = processor.with_signals(signals);
    }

    let status_file = download_dir.join("ticker_status.json");
    let summary = processor.run(ticker_file, Some(&status_file))?;
    if summary.filtered > 0 {
        println!("Skipped {} delisted ticker(s)", summary.filtered);
    }
    report_summary(&summary)
}

fn run_fx(
    config: &IngestConfig,
    signal: FxSignal,
    file: &Path,
    output_dir: PathBuf,
    max_workers: Option<usize>,
    max_attempts: Option<u32>,
    full_run: bool,
) -> Result<()> {
    let mut policy = config.fx_policy();
    if let Some(n) = max_workers {
        policy.max_workers = n;
    }
    if let Some(n) = max_attempts {
        policy.max_attempts = n;
    }

    let summary = FxProcessor::new(Arc::new(yahoo()?), policy, output_dir)
        .full_run(full_run)
        .with_progress(Box::new(BarProgress::new(signal.as_str())))
        .run(signal, file)?;
    report_summary(&summary)
}

/// Full success and partial success both exit zero; the latter names the log.
fn report_summary(summary: &ProcessSummary) -> Result<()> {
    println!(
        "Fetched {}/{} item(s) in {} attempt(s)",
        summary.succeeded, summary.total, summary.attempts
    );
    if let Some(log) = &summary.error_log {
        warn!(
            failed = summary.failed.len(),
            log = %log.display(),
            "partial success: some items failed after all attempts"
        );
        for (id, err) in summary.failed.iter().take(10) {
            eprintln!("  {id}: {err}");
        }
    }
    println!("Output: {}", summary.output_dir.display());
    Ok(())
}

fn run_upload(store: &dyn ObjectStore, request: &UploadRequest) -> Result<()> {
    let report = Uploader::new(store, github_report()).upload(request)?;

    println!(
        "Uploaded {} file(s) to {}",
        report.uploaded.len(),
        request.bucket
    );
    if !report.is_complete() {
        for (key, err) in &report.failed {
            eprintln!("  failed {key}: {err}");
        }
        bail!(
            "{} of {} upload(s) failed",
            report.failed.len(),
            report.failed.len() + report.uploaded.len()
        );
    }
    Ok(())
}

fn run_cost(directory: PathBuf, pattern: &str, message: &str) -> Result<()> {
    let estimate = cost::estimate(directory, pattern)?;
    cost::publish(&estimate, message, &github_report())?;

    println!(
        "{} file(s), {:.6} GB, estimated ${:.6}/month",
        estimate.files, estimate.total_gb, estimate.monthly_cost
    );
    if estimate.over_threshold {
        warn!(
            threshold_usd = cost::COST_THRESHOLD,
            "estimated cost exceeds threshold"
        );
    }
    Ok(())
}
