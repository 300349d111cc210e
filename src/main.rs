//! batchwipe - batch multi-pass data erasure
//!
//! Queues wipe jobs from a manifest or the command line, runs them as one
//! batch and manages the resulting wipe records and certificates.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use batchwipe::config::DEFAULT_LOG_FILTER;
use batchwipe::{AssetType, BatchSummary, JobRequest, WipeConfig, WipeEvent, WipeService, WipeStandard};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// batchwipe - batch multi-pass data erasure
#[derive(Parser, Debug)]
#[command(name = "batchwipe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the wipe record store [env: BATCHWIPE_STORE]
    #[arg(long)]
    store: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or a full directive) [env: BATCHWIPE_LOG]
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue jobs and wipe them as one batch
    Wipe(WipeArgs),

    /// Inspect and manage wipe records
    #[command(subcommand)]
    Records(RecordsCommands),

    /// Print or save the certificate of a wiped asset
    Certificate {
        /// Asset id of the record
        asset_id: String,

        /// Directory to save `<certificate_id>.txt` into instead of printing
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the supported wipe standards
    Standards,
}

#[derive(clap::Args, Debug)]
struct WipeArgs {
    /// JSON array of jobs (`asset_id`, `type`, `serial`, `owner`, `path`, `standard`)
    #[arg(long)]
    manifest: Option<PathBuf>,

    #[arg(long)]
    asset_id: Option<String>,

    /// Laptop, Desktop, SSD, HDD, "USB Drive" or Server
    #[arg(long = "asset-type")]
    asset_type: Option<AssetType>,

    #[arg(long)]
    serial: Option<String>,

    #[arg(long)]
    owner: Option<String>,

    /// File or directory to wipe
    #[arg(long)]
    path: Option<String>,

    /// dod, nist, random7 or quick
    #[arg(long)]
    standard: Option<WipeStandard>,
}

#[derive(Subcommand, Debug)]
enum RecordsCommands {
    /// List all wipe records
    #[command(alias = "ls")]
    List,

    /// Delete every record with the given asset id
    Delete {
        asset_id: String,
    },

    /// Write all records to a JSON file
    Export {
        destination: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = WipeConfig::from_env().context("invalid configuration")?;
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }
    if let Some(filter) = cli.log_level {
        config = config.with_log_filter(filter);
    }

    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let service = WipeService::new(&config);

    match cli.command {
        Commands::Wipe(args) => run_wipe(&service, args),
        Commands::Records(cmd) => {
            run_records(&service, cmd)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Certificate { asset_id, out } => {
            match out {
                Some(dir) => {
                    let path = service.write_certificate(&asset_id, &dir)?;
                    println!("Certificate saved to {}", path.display());
                }
                None => print!("{}", service.format_certificate(&asset_id)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Standards => {
            for standard in WipeStandard::ALL {
                println!(
                    "{:<8} {:<14} {} pass(es)  {}",
                    standard.slug(),
                    standard.name(),
                    standard.passes(),
                    standard.description()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_wipe(service: &WipeService, args: WipeArgs) -> Result<ExitCode> {
    let mut requests = Vec::new();

    if let Some(manifest) = &args.manifest {
        let raw = fs::read_to_string(manifest)
            .with_context(|| format!("failed to read manifest {}", manifest.display()))?;
        let jobs: Vec<JobRequest> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", manifest.display()))?;
        requests.extend(jobs);
    }

    if let Some(asset_id) = args.asset_id {
        let Some(asset_type) = args.asset_type else {
            bail!("--asset-type is required with --asset-id");
        };
        let Some(standard) = args.standard else {
            bail!("--standard is required with --asset-id");
        };
        requests.push(JobRequest {
            asset_id,
            asset_type,
            serial: args.serial.unwrap_or_default(),
            owner: args.owner,
            target_path: args.path.unwrap_or_default(),
            standard,
        });
    }

    if requests.is_empty() {
        bail!("nothing to wipe: pass --manifest or --asset-id");
    }

    let mut rejected = 0usize;
    for request in requests {
        let asset_id = request.asset_id.clone();
        match service.enqueue(request) {
            Ok(job) => println!("Queued {}", job.summary()),
            Err(err) => {
                rejected += 1;
                eprintln!("Rejected {asset_id}: {err}");
            }
        }
    }

    if service.list_pending().is_empty() {
        bail!("no job was accepted");
    }

    let handle = service.run_batch()?;
    for event in handle.events().iter() {
        print_event(&event);
    }
    let summary = handle.join()?;

    if summary.has_failures() || rejected > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_event(event: &WipeEvent) {
    match event {
        WipeEvent::JobStarted { asset_id, index, total } => {
            println!("[{}/{}] Wiping {asset_id}", index + 1, total);
        }
        WipeEvent::JobProgress(progress) => {
            println!("  {:>5.1}%  {}", progress.percent, progress.status);
        }
        WipeEvent::FileFailed { path, reason, .. } => {
            eprintln!("  warning: {path}: {reason}");
        }
        WipeEvent::JobCompleted { asset_id, certificate_id } => {
            println!("  {asset_id} completed, certificate {certificate_id}");
        }
        WipeEvent::JobFailed(failed) => {
            eprintln!("  {} FAILED: {}", failed.asset_id, failed.reason);
        }
        WipeEvent::PersistFailed { asset_id, reason } => {
            warn!(asset_id = %asset_id, "record not saved: {reason}");
        }
        WipeEvent::BatchProgress { .. } => {}
        WipeEvent::BatchCompleted(summary) => print_summary(summary),
    }
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!(
        "Batch finished: {} of {} completed, {} failed",
        summary.completed, summary.total, summary.failed_count
    );
    for failed in &summary.failed {
        println!("  - {}: {}", failed.asset_id, failed.reason);
    }
    let unlisted = summary.failed_count.saturating_sub(summary.failed.len());
    if unlisted > 0 {
        println!("  ... and {unlisted} more");
    }
}

fn run_records(service: &WipeService, cmd: RecordsCommands) -> Result<()> {
    match cmd {
        RecordsCommands::List => {
            let records = service.list_records();
            if records.is_empty() {
                println!("No wipe records.");
                return Ok(());
            }
            println!(
                "{:<16} {:<10} {:<16} {:<14} {:<10} {:<25} CERTIFICATE",
                "ASSET ID", "TYPE", "SERIAL", "STANDARD", "STATUS", "FINISHED"
            );
            for record in records {
                println!(
                    "{:<16} {:<10} {:<16} {:<14} {:<10} {:<25} {}",
                    record.asset_id,
                    record.asset_type.name(),
                    record.serial,
                    record.standard.name(),
                    record.status.label(),
                    record.end_time.format("%Y-%m-%d %H:%M:%S UTC"),
                    record.certificate_id
                );
            }
        }
        RecordsCommands::Delete { asset_id } => {
            let removed = service.delete_record(&asset_id)?;
            println!("Deleted {removed} record(s) for {asset_id}");
        }
        RecordsCommands::Export { destination } => {
            let count = service.export_records(&destination)?;
            println!("Exported {count} record(s) to {}", destination.display());
        }
    }
    Ok(())
}
