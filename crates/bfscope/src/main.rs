//! bfscope - backfill contention analysis over MOAB/Torque queue captures.

mod output;

use bfscope_cli::{AnalysisConfig, Args, Command, ConfigFile, OutputFormat, ReportArgs};
use bfscope_contention::build_report;
use bfscope_ingest::import_capture_dir;
use bfscope_store::SnapshotStore;
use camino::Utf8Path;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::io::{self, Write};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let res = run(args);
    if let Err(err) = &res {
        error!("{err}");
    }
    res
}

/// Logs go to stderr so stdout carries only the report.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(args: Args) -> Result<()> {
    let file = ConfigFile::load_optional(args.config.as_deref()).into_diagnostic()?;

    match args.command {
        Command::Ingest { data_dir } => {
            let path = file.store(args.db.as_deref()).into_diagnostic()?;
            ingest(&path, &data_dir)
        }
        Command::Report(report) => {
            let config =
                AnalysisConfig::resolve(file, report.overrides(args.db.clone())).into_diagnostic()?;
            emit_report(&config, &report)
        }
    }
}

fn ingest(store_path: &Utf8Path, data_dir: &Utf8Path) -> Result<()> {
    let mut store = SnapshotStore::open(store_path).into_diagnostic()?;
    let summary = import_capture_dir(&mut store, data_dir).into_diagnostic()?;
    let samples = store.sample_count().into_diagnostic()?;
    info!(
        imported = summary.samples_imported,
        failed = summary.failed,
        total_samples = samples,
        store = %store_path,
        "Ingest finished"
    );
    Ok(())
}

fn emit_report(config: &AnalysisConfig, args: &ReportArgs) -> Result<()> {
    if !config.store.is_file() {
        miette::bail!("Snapshot store not found: {}", config.store);
    }
    let params = config.params().into_diagnostic()?;
    let store = SnapshotStore::open(&config.store).into_diagnostic()?;
    let report = build_report(&store, &params, args.kind.into()).into_diagnostic()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &report).into_diagnostic()?;
            writeln!(out).into_diagnostic()?;
        }
        OutputFormat::Text => output::write_text(&mut out, &report).into_diagnostic()?,
    }
    Ok(())
}
