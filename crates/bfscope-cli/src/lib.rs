//! CLI argument parsing and configuration loading for bfscope.

pub mod config;

pub use config::{AnalysisConfig, ConfigError, ConfigFile, Overrides};

use bfscope_contention::ReportKind;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "bfscope")]
#[command(about = "Measure how much a backfill tenant blocks other work on a MOAB cluster")]
pub struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// SQLite snapshot store
    #[arg(long, global = true)]
    pub db: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import showq/showbf XML captures into the store
    Ingest {
        /// Directory holding the capture files
        #[arg(long)]
        data_dir: Utf8PathBuf,
    },

    /// Compute contention statistics for a tenant over a time window
    Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Which statistics to compute
    #[arg(value_enum)]
    pub kind: ReportArg,

    /// Tenant account
    #[arg(long)]
    pub account: Option<String>,

    /// Tenant user
    #[arg(long)]
    pub user: Option<String>,

    /// Glob on job names restricting which tenant jobs count
    #[arg(long)]
    pub job_name: Option<String>,

    /// Window start, Unix seconds
    #[arg(long)]
    pub start: Option<i64>,

    /// Window end (exclusive), Unix seconds
    #[arg(long)]
    pub end: Option<i64>,

    /// Histogram bin count
    #[arg(long)]
    pub bins: Option<usize>,

    /// Only compare waits of jobs in this size bin (1 = largest)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub size_bin: Option<u8>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

impl ReportArgs {
    /// Flag values that take precedence over the configuration file.
    pub fn overrides(&self, db: Option<Utf8PathBuf>) -> Overrides {
        Overrides {
            store: db,
            account: self.account.clone(),
            user: self.user.clone(),
            job_name: self.job_name.clone(),
            start: self.start,
            end: self.end,
            histogram_bins: self.bins,
            size_bin: self.size_bin,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportArg {
    Blocking,
    Monthly,
    FirstBlock,
    Sizes,
    WaitTimes,
    Usage,
    CompletionCodes,
    All,
}

impl From<ReportArg> for ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Blocking => ReportKind::Blocking,
            ReportArg::Monthly => ReportKind::Monthly,
            ReportArg::FirstBlock => ReportKind::FirstBlock,
            ReportArg::Sizes => ReportKind::Sizes,
            ReportArg::WaitTimes => ReportKind::WaitTimes,
            ReportArg::Usage => ReportKind::Usage,
            ReportArg::CompletionCodes => ReportKind::CompletionCodes,
            ReportArg::All => ReportKind::All,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_command() {
        let args = Args::try_parse_from([
            "bfscope",
            "--db",
            "/data/moab.sqlite",
            "report",
            "first-block",
            "--account",
            "CSC108",
            "--user",
            "doleynik",
            "--start",
            "1514764800",
            "--end",
            "1546300800",
            "--format",
            "text",
        ])
        .unwrap();
        assert_eq!(args.db.as_deref().map(|p| p.as_str()), Some("/data/moab.sqlite"));
        let Command::Report(report) = args.command else {
            panic!("expected report command");
        };
        assert_eq!(ReportKind::from(report.kind), ReportKind::FirstBlock);
        assert_eq!(report.format, OutputFormat::Text);
        assert_eq!(report.start, Some(1_514_764_800));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["bfscope", "ingest", "--data-dir", "captures", "--verbose"])
                .unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Ingest { .. }));
    }

    #[test]
    fn test_size_bin_range() {
        let parse = |bin: &str| {
            Args::try_parse_from(["bfscope", "report", "wait-times", "--size-bin", bin])
        };
        assert!(parse("5").is_ok());
        assert!(parse("0").is_err());
        assert!(parse("6").is_err());
    }

    #[test]
    fn test_report_kind_names_match() {
        for arg in ReportArg::value_variants() {
            let name = arg.to_possible_value().unwrap();
            assert_eq!(name.get_name(), ReportKind::from(*arg).as_str());
        }
    }
}
