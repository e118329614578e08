use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{LevelFilter, error, info};
use soyc::{
    Config, run_manifest, run_report_pipeline,
    recorders::ManifestEntry,
    snapshot::Snapshot,
    writer::ReportKind,
};

/// Write Story Of Your Compile reports from compile snapshots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Compile snapshots (JSON), one per permutation
    #[arg(required = true, value_name = "SNAPSHOT")]
    snapshots: Vec<PathBuf>,

    /// Configuration file; defaults to soyc.toml in the working directory
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to write reports to
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Write plain XML instead of gzip files
    #[arg(long)]
    no_compress: bool,

    /// Bytes buffered before a report is flushed
    #[arg(long, value_name = "BYTES")]
    flush_threshold: Option<usize>,

    /// Increase logging verbosity (can be used multiple times)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .format_target(false)
        .filter_level(level)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from_dir(
            &std::env::current_dir().context("Failed to determine the working directory")?,
        )?,
    };
    if let Some(out) = &cli.out {
        config.output_dir.clone_from(out);
    }
    if cli.no_compress {
        config.compress = false;
    }
    if let Some(threshold) = cli.flush_threshold {
        config.flush_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<bool> {
    let base = load_config(cli)?;
    let mut complete = true;
    let mut manifest = Vec::new();

    for (permutation_id, path) in (0u32..).zip(&cli.snapshots) {
        let snapshot = Snapshot::load(path)?;
        info!("Loaded {} as permutation {permutation_id}", path.display());

        let config = Config {
            permutation_id: base.permutation_id + permutation_id,
            ..base.clone()
        };
        let outcome = run_report_pipeline(&snapshot.program, &snapshot.compile, &config);
        complete &= outcome.is_complete();

        manifest.push(ManifestEntry {
            href: ReportKind::SizeMaps.file_name(config.permutation_id, config.compress),
            permutations: snapshot.permutations,
        });
    }

    complete &= run_manifest(&base, &manifest).is_complete();
    Ok(complete)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(complete) => {
            if !complete {
                // Report failures are already logged and never fail the build
                info!("Some reports could not be written");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
