//! Report pipeline runner
//!
//! Writes every enabled document for one permutation. Documents fail
//! independently: an error is logged and recorded in the outcome, and the
//! remaining documents are still written.

use std::path::PathBuf;

use anyhow::{Error, Result};
use log::{debug, error, info};

use crate::{
    compile_output::CompileOutput,
    config::Config,
    members::MemberFactory,
    program::Program,
    recorders::{
        ManifestEntry, record_dependencies, record_size_maps, record_stories, write_manifest,
        write_members, write_split_points,
    },
    writer::{FlushingWriter, ReportKind, ReportSink, open_report},
};

/// What a pipeline run produced
#[derive(Debug, Default)]
pub struct ReportOutcome {
    /// Report files written completely, in the order they were written
    pub written: Vec<PathBuf>,
    /// Documents that could not be written, with the reason
    pub failed: Vec<(ReportKind, Error)>,
}

impl ReportOutcome {
    /// Whether every enabled document was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn absorb(&mut self, kind: ReportKind, result: Result<PathBuf>) {
        match result {
            Ok(path) => {
                info!("Wrote {} report to {}", kind, path.display());
                self.written.push(path);
            }
            Err(err) => {
                error!("Failed to write the {kind} report: {err:#}");
                self.failed.push((kind, err));
            }
        }
    }
}

/// Open the report file for `kind`, stream it with `write` and close it
fn write_report<F>(config: &Config, kind: ReportKind, write: F) -> Result<PathBuf>
where
    F: FnOnce(FlushingWriter<ReportSink>) -> Result<ReportSink>,
{
    let (path, out) = open_report(
        &config.output_dir,
        kind,
        config.permutation_id,
        config.compress,
        config.flush_threshold,
    )?;
    write(out)?.close()?;
    Ok(path)
}

/// Run every enabled report writer for one permutation
///
/// Stages run in order: dependencies, stories, size maps, split points and
/// members. All stages share one [`MemberFactory`]; the members document
/// comes last so it lists everything the earlier stages canonicalized.
pub fn run_report_pipeline(
    program: &Program,
    compile: &CompileOutput,
    config: &Config,
) -> ReportOutcome {
    info!(
        "Writing reports for permutation {} to {}",
        config.permutation_id,
        config.output_dir.display()
    );
    let mut outcome = ReportOutcome::default();
    let factory = MemberFactory::new(program);

    if config.dependencies {
        debug!("Stage 1: dependencies");
        let result = write_report(config, ReportKind::Dependencies, |out| {
            record_dependencies(&factory, out)
        });
        outcome.absorb(ReportKind::Dependencies, result);
    }

    if config.stories {
        debug!("Stage 2: stories");
        let result = write_report(config, ReportKind::Stories, |out| {
            record_stories(&factory, compile, out)
        });
        outcome.absorb(ReportKind::Stories, result);
    }

    if config.size_maps {
        debug!("Stage 3: size maps");
        let result = write_report(config, ReportKind::SizeMaps, |out| {
            record_size_maps(program, compile, out)
        });
        outcome.absorb(ReportKind::SizeMaps, result);
    }

    if config.split_points {
        debug!("Stage 4: split points");
        let result = write_report(config, ReportKind::SplitPoints, |out| {
            write_split_points(program, out)
        });
        outcome.absorb(ReportKind::SplitPoints, result);
    }

    if config.members {
        debug!("Stage 5: members");
        let result = write_report(config, ReportKind::Members, |out| {
            write_members(&factory, out)
        });
        outcome.absorb(ReportKind::Members, result);
    }

    debug!(
        "Canonicalized {} classes, {} methods and {} fields",
        factory.class_count(),
        factory.method_count(),
        factory.field_count()
    );
    info!(
        "Permutation {}: {} reports written, {} failed",
        config.permutation_id,
        outcome.written.len(),
        outcome.failed.len()
    );
    outcome
}

/// Write `manifest.xml` listing the reports of every permutation
pub fn run_manifest(config: &Config, entries: &[ManifestEntry]) -> ReportOutcome {
    let mut outcome = ReportOutcome::default();
    if config.manifest {
        let result = write_report(config, ReportKind::Manifest, |out| {
            write_manifest(entries, out)
        });
        outcome.absorb(ReportKind::Manifest, result);
    }
    outcome
}
