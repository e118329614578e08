//! Report files on disk

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use flate2::{Compression, write::GzEncoder};
use log::debug;

use super::FlushingWriter;

/// The documents a reporting run can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Dependencies,
    Stories,
    SizeMaps,
    SplitPoints,
    Members,
    Manifest,
}

impl ReportKind {
    /// File name prefix the dashboard expects
    fn stem(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::Stories => "detailedStories",
            Self::SizeMaps => "stories",
            Self::SplitPoints => "splitPoints",
            Self::Members => "members",
            Self::Manifest => "manifest",
        }
    }

    /// Name of the report file for one permutation
    ///
    /// The manifest covers every permutation and is never compressed.
    pub fn file_name(self, permutation_id: u32, compress: bool) -> String {
        match self {
            Self::Manifest => "manifest.xml".to_owned(),
            _ if compress => format!("{}{permutation_id}.xml.gz", self.stem()),
            _ => format!("{}{permutation_id}.xml", self.stem()),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dependencies => "dependencies",
            Self::Stories => "stories",
            Self::SizeMaps => "size maps",
            Self::SplitPoints => "split points",
            Self::Members => "members",
            Self::Manifest => "manifest",
        };
        f.write_str(name)
    }
}

/// File a report is streamed into, optionally gzip compressed
pub enum ReportSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ReportSink {
    /// Write the gzip trailer if any and flush everything to disk
    pub fn close(self) -> io::Result<()> {
        let mut file = match self {
            Self::Plain(file) => file,
            Self::Gzip(encoder) => encoder.finish()?,
        };
        file.flush()
    }
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("ReportSink::Plain"),
            Self::Gzip(_) => f.write_str("ReportSink::Gzip"),
        }
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file) => file.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Create the report file for `kind` under `dir` and wrap it for streaming
pub fn open_report(
    dir: &Path,
    kind: ReportKind,
    permutation_id: u32,
    compress: bool,
    flush_threshold: usize,
) -> Result<(PathBuf, FlushingWriter<ReportSink>)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let compress = compress && kind != ReportKind::Manifest;
    let path = dir.join(kind.file_name(permutation_id, compress));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create {} report {}", kind, path.display()))?;
    let file = BufWriter::new(file);

    debug!("Opened {} report at {}", kind, path.display());
    let sink = if compress {
        ReportSink::Gzip(GzEncoder::new(file, Compression::default()))
    } else {
        ReportSink::Plain(file)
    };
    Ok((path, FlushingWriter::with_threshold(sink, flush_threshold)))
}
