//! Report configuration, read from `soyc.toml`

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::writer::DEFAULT_FLUSH_THRESHOLD;

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "soyc.toml";

/// Where reports go and which of them are written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory the report files are created in
    pub output_dir: PathBuf,
    /// Permutation number appended to every report file name
    pub permutation_id: u32,
    /// Gzip the report documents (the manifest is always plain)
    pub compress: bool,
    /// Buffered bytes before a report is flushed to disk
    pub flush_threshold: usize,
    pub dependencies: bool,
    pub stories: bool,
    pub size_maps: bool,
    pub split_points: bool,
    pub members: bool,
    pub manifest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("soycReport"),
            permutation_id: 0,
            compress: true,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            dependencies: true,
            stories: true,
            size_maps: true,
            split_points: true,
            members: true,
            manifest: true,
        }
    }
}

impl Config {
    /// Parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load `soyc.toml` from `dir` if present, otherwise the defaults
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_threshold == 0 {
            bail!("flush_threshold must be at least 1 byte");
        }
        if self.output_dir.as_os_str().is_empty() {
            bail!("output_dir must not be empty");
        }
        Ok(())
    }
}
