//! Run configuration and staging layout.
//!
//! A [`BuildConfig`] describes one slicing run. It can be read from a JSON run manifest
//! and is completed or overridden from the command line. [`StagingLayout`] turns its
//! subfolder names into concrete local paths.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SliceError};
use crate::locator::SymlinkStrategy;
use crate::models::{ArtifactKind, ExposedPortDetails};

pub const DEFAULT_BASE_IMAGE: &str = "scratch";
pub const DEFAULT_OUTPUT_DIR: &str = "./copied_files";
pub const DEFAULT_BINARY_DIR: &str = "binaries";
pub const DEFAULT_CONFIG_DIR: &str = "config";

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_binary_dir() -> String {
    DEFAULT_BINARY_DIR.to_string()
}

fn default_config_dir() -> String {
    DEFAULT_CONFIG_DIR.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Running container to slice.
    #[serde(default)]
    pub container_id: String,
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// Staging root; the Dockerfile is written here too.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub binaries: Vec<String>,
    #[serde(default)]
    pub config_files: Vec<String>,
    /// `RUN` commands, kept in this order.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub exposed_ports: Vec<ExposedPortDetails>,
    #[serde(default)]
    pub entry_point: Option<String>,
    #[serde(default = "default_binary_dir")]
    pub binary_dir: String,
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default)]
    pub symlink_strategy: SymlinkStrategy,
    /// Deadline for each container command, in seconds.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            container_id: String::new(),
            base_image: default_base_image(),
            output_dir: default_output_dir(),
            binaries: Vec::new(),
            config_files: Vec::new(),
            commands: Vec::new(),
            exposed_ports: Vec::new(),
            entry_point: None,
            binary_dir: default_binary_dir(),
            config_dir: default_config_dir(),
            symlink_strategy: SymlinkStrategy::default(),
            command_timeout_secs: None,
        }
    }
}

impl BuildConfig {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            ..Self::default()
        }
    }

    /// Reads a JSON run manifest.
    pub fn from_manifest<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SliceError::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| SliceError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.container_id.trim().is_empty() {
            return Err(SliceError::config("a container id is required"));
        }
        if self.base_image.trim().is_empty() {
            return Err(SliceError::config("the base image must not be empty"));
        }

        validate_subfolder("binary_dir", &self.binary_dir)?;
        validate_subfolder("config_dir", &self.config_dir)?;
        if self.binary_dir == self.config_dir {
            return Err(SliceError::config(format!(
                "binary_dir and config_dir must differ, both are {:?}",
                self.binary_dir
            )));
        }

        if self.command_timeout_secs == Some(0) {
            return Err(SliceError::config("command_timeout_secs must be positive"));
        }

        Ok(())
    }

    pub fn staging_layout(&self) -> StagingLayout {
        StagingLayout::new(&self.output_dir, &self.binary_dir, &self.config_dir)
    }
}

/// Subfolders must stay inside the staging root.
fn validate_subfolder(field: &str, value: &str) -> Result<()> {
    let path = Path::new(value);
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return Err(SliceError::config(format!("{} must not be empty", field)));
    }
    if components.any(|c| !matches!(c, Component::Normal(_))) {
        return Err(SliceError::config(format!(
            "{} must be a relative path without `..`, got {:?}",
            field, value
        )));
    }
    Ok(())
}

/// Where copied files are staged on the host.
///
/// Binaries and shared libraries go to `<root>/<binary_dir>`, config files to
/// `<root>/<config_dir>`. The Dockerfile is written to `<root>` and refers to staged files
/// relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    root: PathBuf,
    binary_dir: String,
    config_dir: String,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>, binary_dir: &str, config_dir: &str) -> Self {
        Self {
            root: root.into(),
            binary_dir: binary_dir.to_string(),
            config_dir: config_dir.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subfolder(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Binary => &self.binary_dir,
            ArtifactKind::Config => &self.config_dir,
        }
    }

    pub fn directory(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(self.subfolder(kind))
    }

    /// Creates the root and both subfolders.
    pub fn prepare(&self) -> Result<()> {
        for kind in [ArtifactKind::Binary, ArtifactKind::Config] {
            let directory = self.directory(kind);
            fs::create_dir_all(&directory).map_err(|e| SliceError::io(&directory, e))?;
        }
        Ok(())
    }

    /// `(staged_path, staged_path_relative)` for `relative` under the `kind` subfolder.
    pub fn staged_paths(&self, kind: ArtifactKind, relative: &Path) -> (PathBuf, PathBuf) {
        let staged_path = self.directory(kind).join(relative);
        let staged_path_relative = Path::new(".").join(self.subfolder(kind)).join(relative);
        (staged_path, staged_path_relative)
    }
}
