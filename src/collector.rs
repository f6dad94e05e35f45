//! Resolves requested binaries and config files into a deduplicated set of copied files.
//!
//! For every binary the collector first walks its shared-library dependencies and copies
//! each one, then copies the binary itself, so dependencies always precede their
//! dependents in the Dockerfile. Config files are copied directly.
//!
//! The collector keeps no file state of its own: the [`Dockerfile`] it borrows is the set
//! of already-copied artifacts. The check, the copy and the registration happen under one
//! `&mut` borrow, so an artifact is never copied twice within a run.
//!
//! Failure policy:
//! - a requested path that does not exist, or a copy that fails, aborts the run;
//! - a dependency that cannot be resolved is skipped;
//! - a binary `ldd` cannot inspect (statically linked) simply has no dependencies.

use log::{debug, info, trace};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StagingLayout;
use crate::dependencies::DependencyWalker;
use crate::dockerfile::Dockerfile;
use crate::error::{Result, SliceError};
use crate::executors::ContainerExecutor;
use crate::locator::{FileLocator, SymlinkStrategy};
use crate::models::{ArtifactKind, FileDetails};

/// Staging subdirectory for artifacts whose base name is already taken.
const BY_PATH_DIR: &str = ".by-path";

pub struct ArtifactCollector<'a, E: ContainerExecutor> {
    executor: &'a E,
    container_id: &'a str,
    locator: FileLocator<'a, E>,
    staging: &'a StagingLayout,
    dockerfile: &'a mut Dockerfile,
}

impl<'a, E: ContainerExecutor> ArtifactCollector<'a, E> {
    pub fn new(
        executor: &'a E,
        container_id: &'a str,
        symlink_strategy: SymlinkStrategy,
        staging: &'a StagingLayout,
        dockerfile: &'a mut Dockerfile,
    ) -> Self {
        Self {
            executor,
            container_id,
            locator: FileLocator::new(executor, container_id, symlink_strategy),
            staging,
            dockerfile,
        }
    }

    /// Collects each binary with its dependencies, in input order.
    ///
    /// Returns the number of files newly copied.
    pub fn collect_binaries(&mut self, paths: &[String]) -> Result<usize> {
        let mut copied = 0;
        for path in paths {
            copied += self.collect_binary(path)?;
        }
        Ok(copied)
    }

    /// Collects each config file, in input order.
    ///
    /// Returns the number of files newly copied.
    pub fn collect_config_files(&mut self, paths: &[String]) -> Result<usize> {
        let mut copied = 0;
        for path in paths {
            copied += self.collect_config_file(path)?;
        }
        Ok(copied)
    }

    /// Collects the shared libraries of `path`, then `path` itself.
    ///
    /// # Errors
    /// [`SliceError::NotFound`] when `path` does not exist in the container, and any copy
    /// failure as [`SliceError::CommandFailed`].
    pub fn collect_binary(&mut self, path: &str) -> Result<usize> {
        // Resolve the requested binary up front so a typo fails before anything is copied
        let binary = self.locator.resolve(path)?;

        let dependencies = {
            let walker = DependencyWalker::new(self.executor, self.container_id, &self.locator);
            match walker.list_dependencies(path) {
                Ok(dependencies) => dependencies,
                Err(SliceError::DependencyQueryFailed { source, .. }) => {
                    info!("No dynamic dependencies for {}: {}", path, source);
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        };

        let mut copied = 0;
        for dependency in dependencies {
            if self.collect_resolved(dependency, ArtifactKind::Binary)? {
                copied += 1;
            }
        }
        if self.collect_resolved(binary, ArtifactKind::Binary)? {
            copied += 1;
        }

        debug!("Collected {} new files for {}", copied, path);
        Ok(copied)
    }

    /// Collects a single config file; no dependency walk.
    pub fn collect_config_file(&mut self, path: &str) -> Result<usize> {
        let details = self.locator.resolve(path)?;
        Ok(usize::from(self.collect_resolved(details, ArtifactKind::Config)?))
    }

    /// Stages and copies an already resolved file unless it was collected before.
    ///
    /// Returns whether a copy happened.
    fn collect_resolved(&mut self, mut details: FileDetails, kind: ArtifactKind) -> Result<bool> {
        if self.dockerfile.file_exists(&details) {
            trace!("{} already collected", details.container_path());
            return Ok(false);
        }

        let (staged_path, staged_path_relative) = self.staged_paths(&details, kind)?;
        let source = details.copy_source();
        debug!("Copying {} {} to {}", kind, source, staged_path.display());

        let command = vec![
            "cp".to_string(),
            format!("{}:{}", self.container_id, source),
            staged_path.to_string_lossy().to_string(),
        ];
        self.executor
            .copy_out(self.container_id, &source, &staged_path)?
            .check(&command)?;

        details.staged_path = Some(staged_path);
        details.staged_path_relative = Some(staged_path_relative);
        self.dockerfile.add_file(details);
        Ok(true)
    }

    /// Stages under `<subfolder>/<filename>`, or under
    /// `<subfolder>/.by-path/<directory>/<filename>` when another artifact with the same
    /// base name already took the short path. Short paths never contain a `/`, so the
    /// two namespaces cannot overlap.
    fn staged_paths(&self, details: &FileDetails, kind: ArtifactKind) -> Result<(PathBuf, PathBuf)> {
        let short = self.staging.staged_paths(kind, Path::new(&details.filename));
        if !self.dockerfile.staged_path_taken(&short.0) {
            return Ok(short);
        }

        let relative = Path::new(BY_PATH_DIR)
            .join(details.directory.trim_start_matches('/'))
            .join(&details.filename);
        let (staged_path, staged_path_relative) = self.staging.staged_paths(kind, &relative);
        debug!(
            "{} clashes with an already staged {}, staging it as {}",
            details.container_path(),
            details.filename,
            staged_path_relative.display()
        );

        if let Some(parent) = staged_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SliceError::io(parent, e))?;
        }
        Ok((staged_path, staged_path_relative))
    }
}
