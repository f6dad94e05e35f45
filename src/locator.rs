//! Locates files inside the container and resolves symbolic links.
//!
//! [`FileLocator::resolve`] lists a path with `ls -ld` to learn whether it exists and
//! whether it is a link. Links are resolved to a real, copyable path with one of two
//! [`SymlinkStrategy`] values:
//! - [`SymlinkStrategy::RealPath`] asks the container for `readlink -f` (authoritative).
//! - [`SymlinkStrategy::LegacySearch`] searches the filesystem for the link target's name
//!   and breaks ties by preferring library and binary directories.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};
use crate::executors::ContainerExecutor;
use crate::models::FileDetails;

/// Directories preferred, in order, when a legacy search finds several candidates.
pub const LEGACY_PREFERRED_PREFIXES: &[&str] = &["/lib/", "/usr/bin/", "/usr/sbin/", "/usr/lib/"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkStrategy {
    #[default]
    RealPath,
    LegacySearch,
}

pub struct FileLocator<'a, E: ContainerExecutor> {
    executor: &'a E,
    container_id: &'a str,
    strategy: SymlinkStrategy,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

impl<'a, E: ContainerExecutor> FileLocator<'a, E> {
    pub fn new(executor: &'a E, container_id: &'a str, strategy: SymlinkStrategy) -> Self {
        Self {
            executor,
            container_id,
            strategy,
        }
    }

    /// Resolves `path` into a [`FileDetails`] with its staging paths left unset.
    ///
    /// # Errors
    /// - [`SliceError::NotFound`] when the listing fails, i.e. the path does not exist.
    /// - [`SliceError::CommandFailed`] when the link resolution command fails.
    pub fn resolve(&self, path: &str) -> Result<FileDetails> {
        let listing = self
            .executor
            .exec(self.container_id, &argv(&["ls", "-ld", path]))?;
        if !listing.is_success() {
            trace!("ls -ld {} exited with {}", path, listing.exit_code);
            return Err(SliceError::NotFound {
                path: path.to_string(),
            });
        }

        let mut details = FileDetails::from_container_path(path);
        if !is_symlink_listing(&listing.stdout) {
            return Ok(details);
        }

        let target = match self.strategy {
            SymlinkStrategy::RealPath => self.real_path(path)?,
            SymlinkStrategy::LegacySearch => self.legacy_search(path, &listing.stdout)?,
        };
        debug!("{} is a symbolic link to {}", path, target);
        details.symlink_target = Some(target);

        Ok(details)
    }

    fn real_path(&self, path: &str) -> Result<String> {
        let command = argv(&["readlink", "-f", path]);
        let output = self
            .executor
            .exec(self.container_id, &command)?
            .check(&command)?;

        let target = output.stdout.trim();
        if target.is_empty() {
            return Err(SliceError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(target.to_string())
    }

    fn legacy_search(&self, path: &str, listing: &str) -> Result<String> {
        let link_name = link_target_name(listing).ok_or_else(|| SliceError::NotFound {
            path: path.to_string(),
        })?;

        let command = argv(&["find", "/", "-name", &link_name]);
        let output = self.executor.exec(self.container_id, &command)?;
        // find exits non-zero on unreadable directories such as /proc while still
        // reporting what it found elsewhere
        let candidates: Vec<&str> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        match candidates.as_slice() {
            [] if !output.is_success() => Err(SliceError::CommandFailed {
                command: command.join(" "),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            }),
            [] => Err(SliceError::NotFound {
                path: path.to_string(),
            }),
            [only] => Ok(only.to_string()),
            several => Ok(pick_legacy_candidate(several, &link_name)),
        }
    }
}

/// True when a long listing describes a symbolic link.
fn is_symlink_listing(listing: &str) -> bool {
    listing.trim_start().starts_with('l')
}

/// Base name of the target printed after `->` in a long listing.
fn link_target_name(listing: &str) -> Option<String> {
    let (_, target) = listing.trim().rsplit_once(" -> ")?;
    let name = target.trim().rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Picks among several same-named candidates: the first one under the highest priority
/// preferred directory, otherwise the name directly under `/`.
fn pick_legacy_candidate(candidates: &[&str], link_name: &str) -> String {
    LEGACY_PREFERRED_PREFIXES
        .iter()
        .find_map(|prefix| candidates.iter().find(|c| c.starts_with(prefix)))
        .map(|candidate| candidate.to_string())
        .unwrap_or_else(|| format!("/{}", link_name))
}
