//! Replays recorded container responses.
//!
//! [`ScriptedExecutor`] answers `exec` calls from a table keyed by argv and simulates
//! `cp` by writing the copied path into the destination file. Every call is recorded,
//! so a run can be replayed deterministically and inspected afterwards.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{ContainerExecutor, IssuedCommand};
use crate::error::{Result, SliceError};
use crate::models::CommandOutput;

/// Exit code used for an `exec` that has no recorded response, as a shell would for an
/// unknown command or missing file.
pub const UNSCRIPTED_EXIT_CODE: i32 = 2;

#[derive(Default)]
pub struct ScriptedExecutor {
    responses: HashMap<Vec<String>, CommandOutput>,
    failing_copies: HashSet<String>,
    issued: Mutex<Vec<IssuedCommand>>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the response returned for `command`.
    pub fn with_response(mut self, command: &[&str], output: CommandOutput) -> Self {
        self.responses.insert(argv(command), output);
        self
    }

    /// A regular file at `path`.
    pub fn with_file(self, path: &str) -> Self {
        let listing = format!("-rwxr-xr-x 1 root root 1024 Jan  1 00:00 {}\n", path);
        self.with_response(&["ls", "-ld", path], CommandOutput::success(listing))
    }

    /// A symbolic link at `path` whose fully resolved real path is `target`.
    pub fn with_symlink(self, path: &str, target: &str) -> Self {
        let link_name = target.rsplit('/').next().unwrap_or(target);
        let listing = format!(
            "lrwxrwxrwx 1 root root 12 Jan  1 00:00 {} -> {}\n",
            path, link_name
        );
        self.with_response(&["ls", "-ld", path], CommandOutput::success(listing))
            .with_response(
                &["readlink", "-f", path],
                CommandOutput::success(format!("{}\n", target)),
            )
    }

    /// The `ldd` report for `binary`.
    pub fn with_ldd(self, binary: &str, report: &str) -> Self {
        self.with_response(&["ldd", binary], CommandOutput::success(report))
    }

    /// Makes `ldd` fail for `binary`, as it does for statically linked executables.
    pub fn with_static_binary(self, binary: &str) -> Self {
        self.with_response(
            &["ldd", binary],
            CommandOutput::failure(1, "\tnot a dynamic executable\n"),
        )
    }

    /// Makes any copy whose source is `source` exit non-zero.
    pub fn with_failing_copy(mut self, source: &str) -> Self {
        self.failing_copies.insert(source.to_string());
        self
    }

    fn log(&self) -> MutexGuard<'_, Vec<IssuedCommand>> {
        self.issued.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every command issued so far, in order.
    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.log().clone()
    }

    /// `(source, destination)` of every copy issued so far, in order.
    pub fn copies(&self) -> Vec<(String, String)> {
        self.log()
            .iter()
            .filter_map(|command| match command {
                IssuedCommand::Copy {
                    source,
                    destination,
                    ..
                } => Some((source.clone(), destination.to_string_lossy().to_string())),
                IssuedCommand::Exec { .. } => None,
            })
            .collect()
    }
}

impl ContainerExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn exec(&self, container_id: &str, argv: &[String]) -> Result<CommandOutput> {
        self.log().push(IssuedCommand::Exec {
            container_id: container_id.to_string(),
            argv: argv.to_vec(),
        });

        Ok(self.responses.get(argv).cloned().unwrap_or_else(|| {
            CommandOutput::failure(
                UNSCRIPTED_EXIT_CODE,
                format!("{}: no such file or directory", argv.join(" ")),
            )
        }))
    }

    fn copy_out(
        &self,
        container_id: &str,
        source: &str,
        destination: &Path,
    ) -> Result<CommandOutput> {
        self.log().push(IssuedCommand::Copy {
            container_id: container_id.to_string(),
            source: source.to_string(),
            destination: destination.to_path_buf(),
        });

        if self.failing_copies.contains(source) {
            return Ok(CommandOutput::failure(
                1,
                format!("Could not find the file {} in container {}", source, container_id),
            ));
        }

        fs::write(destination, format!("{}\n", source))
            .map_err(|e| SliceError::io(destination, e))?;
        Ok(CommandOutput::success(""))
    }
}
