use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::CommandOutput;

/// Runs commands against a specific running container.
///
/// Implementations never turn a non-zero exit into an error: they return it in
/// [`CommandOutput`] and the engine decides what a failure means at each call site.
/// An `Err` is reserved for not being able to run the command at all.
pub trait ContainerExecutor {
    /// Returns the name of the backend for logging purposes
    fn name(&self) -> &str;

    /// Runs `argv` inside the container.
    fn exec(&self, container_id: &str, argv: &[String]) -> Result<CommandOutput>;

    /// Copies `source` from the container filesystem to `destination` on the host.
    fn copy_out(&self, container_id: &str, source: &str, destination: &Path)
        -> Result<CommandOutput>;
}

impl<E: ContainerExecutor + ?Sized> ContainerExecutor for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn exec(&self, container_id: &str, argv: &[String]) -> Result<CommandOutput> {
        (**self).exec(container_id, argv)
    }

    fn copy_out(
        &self,
        container_id: &str,
        source: &str,
        destination: &Path,
    ) -> Result<CommandOutput> {
        (**self).copy_out(container_id, source, destination)
    }
}

impl<E: ContainerExecutor + ?Sized> ContainerExecutor for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn exec(&self, container_id: &str, argv: &[String]) -> Result<CommandOutput> {
        (**self).exec(container_id, argv)
    }

    fn copy_out(
        &self,
        container_id: &str,
        source: &str,
        destination: &Path,
    ) -> Result<CommandOutput> {
        (**self).copy_out(container_id, source, destination)
    }
}

/// A command as it was handed to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedCommand {
    Exec {
        container_id: String,
        argv: Vec<String>,
    },
    Copy {
        container_id: String,
        source: String,
        destination: PathBuf,
    },
}

impl IssuedCommand {
    /// Human readable form used in error messages, e.g. `exec b915 ls -ld /bin/sh`.
    pub fn describe(&self) -> String {
        match self {
            IssuedCommand::Exec { container_id, argv } => {
                format!("exec {} {}", container_id, argv.join(" "))
            }
            IssuedCommand::Copy {
                container_id,
                source,
                destination,
            } => format!("cp {}:{} {}", container_id, source, destination.display()),
        }
    }
}
