//! Dynamic dependency discovery through `ldd`.
//!
//! `ldd` already reports the transitive closure of a binary's shared objects, so a single
//! report per binary is enough. Each reported line is mapped to a path and resolved with
//! the [`FileLocator`]; lines that do not name a real file (`linux-vdso.so.1`,
//! `libfoo.so => not found`) are skipped.

use log::{debug, warn};

use crate::error::{Result, SliceError};
use crate::executors::ContainerExecutor;
use crate::locator::FileLocator;
use crate::models::FileDetails;

const ARROW: &str = "=>";

/// One line of a dynamic dependency report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedDependency {
    /// A path to look up in the container.
    Path(String),
    /// The linker could not find this library (`name => not found`).
    Missing(String),
}

/// Parses an `ldd` report.
///
/// The first line is skipped. For every other non-blank line the dependency is the third
/// token when the second one is `=>`, otherwise the first token.
///
/// # Errors
/// [`SliceError::MalformedDependencyReport`] when a line has an arrow but nothing after it.
pub fn parse_dependency_report(report: &str) -> Result<Vec<ReportedDependency>> {
    let mut dependencies = Vec::new();

    for line in report.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        if tokens.get(1) != Some(&ARROW) {
            dependencies.push(ReportedDependency::Path(first.to_string()));
            continue;
        }

        match (tokens.get(2), tokens.get(3)) {
            (None, _) => {
                return Err(SliceError::MalformedDependencyReport {
                    line: line.trim().to_string(),
                })
            }
            (Some(&"not"), Some(&"found")) => {
                dependencies.push(ReportedDependency::Missing(first.to_string()))
            }
            (Some(path), _) => dependencies.push(ReportedDependency::Path(path.to_string())),
        }
    }

    Ok(dependencies)
}

pub struct DependencyWalker<'a, E: ContainerExecutor> {
    executor: &'a E,
    container_id: &'a str,
    locator: &'a FileLocator<'a, E>,
}

impl<'a, E: ContainerExecutor> DependencyWalker<'a, E> {
    pub fn new(executor: &'a E, container_id: &'a str, locator: &'a FileLocator<'a, E>) -> Self {
        Self {
            executor,
            container_id,
            locator,
        }
    }

    /// Lists the resolved shared objects `binary` links against, in report order.
    ///
    /// # Errors
    /// - [`SliceError::DependencyQueryFailed`] when `ldd` exits non-zero (for instance on a
    ///   statically linked binary). Callers treat this as "no dependencies".
    /// - [`SliceError::MalformedDependencyReport`] when the report cannot be parsed.
    ///
    /// A dependency that fails to resolve is skipped, never fatal.
    pub fn list_dependencies(&self, binary: &str) -> Result<Vec<FileDetails>> {
        let command = vec!["ldd".to_string(), binary.to_string()];
        let report = self
            .executor
            .exec(self.container_id, &command)?
            .check(&command)
            .map_err(|e| SliceError::DependencyQueryFailed {
                binary: binary.to_string(),
                source: Box::new(e),
            })?;

        let mut dependencies = Vec::new();
        for reported in parse_dependency_report(&report.stdout)? {
            let path = match reported {
                ReportedDependency::Path(path) => path,
                ReportedDependency::Missing(name) => {
                    warn!("{} depends on {}, which the linker cannot find", binary, name);
                    continue;
                }
            };

            match self.locator.resolve(&path) {
                Ok(details) => dependencies.push(details),
                Err(e) if e.is_not_found() => {
                    debug!("Skipping dependency {} of {}: {}", path, binary, e);
                }
                Err(e) => {
                    warn!(
                        "Skipping dependency {} of {}, it could not be resolved: {}",
                        path, binary, e
                    );
                }
            }
        }

        debug!("{} has {} resolvable dependencies", binary, dependencies.len());
        Ok(dependencies)
    }
}
