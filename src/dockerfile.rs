//! Accumulates the slice and serializes it as a Dockerfile.
//!
//! [`Dockerfile`] is append-only: files, `RUN` commands and exposed ports keep the order
//! they were added in. Its file list doubles as the set of already-copied artifacts,
//! queried with [`Dockerfile::file_exists`] before every copy.
//!
//! Rendering is pure: [`Dockerfile::render`] called twice without a mutation in between
//! returns the same bytes.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Result, SliceError};
use crate::models::{ExposedPortDetails, FileDetails};

pub const DOCKERFILE_NAME: &str = "Dockerfile";

#[derive(Debug, Clone, PartialEq)]
pub struct Dockerfile {
    base_image: String,
    commands: Vec<String>,
    exposed_ports: Vec<ExposedPortDetails>,
    files: Vec<FileDetails>,
}

impl Dockerfile {
    pub fn new(base_image: impl Into<String>) -> Self {
        Self {
            base_image: base_image.into(),
            commands: Vec::new(),
            exposed_ports: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn add_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    pub fn add_exposed_port(&mut self, port: ExposedPortDetails) {
        self.exposed_ports.push(port);
    }

    pub fn add_exposed_ports(&mut self, ports: impl IntoIterator<Item = ExposedPortDetails>) {
        self.exposed_ports.extend(ports);
    }

    pub fn add_file(&mut self, file: FileDetails) {
        self.files.push(file);
    }

    pub fn add_files(&mut self, files: impl IntoIterator<Item = FileDetails>) {
        self.files.extend(files);
    }

    /// True when a file with the same filename and directory was already added.
    pub fn file_exists(&self, candidate: &FileDetails) -> bool {
        self.files.iter().any(|file| file == candidate)
    }

    /// True when some added file is already staged at `staged_path`.
    pub fn staged_path_taken(&self, staged_path: &Path) -> bool {
        self.files
            .iter()
            .any(|file| file.staged_path.as_deref() == Some(staged_path))
    }

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn exposed_ports(&self) -> &[ExposedPortDetails] {
        &self.exposed_ports
    }

    pub fn files(&self) -> &[FileDetails] {
        &self.files
    }

    /// Serializes the accumulated state.
    ///
    /// Layout: `FROM`, one `COPY` per file, a blank line, one `RUN` per command, a blank
    /// line, one `EXPOSE` per port and finally `ENTRYPOINT` when `entry_point` is given.
    pub fn render(&self, entry_point: Option<&str>) -> String {
        let mut output = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(output, "FROM {}", self.base_image);
        output.push('\n');

        for file in &self.files {
            let _ = writeln!(output, "COPY {} {}", copy_source(file), file.container_path());
        }
        output.push('\n');

        for command in &self.commands {
            let _ = writeln!(output, "RUN {}", command);
        }
        output.push('\n');

        for port in &self.exposed_ports {
            let _ = writeln!(output, "EXPOSE {}", port);
        }

        if let Some(entry_point) = entry_point.map(str::trim).filter(|e| !e.is_empty()) {
            output.push('\n');
            let _ = writeln!(output, "ENTRYPOINT {}", entry_point);
        }

        output
    }

    /// Writes the rendered Dockerfile into `destination_dir` and returns its path.
    ///
    /// The file is written to a temporary sibling first and renamed into place, so a
    /// failed write never leaves a truncated Dockerfile behind.
    pub fn build(&self, destination_dir: &Path, entry_point: Option<&str>) -> Result<PathBuf> {
        let path = destination_dir.join(DOCKERFILE_NAME);
        let rendered = self.render(entry_point);

        let mut temp =
            NamedTempFile::new_in(destination_dir).map_err(|e| SliceError::io(destination_dir, e))?;
        temp.write_all(rendered.as_bytes())
            .map_err(|e| SliceError::io(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| SliceError::io(&path, e.error))?;

        debug!(
            "Wrote {} with {} files, {} commands and {} exposed ports",
            path.display(),
            self.files.len(),
            self.commands.len(),
            self.exposed_ports.len()
        );
        Ok(path)
    }
}

/// The `COPY` source: the staged path relative to the Dockerfile, with forward slashes.
fn copy_source(file: &FileDetails) -> String {
    file.staged_path_relative
        .as_ref()
        .map(|path| path.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| file.filename.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn staged(path: &str, relative: &str) -> FileDetails {
        let mut details = FileDetails::from_container_path(path);
        details.staged_path_relative = Some(PathBuf::from(relative));
        details
    }

    fn sample() -> Dockerfile {
        let mut dockerfile = Dockerfile::new("scratch");
        dockerfile.add_files(vec![
            staged("/bin/bash", "./binaries/bash"),
            staged("/lib/libc.so.6", "./binaries/libc.so.6"),
        ]);
        dockerfile.add_file(staged("/usr/etc/sshd_config", "./config/sshd_config"));
        dockerfile.add_commands(["ssh-keygen -A", "mkdir /var/"]);
        dockerfile.add_exposed_ports(vec![
            "22/tcp".parse().unwrap(),
            "22/udp".parse().unwrap(),
        ]);
        dockerfile
    }

    #[test]
    fn test_render_layout() {
        let expected = "FROM scratch

COPY ./binaries/bash /bin/bash
COPY ./binaries/libc.so.6 /lib/libc.so.6
COPY ./config/sshd_config /usr/etc/sshd_config

RUN ssh-keygen -A
RUN mkdir /var/

EXPOSE 22/tcp
EXPOSE 22/udp

ENTRYPOINT /bin/bash
";
        assert_eq!(sample().render(Some("/bin/bash")), expected);
    }

    #[test]
    fn test_additions_keep_insertion_order() {
        let mut dockerfile = sample();
        dockerfile.add_command("chmod 600 /etc/shadow");
        dockerfile.add_exposed_port(ExposedPortDetails::new(2222, None).unwrap());

        assert_eq!(dockerfile.base_image(), "scratch");
        assert_eq!(
            dockerfile.commands(),
            ["ssh-keygen -A", "mkdir /var/", "chmod 600 /etc/shadow"]
        );
        let ports: Vec<String> = dockerfile.exposed_ports().iter().map(|p| p.to_string()).collect();
        assert_eq!(ports, vec!["22/tcp", "22/udp", "2222"]);
        assert_eq!(dockerfile.files()[2].container_path(), "/usr/etc/sshd_config");
    }

    #[test]
    fn test_render_empty_without_entry_point() {
        let dockerfile = Dockerfile::new("alpine:3.20");
        assert_eq!(dockerfile.render(None), "FROM alpine:3.20\n\n\n\n");
        assert_eq!(dockerfile.render(Some("  ")), "FROM alpine:3.20\n\n\n\n");
    }

    #[test]
    fn test_port_without_protocol_and_backslashes() {
        let mut dockerfile = Dockerfile::new("scratch");
        dockerfile.add_file(staged("/bin/sh", ".\\binaries\\sh"));
        dockerfile.add_exposed_port(ExposedPortDetails::new(8080, None).unwrap());
        let rendered = dockerfile.render(None);
        assert!(rendered.contains("COPY ./binaries/sh /bin/sh\n"));
        assert!(rendered.ends_with("EXPOSE 8080\n"));
    }

    #[test]
    fn test_file_exists_by_filename_and_directory() {
        let dockerfile = sample();
        let mut link = FileDetails::from_container_path("/bin/bash");
        link.symlink_target = Some("/usr/bin/bash".to_string());
        assert!(dockerfile.file_exists(&link));
        assert!(!dockerfile.file_exists(&FileDetails::from_container_path("/usr/bin/bash")));
    }

    #[test]
    fn test_build_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = sample();

        let path = dockerfile.build(dir.path(), Some("/bin/bash")).unwrap();
        assert_eq!(path, dir.path().join(DOCKERFILE_NAME));
        let first = fs::read(&path).unwrap();

        dockerfile.build(dir.path(), Some("/bin/bash")).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_build_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample().build(&dir.path().join("missing"), None);
        assert!(matches!(result, Err(SliceError::Io { .. })));
    }
}
