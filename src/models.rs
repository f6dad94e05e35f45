use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SliceError;

/// What a collected file is used for; decides which staging subfolder receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Binary,
    Config,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Binary => write!(f, "binary"),
            ArtifactKind::Config => write!(f, "config file"),
        }
    }
}

/// Identity and placement of one file copied out of the container.
///
/// Two values are the same artifact when `filename` and `directory` match. The resolved
/// `symlink_target` and the staging paths do not take part in equality, so two links that
/// point at one real file but live at different container paths stay distinct artifacts.
#[derive(Debug, Clone)]
pub struct FileDetails {
    /// Base name inside the container.
    pub filename: String,
    /// Containing directory inside the container. Also the destination in the new image.
    pub directory: String,
    /// Fully resolved real path, only set when the original path is a symbolic link.
    pub symlink_target: Option<String>,
    /// Absolute local path the bytes are written to.
    pub staged_path: Option<PathBuf>,
    /// Path relative to the Dockerfile, used as the `COPY` source.
    pub staged_path_relative: Option<PathBuf>,
}

impl FileDetails {
    /// Splits a container path into directory and base name.
    ///
    /// Trailing slashes are dropped from the directory unless it is the root itself.
    pub fn from_container_path(path: &str) -> Self {
        let (directory, filename) = match path.rfind('/') {
            Some(idx) => {
                let head = &path[..idx + 1];
                let trimmed = head.trim_end_matches('/');
                let directory = if trimmed.is_empty() { head } else { trimmed };
                (directory.to_string(), path[idx + 1..].to_string())
            }
            None => (String::new(), path.to_string()),
        };

        Self {
            filename,
            directory,
            symlink_target: None,
            staged_path: None,
            staged_path_relative: None,
        }
    }

    /// The path this artifact occupies inside the container (and inside the new image).
    pub fn container_path(&self) -> String {
        if self.directory.is_empty() {
            self.filename.clone()
        } else if self.directory.ends_with('/') {
            format!("{}{}", self.directory, self.filename)
        } else {
            format!("{}/{}", self.directory, self.filename)
        }
    }

    /// The path whose bytes get copied: the resolved link target when there is one.
    pub fn copy_source(&self) -> String {
        self.symlink_target
            .clone()
            .unwrap_or_else(|| self.container_path())
    }
}

impl PartialEq for FileDetails {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename && self.directory == other.directory
    }
}

impl Eq for FileDetails {}

/// A port declared with `EXPOSE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PortSpec")]
pub struct ExposedPortDetails {
    pub port: u16,
    /// `tcp`, `udp`, ... `None` leaves the engine default.
    pub protocol: Option<String>,
}

impl ExposedPortDetails {
    pub fn new(port: u16, protocol: Option<&str>) -> Result<Self, SliceError> {
        if port == 0 {
            return Err(SliceError::InvalidPort {
                value: port.to_string(),
                reason: "port must be positive".to_string(),
            });
        }

        let protocol = protocol
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self { port, protocol })
    }
}

impl fmt::Display for ExposedPortDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.protocol {
            Some(protocol) => write!(f, "{}/{}", self.port, protocol),
            None => write!(f, "{}", self.port),
        }
    }
}

impl FromStr for ExposedPortDetails {
    type Err = SliceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (port, protocol) = match value.split_once('/') {
            Some((port, protocol)) => (port, Some(protocol)),
            None => (value, None),
        };

        let port = port.parse::<u16>().map_err(|e| SliceError::InvalidPort {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

        Self::new(port, protocol).map_err(|_| SliceError::InvalidPort {
            value: value.to_string(),
            reason: "port must be positive".to_string(),
        })
    }
}

/// Ports in a run manifest may be written as `"22/tcp"` or `{"port": 22, "protocol": "tcp"}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PortSpec {
    Text(String),
    Detailed {
        port: u16,
        #[serde(default)]
        protocol: Option<String>,
    },
}

impl TryFrom<PortSpec> for ExposedPortDetails {
    type Error = SliceError;

    fn try_from(spec: PortSpec) -> Result<Self, Self::Error> {
        match spec {
            PortSpec::Text(text) => text.parse(),
            PortSpec::Detailed { port, protocol } => Self::new(port, protocol.as_deref()),
        }
    }
}

/// Exit code and captured output of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a non-zero exit into [`SliceError::CommandFailed`].
    pub fn check(self, command: &[String]) -> Result<Self, SliceError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SliceError::CommandFailed {
                command: command.join(" "),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_container_path() {
        let details = FileDetails::from_container_path("/usr/lib/libc.so.6");
        assert_eq!(details.directory, "/usr/lib");
        assert_eq!(details.filename, "libc.so.6");
        assert_eq!(details.container_path(), "/usr/lib/libc.so.6");

        let details = FileDetails::from_container_path("/sh");
        assert_eq!(details.directory, "/");
        assert_eq!(details.filename, "sh");
        assert_eq!(details.container_path(), "/sh");

        let details = FileDetails::from_container_path("linux-vdso.so.1");
        assert_eq!(details.directory, "");
        assert_eq!(details.container_path(), "linux-vdso.so.1");

        let details = FileDetails::from_container_path("/lib//ld.so");
        assert_eq!(details.directory, "/lib");
        assert_eq!(details.filename, "ld.so");
    }

    #[test]
    fn test_equality_ignores_symlink_target() {
        let mut a = FileDetails::from_container_path("/lib/libz.so.1");
        let b = FileDetails::from_container_path("/lib/libz.so.1");
        a.symlink_target = Some("/lib/libz.so.1.3".to_string());
        assert_eq!(a, b);

        let mut c = FileDetails::from_container_path("/usr/lib/libz.so.1");
        c.symlink_target = a.symlink_target.clone();
        assert_ne!(a, c);
    }

    #[test]
    fn test_copy_source_prefers_symlink_target() {
        let mut details = FileDetails::from_container_path("/bin/sh");
        assert_eq!(details.copy_source(), "/bin/sh");
        details.symlink_target = Some("/bin/busybox".to_string());
        assert_eq!(details.copy_source(), "/bin/busybox");
        assert_eq!(details.container_path(), "/bin/sh");
    }

    #[test]
    fn test_parse_exposed_port() {
        let port: ExposedPortDetails = "22/tcp".parse().unwrap();
        assert_eq!(port.port, 22);
        assert_eq!(port.protocol.as_deref(), Some("tcp"));
        assert_eq!(port.to_string(), "22/tcp");

        let port: ExposedPortDetails = "8080".parse().unwrap();
        assert_eq!(port.protocol, None);
        assert_eq!(port.to_string(), "8080");

        let port: ExposedPortDetails = "53/".parse().unwrap();
        assert_eq!(port.to_string(), "53");

        assert!("0/tcp".parse::<ExposedPortDetails>().is_err());
        assert!("ssh".parse::<ExposedPortDetails>().is_err());
        assert!("70000".parse::<ExposedPortDetails>().is_err());
    }

    #[test]
    fn test_deserialize_exposed_ports() {
        let ports: Vec<ExposedPortDetails> =
            serde_json::from_str(r#"["22/tcp", {"port": 22, "protocol": "udp"}, {"port": 80}]"#)
                .unwrap();
        assert_eq!(
            ports.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["22/tcp", "22/udp", "80"]
        );

        let zero: Result<ExposedPortDetails, _> = serde_json::from_str(r#"{"port": 0}"#);
        assert!(zero.is_err());
    }

    #[test]
    fn test_command_output_check() {
        let argv = vec!["ls".to_string(), "-la".to_string(), "/nope".to_string()];
        let err = CommandOutput::failure(2, "No such file\n")
            .check(&argv)
            .unwrap_err();
        match err {
            SliceError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => {
                assert_eq!(command, "ls -la /nope");
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "No such file");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(CommandOutput::success("ok").check(&argv).is_ok());
    }
}
