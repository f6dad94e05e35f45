use log::{debug, trace};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::ContainerExecutor;
use crate::error::{Result, SliceError};
use crate::models::CommandOutput;

const TIMEOUT_EXIT_CODE: i32 = -1;
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Drives a Docker-compatible CLI (`docker`, `nerdctl`, `podman`).
///
/// Every call spawns `<program> exec <container> argv...` or
/// `<program> cp <container>:<source> <destination>` and waits for it to finish.
pub struct CliExecutor {
    program: String,
    timeout: Option<Duration>,
}

impl CliExecutor {
    /// Checks that `program` is installed and answers `--version`.
    pub fn new(program: &str) -> Result<Self> {
        let output = Command::new(program)
            .arg("--version")
            .output()
            .map_err(|e| SliceError::io(program, e))?;

        if !output.status.success() {
            return Err(SliceError::CommandFailed {
                command: format!("{} --version", program),
                exit_code: output.status.code().unwrap_or(TIMEOUT_EXIT_CODE),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            "Using {}: {}",
            program,
            String::from_utf8_lossy(&output.stdout).trim()
        );

        Ok(Self {
            program: program.to_string(),
            timeout: None,
        })
    }

    pub fn docker() -> Result<Self> {
        Self::new("docker")
    }

    pub fn nerdctl() -> Result<Self> {
        Self::new("nerdctl")
    }

    pub fn podman() -> Result<Self> {
        Self::new("podman")
    }

    /// Kills any command that runs longer than `timeout`; it is then reported as a
    /// non-zero exit like any other failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn run_command(&self, args: &[String]) -> Result<CommandOutput> {
        trace!("Running {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SliceError::io(&self.program, e))?;

        let output = match self.timeout {
            None => {
                let output = child
                    .wait_with_output()
                    .map_err(|e| SliceError::io(&self.program, e))?;
                CommandOutput {
                    exit_code: output.status.code().unwrap_or(TIMEOUT_EXIT_CODE),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                }
            }
            Some(timeout) => self.wait_with_deadline(child, timeout, args)?,
        };

        trace!("{} exited with {}", self.program, output.exit_code);
        Ok(output)
    }

    fn wait_with_deadline(
        &self,
        mut child: Child,
        timeout: Duration,
        args: &[String],
    ) -> Result<CommandOutput> {
        // Drain both pipes on their own threads so a chatty command cannot block on a full pipe
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child
                .try_wait()
                .map_err(|e| SliceError::io(&self.program, e))?
            {
                Some(status) => break Some(status),
                None if Instant::now() >= deadline => {
                    debug!(
                        "{} {} timed out after {:?}, killing it",
                        self.program,
                        args.join(" "),
                        timeout
                    );
                    // The child may exit between try_wait and kill
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let mut stderr = stderr_reader.map(join_reader).unwrap_or_default();

        let exit_code = match status {
            Some(status) => status.code().unwrap_or(TIMEOUT_EXIT_CODE),
            None => {
                stderr.push_str(&format!("timed out after {:?}", timeout));
                TIMEOUT_EXIT_CODE
            }
        };

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).to_string()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

impl ContainerExecutor for CliExecutor {
    fn name(&self) -> &str {
        &self.program
    }

    fn exec(&self, container_id: &str, argv: &[String]) -> Result<CommandOutput> {
        let mut args = vec!["exec".to_string(), container_id.to_string()];
        args.extend(argv.iter().cloned());
        self.run_command(&args)
    }

    fn copy_out(
        &self,
        container_id: &str,
        source: &str,
        destination: &Path,
    ) -> Result<CommandOutput> {
        let args = vec![
            "cp".to_string(),
            format!("{}:{}", container_id, source),
            destination.to_string_lossy().to_string(),
        ];
        self.run_command(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `sh -c` stands in for a container CLI: `sh exec <id> ...` is not valid, so these
    // tests go through run_command directly.
    fn shell() -> CliExecutor {
        CliExecutor {
            program: "sh".to_string(),
            timeout: None,
        }
    }

    fn args(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let result = CliExecutor::new("scratchify-no-such-container-cli");
        assert!(matches!(result, Err(SliceError::Io { .. })));
    }

    #[test]
    fn test_non_zero_exit_is_returned_not_raised() {
        let output = shell()
            .run_command(&args("echo out; echo err >&2; exit 3"))
            .unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_timeout_reported_as_failure() {
        let executor = shell().with_timeout(Duration::from_millis(100));
        let output = executor.run_command(&args("exec sleep 5")).unwrap();
        assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
        assert!(output.stderr.contains("timed out"));
    }

    #[test]
    fn test_deadline_not_hit() {
        let executor = shell().with_timeout(Duration::from_secs(10));
        let output = executor.run_command(&args("printf hello")).unwrap();
        assert!(output.is_success());
        assert_eq!(output.stdout, "hello");
    }
}
