//! Common utilities for integration tests

use std::process::Command;

/// Image used as the container to slice
#[allow(dead_code)]
pub const TEST_IMAGE: &str = "alpine:latest";

/// A detached container removed again when dropped.
#[allow(dead_code)]
pub struct RunningContainer {
    pub id: String,
}

#[allow(dead_code)]
impl RunningContainer {
    pub fn start(image: &str) -> Self {
        let output = Command::new("docker")
            .args(["run", "-d", "--rm", image, "sleep", "300"])
            .output()
            .expect("Should run docker");
        assert!(
            output.status.success(),
            "Should start {}: {}",
            image,
            String::from_utf8_lossy(&output.stderr)
        );

        Self {
            id: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        }
    }
}

impl Drop for RunningContainer {
    fn drop(&mut self) {
        let _ = Command::new("docker")
            .args(["rm", "-f", &self.id])
            .output();
    }
}
