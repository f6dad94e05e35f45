//! Docker integration tests
//!
//! Slices an Alpine container whose userland is busybox linked against musl.

#[cfg(all(test, feature = "docker"))]
mod tests {
    use crate::integration::common::*;
    use scratchify::{BuildConfig, CliExecutor, ContainerExecutor, ImageSlicer, Notifier, SliceError};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_docker_executor_creation() {
        let executor = CliExecutor::docker();
        assert!(executor.is_ok(), "Should be able to create the docker executor");
        assert_eq!(executor.unwrap().name(), "docker");
    }

    #[test]
    fn test_exec_reports_exit_code() {
        let container = RunningContainer::start(TEST_IMAGE);
        let executor = CliExecutor::docker().expect("Should create docker executor");

        let argv = vec!["ls".to_string(), "-ld".to_string(), "/nope".to_string()];
        let output = executor.exec(&container.id, &argv).expect("Should run exec");
        assert_ne!(output.exit_code, 0, "Listing a missing path should fail");
    }

    #[test]
    fn test_slice_busybox_applet() {
        let container = RunningContainer::start(TEST_IMAGE);
        let output_dir = TempDir::new().expect("Should create temp output dir");
        let config = BuildConfig {
            binaries: vec!["/bin/ls".to_string()],
            config_files: vec!["/etc/passwd".to_string()],
            entry_point: Some("/bin/ls".to_string()),
            output_dir: output_dir.path().to_path_buf(),
            ..BuildConfig::new(container.id.clone())
        };

        let executor = CliExecutor::docker().expect("Should create docker executor");
        let outcome = ImageSlicer::new(executor, Notifier::new(1))
            .run(&config)
            .expect("Should slice the container");

        let dockerfile = fs::read_to_string(&outcome.dockerfile_path).expect("Should read Dockerfile");
        assert!(dockerfile.starts_with("FROM scratch\n"));
        assert!(dockerfile.contains("COPY ./binaries/ls /bin/ls\n"));
        assert!(dockerfile.contains("COPY ./config/passwd /etc/passwd\n"));
        assert!(dockerfile.ends_with("ENTRYPOINT /bin/ls\n"));

        // /bin/ls is a link to busybox, so the real binary is staged under the link's name
        let staged = fs::metadata(output_dir.path().join("binaries").join("ls"))
            .expect("Should stage ls");
        assert!(staged.is_file());
        assert!(staged.len() > 100_000, "Should stage busybox, not the link");
    }

    #[test]
    fn test_slice_missing_binary() {
        let container = RunningContainer::start(TEST_IMAGE);
        let output_dir = TempDir::new().expect("Should create temp output dir");
        let config = BuildConfig {
            binaries: vec!["/usr/bin/this-binary-does-not-exist".to_string()],
            output_dir: output_dir.path().to_path_buf(),
            ..BuildConfig::new(container.id.clone())
        };

        let executor = CliExecutor::docker().expect("Should create docker executor");
        let result = ImageSlicer::new(executor, Notifier::new(1)).run(&config);

        assert!(matches!(result, Err(SliceError::NotFound { .. })));
        assert!(!output_dir.path().join("Dockerfile").exists());
    }
}
