//! End-to-end "running container → minimal Dockerfile" orchestrator.
//!
//! [`ImageSlicer::run`]:
//! 1. validates the [`BuildConfig`] and creates the staging folders,
//! 2. seeds a [`Dockerfile`] with the requested `RUN` commands and exposed ports,
//! 3. collects every binary (dependencies first) and then every config file,
//! 4. writes the Dockerfile into the staging root.
//!
//! Any fatal error aborts before step 4, so a failed run never leaves a Dockerfile that
//! describes a partial slice.

use std::path::PathBuf;

use crate::collector::ArtifactCollector;
use crate::config::{BuildConfig, StagingLayout};
use crate::dockerfile::Dockerfile;
use crate::error::Result;
use crate::executors::ContainerExecutor;
use crate::notifier::Notifier;

/// What a successful run produced.
#[derive(Debug)]
pub struct SliceOutcome {
    pub dockerfile_path: PathBuf,
    pub dockerfile: Dockerfile,
}

pub struct ImageSlicer<E: ContainerExecutor> {
    executor: E,
    notifier: Notifier,
}

impl<E: ContainerExecutor> ImageSlicer<E> {
    pub fn new(executor: E, notifier: Notifier) -> Self {
        Self { executor, notifier }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Slices the container described by `config` and writes the Dockerfile.
    ///
    /// # Errors
    /// - Configuration errors from [`BuildConfig::validate`].
    /// - A requested binary or config file that does not exist in the container.
    /// - Any failed copy, link resolution or local I/O.
    pub fn run(&self, config: &BuildConfig) -> Result<SliceOutcome> {
        self.notifier.info(&format!(
            "Slicing container {} onto {} with {}",
            config.container_id,
            config.base_image,
            self.executor.name()
        ));

        let layout = config.staging_layout();
        let dockerfile = match self.collect(config, &layout) {
            Ok(dockerfile) => dockerfile,
            Err(e) => {
                self.notifier.abandon();
                return Err(e);
            }
        };

        let dockerfile_path = dockerfile.build(layout.root(), config.entry_point.as_deref())?;
        self.notifier.finish(&format!(
            "Wrote {} ({} files)",
            dockerfile_path.display(),
            dockerfile.files().len()
        ));

        Ok(SliceOutcome {
            dockerfile_path,
            dockerfile,
        })
    }

    /// Copies everything `config` asks for into `layout` and returns the populated
    /// Dockerfile without writing it.
    pub fn collect(&self, config: &BuildConfig, layout: &StagingLayout) -> Result<Dockerfile> {
        config.validate()?;
        layout.prepare()?;
        self.notifier
            .debug(&format!("Staging into {}", layout.root().display()));

        let mut dockerfile = Dockerfile::new(&config.base_image);
        dockerfile.add_commands(config.commands.iter().cloned());
        dockerfile.add_exposed_ports(config.exposed_ports.iter().cloned());

        let total = (config.binaries.len() + config.config_files.len()) as u64;
        self.notifier.start_progress(total, "Collecting files");

        let mut collector = ArtifactCollector::new(
            &self.executor,
            &config.container_id,
            config.symlink_strategy,
            layout,
            &mut dockerfile,
        );

        let mut done = 0;
        for binary in &config.binaries {
            self.notifier.info(&format!("Collecting binary {}", binary));
            let copied = collector.collect_binary(binary)?;
            if copied == 0 {
                self.notifier
                    .debug(&format!("{} and its dependencies were already collected", binary));
            }
            done += 1;
            self.notifier.advance(done, total, "Collected");
        }

        for config_file in &config.config_files {
            self.notifier
                .info(&format!("Collecting config file {}", config_file));
            collector.collect_config_file(config_file)?;
            done += 1;
            self.notifier.advance(done, total, "Collected");
        }

        Ok(dockerfile)
    }
}
