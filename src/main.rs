use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use scratchify::{BuildConfig, CliExecutor, ExposedPortDetails, ImageSlicer, Notifier, SymlinkStrategy};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Engine {
    Docker,
    Nerdctl,
    Podman,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(help = "ID or name of the running container to slice")]
    container: Option<String>,

    #[arg(short, long = "binary", help = "Binary to copy together with its shared libraries")]
    binaries: Vec<String>,

    #[arg(short, long = "config-file", help = "Config file to copy as is")]
    config_files: Vec<String>,

    #[arg(short, long = "run", help = "Command to add as a RUN instruction")]
    run: Vec<String>,

    #[arg(short = 'p', long = "expose", help = "Port to expose, e.g. 22/tcp or 8080")]
    exposed_ports: Vec<ExposedPortDetails>,

    #[arg(long, help = "ENTRYPOINT of the new image")]
    entrypoint: Option<String>,

    #[arg(long, help = "Image to build onto [default: scratch]")]
    base_image: Option<String>,

    #[arg(
        short,
        long,
        help = "Staging directory for copied files and the Dockerfile [default: ./copied_files]"
    )]
    output: Option<PathBuf>,

    #[arg(short, long, help = "JSON run manifest; command line values are added to it")]
    manifest: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "docker",
        help = "Container engine CLI to use"
    )]
    engine: Engine,

    #[arg(
        long,
        help = "Resolve symbolic links by searching the filesystem for the target name instead of readlink -f"
    )]
    legacy_symlink_search: bool,

    #[arg(long, value_name = "SECS", help = "Kill container commands running longer than this")]
    timeout: Option<u64>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also switches to text-based progress"
    )]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<(BuildConfig, Engine)> {
        let mut config = match &self.manifest {
            Some(path) => BuildConfig::from_manifest(path)
                .with_context(|| format!("Failed to load run manifest {}", path.display()))?,
            None => BuildConfig::default(),
        };

        if let Some(container) = self.container {
            config.container_id = container;
        }
        if let Some(base_image) = self.base_image {
            config.base_image = base_image;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if self.entrypoint.is_some() {
            config.entry_point = self.entrypoint;
        }
        if self.legacy_symlink_search {
            config.symlink_strategy = SymlinkStrategy::LegacySearch;
        }
        if self.timeout.is_some() {
            config.command_timeout_secs = self.timeout;
        }

        config.binaries.extend(self.binaries);
        config.config_files.extend(self.config_files);
        config.commands.extend(self.run);
        config.exposed_ports.extend(self.exposed_ports);

        if config.container_id.is_empty() {
            return Err(anyhow!(
                "No container given: pass it as an argument or set container_id in the manifest"
            ));
        }

        Ok((config, self.engine))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let notifier = Notifier::new(cli.verbose);
    notifier.init_logging();

    let (config, engine) = cli.into_config()?;
    notifier.debug(&format!("Engine: {:?}", engine));
    notifier.debug(&format!("Output directory: {}", config.output_dir.display()));

    let mut executor = match engine {
        Engine::Docker => CliExecutor::docker(),
        Engine::Nerdctl => CliExecutor::nerdctl(),
        Engine::Podman => CliExecutor::podman(),
    }
    .with_context(|| format!("Failed to initialize {:?} engine. Is it installed?", engine))?;

    if let Some(secs) = config.command_timeout_secs {
        executor = executor.with_timeout(Duration::from_secs(secs));
    }

    let slicer = ImageSlicer::new(executor, notifier);
    let outcome = slicer
        .run(&config)
        .with_context(|| format!("Failed to slice container {}", config.container_id))?;

    println!("{}", outcome.dockerfile_path.display());
    Ok(())
}
