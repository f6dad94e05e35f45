pub mod collector;
pub mod config;
pub mod dependencies;
pub mod dockerfile;
pub mod error;
pub mod executors;
pub mod locator;
pub mod models;
pub mod notifier;
pub mod slicer;

// Re-exports for easy access
pub use collector::ArtifactCollector;
pub use config::{BuildConfig, StagingLayout};
pub use dependencies::DependencyWalker;
pub use dockerfile::Dockerfile;
pub use error::{Result, SliceError};
pub use executors::{CliExecutor, ContainerExecutor, ScriptedExecutor};
pub use locator::{FileLocator, SymlinkStrategy};
pub use models::{ExposedPortDetails, FileDetails};
pub use notifier::Notifier;
pub use slicer::{ImageSlicer, SliceOutcome};
