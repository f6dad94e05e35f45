//! Backends that run commands against a running container.
//!
//! The engine only ever talks to a container through [`ContainerExecutor`]; which CLI
//! (or a recorded session) sits behind it is chosen by the caller.

pub mod cli;
pub mod executor;
pub mod scripted;

pub use cli::CliExecutor;
pub use executor::{ContainerExecutor, IssuedCommand};
pub use scripted::ScriptedExecutor;
