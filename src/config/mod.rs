#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliArgs, Command, SourceKind, TransformStyle};
pub use toml_config::ExerciseConfig;
