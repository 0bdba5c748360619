#[cfg(feature = "cli")]
pub mod cli;
pub mod sources;
pub mod toml_config;
pub mod whitelist;

#[cfg(feature = "cli")]
pub use cli::CliArgs;
pub use sources::{load_sources, parse_sources, save_sources, SourceConfig};
pub use toml_config::RunConfig;
pub use whitelist::Whitelist;
