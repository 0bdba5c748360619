pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{CachedFetcher, HttpFetcher, LocalStorage, SourceCache};
pub use app::pipelines::{BlocklistPipeline, RunOptions};
pub use config::{RunConfig, SourceConfig, Whitelist};
pub use core::etl::{CompileEngine, RunOutcome};
pub use core::psl::PublicSuffixRuleSet;
pub use domain::state::CompilationState;
pub use utils::error::{Result, YahaError};
