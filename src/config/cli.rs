use super::toml_config::{RunConfig, DEFAULT_CONFIG_FILE};
use crate::utils::error::Result;
use crate::utils::validation::{validate_positive_number, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "yaha")]
#[command(about = "YAHA - Yet Another Host Aggregator")]
#[command(version)]
pub struct CliArgs {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, help = "Run configuration (TOML)")]
    pub config: PathBuf,

    #[arg(long, help = "Force recompilation even if no changes detected")]
    pub force: bool,

    #[arg(long, help = "Compile from cached sources without network requests")]
    pub compile_only: bool,

    #[arg(long, help = "Print the compilation plan without fetching anything")]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, help = "Override [fetch] max_workers")]
    pub max_workers: Option<usize>,
}

impl CliArgs {
    /// 載入 TOML 設定並套用命令列覆寫
    pub fn load_run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::from_file_or_default(&self.config)?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(max_workers) = self.max_workers {
            config.fetch.max_workers = max_workers;
        }
    }
}

impl Validate for CliArgs {
    fn validate(&self) -> Result<()> {
        if let Some(max_workers) = self.max_workers {
            validate_positive_number("max_workers", max_workers, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["yaha"]);
        assert_eq!(args.config, PathBuf::from("yaha.toml"));
        assert!(!args.force);
        assert!(!args.compile_only);
        assert!(args.max_workers.is_none());
    }

    #[test]
    fn test_flags_and_override() {
        let args = CliArgs::parse_from([
            "yaha",
            "--force",
            "--compile-only",
            "--log-json",
            "--max-workers",
            "9",
        ]);
        assert!(args.force && args.compile_only && args.log_json);

        let mut config = RunConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.fetch.max_workers, 9);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let args = CliArgs::parse_from(["yaha", "--max-workers", "0"]);
        assert!(args.validate().is_err());
    }
}
