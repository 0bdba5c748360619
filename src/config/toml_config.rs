use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, YahaError};
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const DEFAULT_CONFIG_FILE: &str = "yaha.toml";
pub const DEFAULT_PSL_URL: &str = "https://publicsuffix.org/list/public_suffix_list.dat";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// 執行設定，所有區段皆可省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
    pub policy: PolicyConfig,
    pub sort: SortConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sources: PathBuf,
    pub whitelist: PathBuf,
    pub state: PathBuf,
    pub psl: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub work_dir: PathBuf,
    pub readme: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("blocklists.json"),
            whitelist: PathBuf::from("whitelist.txt"),
            state: PathBuf::from("state.json"),
            psl: PathBuf::from("public_suffix_list.dat"),
            output_dir: PathBuf::from("blocklists"),
            cache_dir: PathBuf::from("cache"),
            work_dir: PathBuf::from("."),
            readme: PathBuf::from("README.md"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_workers: usize,
    pub timeout_seconds: u64,
    pub psl_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            timeout_seconds: 30,
            psl_url: DEFAULT_PSL_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub stale_threshold_days: i64,
    pub psl_stale_days: u64,
    pub force_interval_hours: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            stale_threshold_days: 180,
            psl_stale_days: 30,
            force_interval_hours: 168,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub chunk_records: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            chunk_records: crate::core::sort::DEFAULT_CHUNK_RECORDS,
        }
    }
}

impl RunConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "No run configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| YahaError::ConfigInvalid {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${YAHA_OUTPUT})，未定義者保留原文
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        let paths = [
            ("paths.sources", &self.paths.sources),
            ("paths.whitelist", &self.paths.whitelist),
            ("paths.state", &self.paths.state),
            ("paths.psl", &self.paths.psl),
            ("paths.output_dir", &self.paths.output_dir),
            ("paths.cache_dir", &self.paths.cache_dir),
            ("paths.work_dir", &self.paths.work_dir),
            ("paths.readme", &self.paths.readme),
        ];
        for (field, path) in paths {
            validate_path(field, &path.to_string_lossy())?;
        }

        validate_positive_number("fetch.max_workers", self.fetch.max_workers, 1)?;
        validate_positive_number("fetch.timeout_seconds", self.fetch.timeout_seconds as usize, 1)?;
        validate_url("fetch.psl_url", &self.fetch.psl_url)?;
        validate_positive_number("sort.chunk_records", self.sort.chunk_records, 1)?;

        if self.policy.stale_threshold_days < 1 || self.policy.force_interval_hours < 1 {
            return Err(YahaError::InvalidConfigValue {
                field: "policy".to_string(),
                value: format!(
                    "stale_threshold_days={}, force_interval_hours={}",
                    self.policy.stale_threshold_days, self.policy.force_interval_hours
                ),
                reason: "Thresholds must be positive".to_string(),
            });
        }

        Ok(())
    }
}

impl ConfigProvider for RunConfig {
    fn output_dir(&self) -> &Path {
        &self.paths.output_dir
    }

    fn work_dir(&self) -> &Path {
        &self.paths.work_dir
    }

    fn readme_path(&self) -> &Path {
        &self.paths.readme
    }

    fn state_path(&self) -> &Path {
        &self.paths.state
    }

    fn max_workers(&self) -> usize {
        self.fetch.max_workers
    }

    fn sort_chunk_records(&self) -> usize {
        self.sort.chunk_records
    }

    fn force_interval_hours(&self) -> i64 {
        self.policy.force_interval_hours
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.max_workers(), 5);
        assert_eq!(config.fetch.timeout_seconds, 30);
        assert_eq!(config.policy.stale_threshold_days, 180);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_content = r#"
[paths]
output_dir = "./out"

[fetch]
max_workers = 2

[sort]
chunk_records = 5000
"#;

        let config = RunConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.output_dir(), Path::new("./out"));
        assert_eq!(config.paths.sources, PathBuf::from("blocklists.json"));
        assert_eq!(config.max_workers(), 2);
        assert_eq!(config.fetch.timeout_seconds, 30);
        assert_eq!(config.sort_chunk_records(), 5000);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("YAHA_TEST_OUTPUT_DIR", "/tmp/yaha-out");

        let toml_content = r#"
[paths]
output_dir = "${YAHA_TEST_OUTPUT_DIR}"
readme = "${YAHA_TEST_UNDEFINED_VAR}"
"#;

        let config = RunConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/yaha-out"));
        assert_eq!(config.paths.readme, PathBuf::from("${YAHA_TEST_UNDEFINED_VAR}"));

        std::env::remove_var("YAHA_TEST_OUTPUT_DIR");
    }

    #[test]
    fn test_config_validation() {
        let config = RunConfig::from_toml_str("[fetch]\nmax_workers = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::from_toml_str("[fetch]\npsl_url = \"ftp://example.com\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::from_toml_str("[policy]\nforce_interval_hours = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let result = RunConfig::from_toml_str("[fetch\nmax_workers = ");
        assert!(matches!(result, Err(YahaError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[policy]\nstale_threshold_days = 90\n")
            .unwrap();

        let config = RunConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.policy.stale_threshold_days, 90);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = RunConfig::from_file_or_default(temp_dir.path().join("yaha.toml")).unwrap();
        assert_eq!(config, RunConfig::default());
    }
}
