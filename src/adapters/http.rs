use crate::config::sources::SourceConfig;
use crate::core::psl::PublicSuffixRuleSet;
use crate::domain::model::FetchedContent;
use crate::domain::ports::SourceFetcher;
use crate::utils::error::{FetchError, Result, YahaError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::{Duration, SystemTime};

const USER_AGENT: &str = concat!("yaha/", env!("CARGO_PKG_VERSION"));
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// 透過 HTTP GET 取得來源清單
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch_url(&self, url: &str) -> std::result::Result<FetchedContent, FetchError> {
        tracing::debug!("Requesting {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedContent::new(body))
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceConfig) -> std::result::Result<FetchedContent, FetchError> {
        self.fetch_url(&source.url).await
    }
}

/// 依檔案修改時間判斷是否過期；讀不到時間視為過期
fn is_stale(path: &Path, max_age_days: u64) -> bool {
    let Ok(modified) = std::fs::metadata(path).and_then(|meta| meta.modified()) else {
        return true;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    age.as_secs() / SECONDS_PER_DAY >= max_age_days
}

/// Downloads the Public Suffix List when the local copy is missing or older
/// than `max_age_days`, then parses it.
///
/// A failed download falls back to an existing (stale) copy.
pub async fn ensure_psl_and_load(
    fetcher: &HttpFetcher,
    path: &Path,
    url: &str,
    max_age_days: u64,
) -> Result<PublicSuffixRuleSet> {
    if is_stale(path, max_age_days) {
        tracing::info!("🌐 Downloading fresh Public Suffix List...");
        match fetcher.fetch_url(url).await {
            Ok(content) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, content.body.as_bytes())?;
                tracing::info!("💾 Saved to {}", path.display());
            }
            Err(e) if path.exists() => {
                tracing::warn!("⚠️ {}; using stale {}", e, path.display());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        tracing::info!("📄 Using cached {}", path.display());
    }

    parse_psl_file(path)
}

/// 僅使用本機 PSL，不發出任何網路請求；檔案不存在即為快取錯誤
pub fn load_local_psl(path: &Path) -> Result<PublicSuffixRuleSet> {
    if !path.exists() {
        return Err(YahaError::CacheError {
            message: format!("no local Public Suffix List at {}", path.display()),
        });
    }
    tracing::info!("📄 Using local {}", path.display());
    parse_psl_file(path)
}

fn parse_psl_file(path: &Path) -> Result<PublicSuffixRuleSet> {
    let text = std::fs::read_to_string(path)?;
    let rules = PublicSuffixRuleSet::parse(&text);
    tracing::info!(
        "Loaded {} exact, {} wildcard, {} exception rules",
        rules.exact_count(),
        rules.wildcard_count(),
        rules.exception_count()
    );
    Ok(rules)
}
