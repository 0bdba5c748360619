//! Local copy of every fetched source, so a run can compile without network
//! access (`--compile-only`).

use crate::config::sources::SourceConfig;
use crate::domain::model::{content_hash, FetchedContent};
use crate::domain::ports::{SourceFetcher, Storage};
use crate::utils::error::{FetchError, Result, YahaError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub cached_at: Option<String>,
    #[serde(default)]
    pub sources: BTreeMap<String, CachedSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSource {
    pub cache_file: String,
    pub url: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub exists: bool,
    pub source_count: usize,
    pub cached_at: Option<String>,
}

/// 快取檔名只取決於來源名稱，清除過期來源後索引改變也不會錯置
///
/// The hash suffix keeps names that slug alike (`Ads List`, `ads-list`) apart.
pub fn cache_file_name(source_name: &str) -> String {
    let slug: String = source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("source_{}_{}.txt", slug, &content_hash(source_name)[..8])
}

/// 來源內容快取，路徑皆相對於 storage 根目錄
pub struct SourceCache<S: Storage> {
    storage: S,
}

impl<S: Storage> SourceCache<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn exists(&self) -> bool {
        self.storage.exists(MANIFEST_FILE).await
    }

    pub async fn load_manifest(&self) -> Result<CacheManifest> {
        if !self.exists().await {
            return Ok(CacheManifest::default());
        }
        let data = self.storage.read_file(MANIFEST_FILE).await?;
        serde_json::from_slice(&data).map_err(|e| YahaError::CacheError {
            message: format!("corrupt {}: {}", MANIFEST_FILE, e),
        })
    }

    async fn save_manifest(&self, manifest: &CacheManifest) -> Result<()> {
        let mut json = serde_json::to_string_pretty(manifest)?;
        json.push('\n');
        self.storage.write_file(MANIFEST_FILE, json.as_bytes()).await
    }

    /// Stores the body under the source's cache file and records it in the manifest.
    pub async fn save(&self, source: &SourceConfig, content: &FetchedContent) -> Result<()> {
        let cache_file = cache_file_name(&source.name);
        self.storage
            .write_file(&cache_file, content.body.as_bytes())
            .await?;

        let mut manifest = self.load_manifest().await?;
        manifest.cached_at = Some(chrono::Utc::now().to_rfc3339());
        manifest.sources.insert(
            source.name.clone(),
            CachedSource {
                cache_file,
                url: source.url.clone(),
                content_hash: content.content_hash.clone(),
            },
        );
        self.save_manifest(&manifest).await
    }

    pub async fn load(&self, name: &str) -> std::result::Result<FetchedContent, FetchError> {
        let miss = |reason: String| FetchError::CacheMiss {
            name: name.to_string(),
            reason,
        };

        let manifest = self.load_manifest().await.map_err(|e| miss(e.to_string()))?;
        let entry = manifest
            .sources
            .get(name)
            .ok_or_else(|| miss("not in manifest".to_string()))?;

        let data = self
            .storage
            .read_file(&entry.cache_file)
            .await
            .map_err(|e| miss(format!("{}: {}", entry.cache_file, e)))?;

        Ok(FetchedContent::new(String::from_utf8_lossy(&data).into_owned()))
    }

    /// 回傳快取中缺少的來源名稱
    pub async fn missing_sources<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>> {
        let manifest = self.load_manifest().await?;
        Ok(names
            .into_iter()
            .filter(|name| !manifest.sources.contains_key(*name))
            .map(str::to_string)
            .collect())
    }

    /// Fails with a cache error naming every source the cache cannot serve.
    pub async fn ensure_complete(&self, sources: &[SourceConfig]) -> Result<()> {
        if !self.exists().await {
            return Err(YahaError::CacheError {
                message: "no cache found".to_string(),
            });
        }

        let missing = self
            .missing_sources(sources.iter().map(|source| source.name.as_str()))
            .await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(YahaError::CacheError {
                message: format!("missing sources: {}", missing.join(", ")),
            })
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        if !self.exists().await {
            return Ok(CacheStats {
                exists: false,
                source_count: 0,
                cached_at: None,
            });
        }

        let manifest = self.load_manifest().await?;
        Ok(CacheStats {
            exists: true,
            source_count: manifest.sources.len(),
            cached_at: manifest.cached_at,
        })
    }
}

/// Serves sources from the local cache instead of the network.
pub struct CachedFetcher<S: Storage> {
    cache: SourceCache<S>,
}

impl<S: Storage> CachedFetcher<S> {
    pub fn new(cache: SourceCache<S>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<S: Storage> SourceFetcher for CachedFetcher<S> {
    async fn fetch(&self, source: &SourceConfig) -> std::result::Result<FetchedContent, FetchError> {
        self.cache.load(&source.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                YahaError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }
    }

    fn source(name: &str) -> SourceConfig {
        SourceConfig::new(name, format!("https://example.com/{}.txt", name))
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let storage = MockStorage::default();
        let cache = SourceCache::new(storage.clone());
        let content = FetchedContent::new("a.com\nb.com\n".to_string());

        cache.save(&source("one"), &content).await.unwrap();

        let file_name = cache_file_name("one");
        assert!(storage.files.lock().await.contains_key(&file_name));
        let loaded = cache.load("one").await.unwrap();
        assert_eq!(loaded, content);

        let manifest = cache.load_manifest().await.unwrap();
        assert_eq!(manifest.sources["one"].cache_file, file_name);
        assert_eq!(manifest.sources["one"].content_hash, content.content_hash);
        assert!(manifest.cached_at.is_some());
    }

    #[test]
    fn test_cache_file_name_is_keyed_by_source_name() {
        let name = cache_file_name("Ads List");
        assert!(name.starts_with("source_ads_list_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name, cache_file_name("Ads List"));
        assert_ne!(name, cache_file_name("ads-list"));
    }

    #[tokio::test]
    async fn test_reordered_sources_keep_their_own_content() {
        let cache = SourceCache::new(MockStorage::default());
        let first = FetchedContent::new("first.com\n".to_string());
        let second = FetchedContent::new("second.com\n".to_string());
        cache.save(&source("first"), &first).await.unwrap();
        cache.save(&source("second"), &second).await.unwrap();

        // A later run refreshes only "second", e.g. after an earlier source was purged
        let refreshed = FetchedContent::new("second.net\n".to_string());
        cache.save(&source("second"), &refreshed).await.unwrap();

        assert_eq!(cache.load("first").await.unwrap(), first);
        assert_eq!(cache.load("second").await.unwrap(), refreshed);
    }

    #[tokio::test]
    async fn test_load_unknown_source_is_cache_miss() {
        let cache = SourceCache::new(MockStorage::default());
        let err = cache.load("nope").await.unwrap_err();
        assert!(matches!(err, FetchError::CacheMiss { .. }));
    }

    #[tokio::test]
    async fn test_ensure_complete_names_missing_sources() {
        let cache = SourceCache::new(MockStorage::default());
        assert!(matches!(
            cache.ensure_complete(&[source("one")]).await,
            Err(YahaError::CacheError { .. })
        ));

        let content = FetchedContent::new("a.com\n".to_string());
        cache.save(&source("one"), &content).await.unwrap();

        assert!(cache.ensure_complete(&[source("one")]).await.is_ok());
        let err = cache
            .ensure_complete(&[source("one"), source("two")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("two"));
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = SourceCache::new(MockStorage::default());
        let stats = cache.stats().await.unwrap();
        assert!(!stats.exists);
        assert_eq!(stats.source_count, 0);

        let content = FetchedContent::new("a.com\n".to_string());
        cache.save(&source("one"), &content).await.unwrap();
        cache.save(&source("two"), &content).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert!(stats.exists);
        assert_eq!(stats.source_count, 2);
    }

    #[tokio::test]
    async fn test_cached_fetcher_serves_cached_content() {
        let cache = SourceCache::new(MockStorage::default());
        let content = FetchedContent::new("||ads.example.com^\n".to_string());
        cache.save(&source("one"), &content).await.unwrap();

        let fetcher = CachedFetcher::new(cache);
        assert_eq!(fetcher.fetch(&source("one")).await.unwrap(), content);
        assert!(fetcher.fetch(&source("two")).await.is_err());
    }
}
