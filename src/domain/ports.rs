use crate::config::sources::SourceConfig;
use crate::domain::model::{Aggregated, CompileReport, Extracted, FetchedContent};
use crate::utils::error::{FetchError, Result};
use async_trait::async_trait;
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_dir(&self) -> &Path;
    fn work_dir(&self) -> &Path;
    fn readme_path(&self) -> &Path;
    fn state_path(&self) -> &Path;
    fn max_workers(&self) -> usize;
    fn sort_chunk_records(&self) -> usize;
    fn force_interval_hours(&self) -> i64;
}

/// 取得單一來源的內容（網路或快取）
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> std::result::Result<FetchedContent, FetchError>;
}

/// Whitelist predicate consulted once per distinct domain.
pub trait DomainFilter {
    fn is_whitelisted(&self, domain: &str) -> bool;
}

impl<F> DomainFilter for F
where
    F: Fn(&str) -> bool,
{
    fn is_whitelisted(&self, domain: &str) -> bool {
        self(domain)
    }
}

/// Whether the extract stage found a reason to run the full compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileDecision {
    Changed,
    Forced,
    CompileOnly,
    Scheduled,
    Purged,
    Skip,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extracted>;
    async fn decide(&self, extracted: &Extracted) -> CompileDecision;
    async fn skip(&self, extracted: Extracted) -> Result<()>;
    async fn transform(&self, extracted: Extracted) -> Result<Aggregated>;
    async fn load(&self, aggregated: Aggregated) -> Result<CompileReport>;
}
