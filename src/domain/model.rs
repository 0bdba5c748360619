use crate::config::sources::SourceConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 暫存紀錄：一個來源列出的一個網域
///
/// Field order is the staging sort order: domain, then numeric source id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnnotatedDomainRecord {
    pub domain: String,
    pub source_id: u32,
    pub is_primary_category: bool,
}

impl AnnotatedDomainRecord {
    pub fn new(domain: impl Into<String>, source_id: u32, is_primary_category: bool) -> Self {
        Self {
            domain: domain.into(),
            source_id,
            is_primary_category,
        }
    }
}

/// Maps source ids (index in the active source list) to source names.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    names: Vec<String>,
}

impl SourceRegistry {
    pub fn from_sources(sources: &[SourceConfig]) -> Self {
        Self::from_names(sources.iter().map(|source| source.name.as_str()))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self, source_id: u32) -> Option<&str> {
        self.names.get(source_id as usize).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Count of domains for which a source was the sole contributor within one aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContributionCounters {
    counts: BTreeMap<String, u64>,
}

impl ContributionCounters {
    pub fn zeroed<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            counts: names.into_iter().map(|name| (name.to_string(), 0)).collect(),
        }
    }

    pub fn increment(&mut self, name: &str) {
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Result of one sort + group-by pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    pub all_count: u64,
    pub primary_count: u64,
    pub whitelisted_count: u64,
    pub contrib_all: ContributionCounters,
    pub contrib_primary: ContributionCounters,
}

/// 抓取結果：內容雜湊與原始文字
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub content_hash: String,
    pub body: String,
}

impl FetchedContent {
    pub fn new(body: String) -> Self {
        Self {
            content_hash: content_hash(&body),
            body,
        }
    }

    /// Lines split on `\n` with a trailing `\r` removed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.body
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }
}

/// Lowercase hex SHA-256 of the content.
pub fn content_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of the extract stage: staging log written, per-source counts known.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub registry: SourceRegistry,
    pub source_counts: BTreeMap<String, u64>,
    pub failed_sources: Vec<String>,
    pub any_changed: bool,
}

/// Outcome of the transform stage: deduplicated domain files and statistics.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub summary: AggregateSummary,
    pub source_counts: BTreeMap<String, u64>,
    pub domains_all_path: PathBuf,
    pub domains_primary_path: PathBuf,
}

/// What a completed compilation produced.
#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub summary: AggregateSummary,
    pub source_counts: BTreeMap<String, u64>,
    pub hosts_path: PathBuf,
    pub hosts_all_path: PathBuf,
    pub timestamp: String,
}
