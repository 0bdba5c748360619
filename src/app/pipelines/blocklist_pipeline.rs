use crate::adapters::cache::SourceCache;
use crate::adapters::hosts::{build_header, write_hosts_from_file, HOSTS_ALL_FILE, HOSTS_FILE, TIMESTAMP_FORMAT};
use crate::adapters::readme::{update_readme, ReadmeStats};
use crate::config::sources::SourceConfig;
use crate::config::whitelist::Whitelist;
use crate::core::extract::DomainExtractor;
use crate::core::pipeline::{aggregate_staging, PipelineFiles};
use crate::core::psl::PublicSuffixRuleSet;
use crate::core::staging::StagingWriter;
use crate::domain::model::{AnnotatedDomainRecord, Aggregated, CompileReport, Extracted, FetchedContent, SourceRegistry};
use crate::domain::ports::{CompileDecision, ConfigProvider, Pipeline, SourceFetcher, Storage};
use crate::domain::state::CompilationState;
use crate::utils::error::{FetchError, Result, YahaError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Run-level switches decided before the pipeline starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub force: bool,
    pub purge_occurred: bool,
    /// 內容來自本機快取：一定編譯，且不更新來源的抓取紀錄
    pub compile_only: bool,
}

/// 抓取、正規化、彙整並輸出 hosts 檔的完整編譯流程
pub struct BlocklistPipeline<F, C, S>
where
    F: SourceFetcher + 'static,
    C: ConfigProvider,
    S: Storage,
{
    fetcher: Arc<F>,
    config: C,
    sources: Vec<SourceConfig>,
    rules: PublicSuffixRuleSet,
    whitelist: Whitelist,
    state: Mutex<CompilationState>,
    cache: Option<SourceCache<S>>,
    options: RunOptions,
    files: PipelineFiles,
    now: DateTime<Utc>,
}

impl<F, C, S> BlocklistPipeline<F, C, S>
where
    F: SourceFetcher + 'static,
    C: ConfigProvider,
    S: Storage,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: F,
        config: C,
        sources: Vec<SourceConfig>,
        rules: PublicSuffixRuleSet,
        whitelist: Whitelist,
        state: CompilationState,
        cache: Option<SourceCache<S>>,
        options: RunOptions,
    ) -> Self {
        let files = PipelineFiles::create(config.work_dir());
        Self {
            fetcher: Arc::new(fetcher),
            config,
            sources,
            rules,
            whitelist,
            state: Mutex::new(state),
            cache,
            options,
            files,
            now: Utc::now(),
        }
    }

    /// Pins the clock, for reproducible timestamps and schedules.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn files(&self) -> &PipelineFiles {
        &self.files
    }

    pub async fn state(&self) -> CompilationState {
        self.state.lock().await.clone()
    }

    async fn save_state(&self) -> Result<()> {
        let state = self.state.lock().await;
        state.save(self.config.state_path())
    }

    /// 同時抓取所有來源，數量受 max_workers 限制；結果依完成順序回傳
    fn spawn_fetches(&self) -> JoinSet<(u32, std::result::Result<FetchedContent, FetchError>)> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers().max(1)));
        let mut tasks = JoinSet::new();

        for (index, source) in self.sources.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let source = source.clone();
            let source_id = index as u32;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (source_id, fetcher.fetch(&source).await)
            });
        }

        tasks
    }

    /// Writes the source's domains to the staging log and returns how many it had.
    fn stage_domains(
        &self,
        writer: &mut StagingWriter<BufWriter<File>>,
        source_id: u32,
        source: &SourceConfig,
        content: &FetchedContent,
    ) -> Result<u64> {
        let extractor = DomainExtractor::normalized(&self.rules);
        let is_primary = source.is_primary_category();

        let mut count = 0;
        for domain in extractor.extract(content.lines()) {
            writer.write(&AnnotatedDomainRecord::new(domain, source_id, is_primary))?;
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<F, C, S> Pipeline for BlocklistPipeline<F, C, S>
where
    F: SourceFetcher + 'static,
    C: ConfigProvider,
    S: Storage,
{
    async fn extract(&self) -> Result<Extracted> {
        std::fs::create_dir_all(self.config.work_dir())?;

        let staging = BufWriter::new(File::create(&self.files.annotated)?);
        let mut writer = StagingWriter::new(staging);
        let mut source_counts = BTreeMap::new();
        let mut failed_sources = Vec::new();
        let mut any_changed = false;

        let mut tasks = self.spawn_fetches();

        while let Some(joined) = tasks.join_next().await {
            let (source_id, result) =
                joined.map_err(|e| YahaError::processing("fetch", e.to_string()))?;
            let source = &self.sources[source_id as usize];
            let nsfw_tag = if source.nsfw { " [NSFW]" } else { "" };

            let content = match result {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("⚠️ {}{}: {}", source.name, nsfw_tag, e);
                    source_counts.insert(source.name.clone(), 0);
                    failed_sources.push(source.name.clone());
                    continue;
                }
            };

            if self.options.compile_only {
                tracing::info!("💾 {}{}: loaded from cache", source.name, nsfw_tag);
            } else {
                let changed = self
                    .state
                    .lock()
                    .await
                    .update_source_state(source, &content.content_hash, self.now);
                if changed {
                    tracing::info!("🔄 {}{}: content changed", source.name, nsfw_tag);
                    any_changed = true;
                } else {
                    tracing::info!("✔️ {}{}: content unchanged", source.name, nsfw_tag);
                }
            }

            if let Some(cache) = &self.cache {
                if let Err(e) = cache.save(source, &content).await {
                    tracing::warn!("⚠️ Could not cache {}: {}", source.name, e);
                }
            }

            let count = self.stage_domains(&mut writer, source_id, source, &content)?;
            tracing::info!("   → Found {} domains in {}", count, source.name);
            source_counts.insert(source.name.clone(), count);
        }

        let staged = writer.written();
        writer.finish()?;
        tracing::debug!("Staged {} annotated records", staged);

        Ok(Extracted {
            registry: SourceRegistry::from_sources(&self.sources),
            source_counts,
            failed_sources,
            any_changed,
        })
    }

    async fn decide(&self, extracted: &Extracted) -> CompileDecision {
        let scheduled = self
            .state
            .lock()
            .await
            .should_force_compile(self.now, self.config.force_interval_hours());

        if self.options.force {
            CompileDecision::Forced
        } else if self.options.compile_only {
            CompileDecision::CompileOnly
        } else if scheduled {
            CompileDecision::Scheduled
        } else if self.options.purge_occurred {
            CompileDecision::Purged
        } else if extracted.any_changed {
            CompileDecision::Changed
        } else {
            CompileDecision::Skip
        }
    }

    async fn skip(&self, _extracted: Extracted) -> Result<()> {
        self.state.lock().await.record_skip();
        self.files.cleanup()?;
        self.save_state().await
    }

    async fn transform(&self, extracted: Extracted) -> Result<Aggregated> {
        let files = self.files.clone();
        let registry = extracted.registry;
        let whitelist = self.whitelist.clone();
        let chunk_records = self.config.sort_chunk_records();

        let summary = tokio::task::spawn_blocking(move || {
            aggregate_staging(&files, &registry, &whitelist, chunk_records)
        })
        .await
        .map_err(|e| YahaError::processing("group-by", e.to_string()))??;

        tracing::info!("📦 Total unique domains (general): {}", summary.primary_count);
        tracing::info!("📦 Total unique domains (all with NSFW): {}", summary.all_count);
        if summary.whitelisted_count > 0 {
            tracing::info!("🛡️ Whitelisted domains (filtered): {}", summary.whitelisted_count);
        }

        Ok(Aggregated {
            summary,
            source_counts: extracted.source_counts,
            domains_all_path: self.files.domains_all.clone(),
            domains_primary_path: self.files.domains_primary.clone(),
        })
    }

    async fn load(&self, aggregated: Aggregated) -> Result<CompileReport> {
        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(output_dir)?;

        let timestamp = self.now.format(TIMESTAMP_FORMAT).to_string();
        let summary = &aggregated.summary;

        let hosts_path = output_dir.join(HOSTS_FILE);
        let hosts_all_path = output_dir.join(HOSTS_ALL_FILE);

        let primary_header = build_header(
            "GENERAL - No NSFW",
            summary.primary_count,
            self.sources.iter().filter(|source| source.is_primary_category()),
            &aggregated.source_counts,
            &timestamp,
        );
        let all_header = build_header(
            "INCLUDING NSFW",
            summary.all_count,
            &self.sources,
            &aggregated.source_counts,
            &timestamp,
        );

        let written = write_hosts_from_file(&aggregated.domains_primary_path, &hosts_path, &primary_header)?;
        tracing::info!("✅ Wrote {} domains to {}", written, hosts_path.display());
        let written = write_hosts_from_file(&aggregated.domains_all_path, &hosts_all_path, &all_header)?;
        tracing::info!("✅ Wrote {} domains to {}", written, hosts_all_path.display());

        update_readme(
            self.config.readme_path(),
            &ReadmeStats {
                sources: &self.sources,
                source_counts: &aggregated.source_counts,
                summary,
                last_update: &timestamp,
            },
        )?;

        self.files.cleanup()?;
        self.state.lock().await.record_compilation(self.now);
        self.save_state().await?;

        Ok(CompileReport {
            summary: aggregated.summary,
            source_counts: aggregated.source_counts,
            hosts_path,
            hosts_all_path,
            timestamp,
        })
    }
}
