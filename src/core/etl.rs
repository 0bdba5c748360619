use crate::adapters::hosts::{HOSTS_ALL_FILE, HOSTS_FILE};
use crate::config::sources::SourceConfig;
use crate::domain::model::CompileReport;
use crate::domain::ports::{CompileDecision, ConfigProvider, Pipeline};
use crate::utils::error::Result;

#[derive(Debug)]
pub enum RunOutcome {
    Compiled(CompileReport),
    Skipped,
}

pub struct CompileEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> CompileEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        // Extract
        tracing::info!("🌐 Fetching sources and computing hashes...");
        let extracted = self.pipeline.extract().await?;
        if !extracted.failed_sources.is_empty() {
            tracing::warn!(
                "⚠️ {} source(s) failed: {}",
                extracted.failed_sources.len(),
                extracted.failed_sources.join(", ")
            );
        }

        match self.pipeline.decide(&extracted).await {
            CompileDecision::Skip => {
                tracing::info!("⏭️ No changes detected - skipping compilation");
                self.pipeline.skip(extracted).await?;
                return Ok(RunOutcome::Skipped);
            }
            CompileDecision::Forced => tracing::warn!("⚡ Forcing compilation (--force flag)"),
            CompileDecision::CompileOnly => tracing::info!("💾 Compiling from cached sources (--compile-only)"),
            CompileDecision::Scheduled => tracing::warn!("⚡ Forcing compilation (weekly schedule)"),
            CompileDecision::Purged => tracing::warn!("⚡ Compiling due to purged sources"),
            CompileDecision::Changed => tracing::info!("🔄 Changes detected - proceeding with compilation"),
        }

        // Transform
        tracing::info!("🔀 Processing through sort → group-by pipeline...");
        let aggregated = self.pipeline.transform(extracted).await?;

        // Load
        tracing::info!("📝 Generating hosts files...");
        let report = self.pipeline.load(aggregated).await?;

        Ok(RunOutcome::Compiled(report))
    }
}

/// 乾跑模式：列出將執行的動作，不做任何抓取
pub fn dry_run_plan<C: ConfigProvider>(sources: &[SourceConfig], config: &C, compile_only: bool) -> Vec<String> {
    let mode = if compile_only { "cache" } else { "network" };
    let mut plan = vec![format!(
        "Would fetch {} source(s) from {} with up to {} workers:",
        sources.len(),
        mode,
        config.max_workers()
    )];

    for source in sources {
        let category = if source.is_primary_category() { "general" } else { "nsfw" };
        let preserve = if source.preserve { ", preserved" } else { "" };
        plan.push(format!("  - {} [{}{}] {}", source.name, category, preserve, source.url));
    }

    plan.push(format!("Work files under {}", config.work_dir().display()));
    plan.push(format!(
        "Outputs: {}, {}",
        config.output_dir().join(HOSTS_FILE).display(),
        config.output_dir().join(HOSTS_ALL_FILE).display()
    ));
    plan.push(format!("README: {}", config.readme_path().display()));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::RunConfig;
    use crate::domain::model::{AggregateSummary, Aggregated, Extracted, SourceRegistry};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct MockPipeline {
        decision: CompileDecision,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockPipeline {
        fn new(decision: CompileDecision) -> Self {
            Self {
                decision,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for MockPipeline {
        async fn extract(&self) -> Result<Extracted> {
            self.record("extract");
            Ok(Extracted {
                registry: SourceRegistry::from_names(["Source1"]),
                source_counts: BTreeMap::from([("Source1".to_string(), 1)]),
                failed_sources: vec![],
                any_changed: self.decision == CompileDecision::Changed,
            })
        }

        async fn decide(&self, _extracted: &Extracted) -> CompileDecision {
            self.record("decide");
            self.decision
        }

        async fn skip(&self, _extracted: Extracted) -> Result<()> {
            self.record("skip");
            Ok(())
        }

        async fn transform(&self, extracted: Extracted) -> Result<Aggregated> {
            self.record("transform");
            Ok(Aggregated {
                summary: AggregateSummary {
                    all_count: 1,
                    primary_count: 1,
                    ..AggregateSummary::default()
                },
                source_counts: extracted.source_counts,
                domains_all_path: PathBuf::from("temp_domains_all.txt"),
                domains_primary_path: PathBuf::from("temp_domains_general.txt"),
            })
        }

        async fn load(&self, aggregated: Aggregated) -> Result<CompileReport> {
            self.record("load");
            Ok(CompileReport {
                summary: aggregated.summary,
                source_counts: aggregated.source_counts,
                hosts_path: PathBuf::from("blocklists/hosts"),
                hosts_all_path: PathBuf::from("blocklists/hosts_nsfw"),
                timestamp: "2024-03-06 12:00:00 UTC".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_skip_stops_after_decision() {
        let engine = CompileEngine::new(MockPipeline::new(CompileDecision::Skip));

        let outcome = engine.run().await.unwrap();

        assert!(matches!(outcome, RunOutcome::Skipped));
        assert_eq!(engine.pipeline().calls(), vec!["extract", "decide", "skip"]);
    }

    #[tokio::test]
    async fn test_every_compile_reason_runs_all_stages() {
        for decision in [
            CompileDecision::Changed,
            CompileDecision::Forced,
            CompileDecision::CompileOnly,
            CompileDecision::Scheduled,
            CompileDecision::Purged,
        ] {
            let engine = CompileEngine::new(MockPipeline::new(decision));

            let outcome = engine.run().await.unwrap();

            let RunOutcome::Compiled(report) = outcome else {
                panic!("expected a compilation for {:?}", decision);
            };
            assert_eq!(report.summary.all_count, 1);
            assert_eq!(
                engine.pipeline().calls(),
                vec!["extract", "decide", "transform", "load"]
            );
        }
    }

    #[test]
    fn test_dry_run_plan_lists_sources() {
        let sources = vec![
            SourceConfig::new("General", "https://example.com/general.txt"),
            SourceConfig::new("Adult", "https://example.com/adult.txt")
                .nsfw(true)
                .preserve(true),
        ];

        let plan = dry_run_plan(&sources, &RunConfig::default(), true);

        assert!(plan[0].contains("2 source(s) from cache"));
        assert!(plan.contains(&"  - General [general] https://example.com/general.txt".to_string()));
        assert!(plan.contains(&"  - Adult [nsfw, preserved] https://example.com/adult.txt".to_string()));
    }
}
