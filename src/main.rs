use clap::Parser;
use std::time::Duration;
use yaha::adapters::{ensure_psl_and_load, load_local_psl, CachedFetcher, HttpFetcher, LocalStorage, SourceCache};
use yaha::config::{load_sources, save_sources, CliArgs, Whitelist};
use yaha::core::etl::{dry_run_plan, CompileEngine, RunOutcome};
use yaha::core::Pipeline;
use yaha::domain::state::CompilationState;
use yaha::utils::{logger, validation::Validate};
use yaha::{BlocklistPipeline, RunOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 YAHA - Yet Another Host Aggregator");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Compilation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(args: &CliArgs) -> yaha::Result<()> {
    args.validate()?;
    let config = args.load_run_config()?;
    let now = chrono::Utc::now();

    tracing::info!("📂 Loading state from previous run...");
    let mut state = CompilationState::load(&config.paths.state);
    let previous = if state.last_compilation.is_empty() {
        "Never"
    } else {
        state.last_compilation.as_str()
    };
    tracing::info!(
        "   Previous compilation: {} (total {}, skipped {})",
        previous,
        state.compilation_count,
        state.skipped_compilations
    );

    let sources = load_sources(&config.paths.sources)?;
    tracing::info!("📋 Loaded {} source(s)", sources.len());

    if args.dry_run {
        for line in dry_run_plan(&sources, &config, args.compile_only) {
            println!("{}", line);
        }
        return Ok(());
    }

    let (sources, purge_occurred) =
        state.check_stale_sources(sources, now, config.policy.stale_threshold_days);
    if purge_occurred {
        save_sources(&sources, &config.paths.sources)?;
        tracing::info!("🗑️ Active sources after purge: {}", sources.len());
    } else {
        tracing::info!("✔️ No stale sources found");
    }

    let whitelist = Whitelist::load(&config.paths.whitelist)?;
    if !whitelist.is_empty() {
        tracing::info!(
            "🛡️ Whitelist: {} exact, {} wildcard(s)",
            whitelist.exact_count(),
            whitelist.wildcard_count()
        );
    }

    let http = HttpFetcher::new(Duration::from_secs(config.fetch.timeout_seconds))?;
    // 僅編譯模式不連網，PSL 只能用本機副本
    let rules = if args.compile_only {
        load_local_psl(&config.paths.psl)?
    } else {
        ensure_psl_and_load(&http, &config.paths.psl, &config.fetch.psl_url, config.policy.psl_stale_days).await?
    };

    let cache = SourceCache::new(LocalStorage::new(&config.paths.cache_dir));
    let options = RunOptions {
        force: args.force,
        purge_occurred,
        compile_only: args.compile_only,
    };

    if args.compile_only {
        cache.ensure_complete(&sources).await?;
        let stats = cache.stats().await?;
        tracing::info!(
            "💾 Compiling from cache: {} source(s), cached at {}",
            stats.source_count,
            stats.cached_at.as_deref().unwrap_or("unknown")
        );

        let pipeline = BlocklistPipeline::new(
            CachedFetcher::new(cache),
            config,
            sources,
            rules,
            whitelist,
            state,
            None::<SourceCache<LocalStorage>>,
            options,
        );
        run_engine(pipeline).await
    } else {
        let pipeline = BlocklistPipeline::new(
            http,
            config,
            sources,
            rules,
            whitelist,
            state,
            Some(cache),
            options,
        );
        run_engine(pipeline).await
    }
}

async fn run_engine<P: Pipeline>(pipeline: P) -> yaha::Result<()> {
    let engine = CompileEngine::new(pipeline);

    match engine.run().await? {
        RunOutcome::Compiled(report) => {
            tracing::info!("✅ Compilation complete");
            println!(
                "✅ {} general / {} total domains written to {} and {}",
                report.summary.primary_count,
                report.summary.all_count,
                report.hosts_path.display(),
                report.hosts_all_path.display()
            );
        }
        RunOutcome::Skipped => {
            println!("⏭️ No changes detected - compilation skipped");
        }
    }

    Ok(())
}
