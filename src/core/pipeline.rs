use crate::core::aggregate::group_sorted;
use crate::core::sort::ExternalSorter;
use crate::domain::model::{AggregateSummary, SourceRegistry};
use crate::domain::ports::DomainFilter;
use crate::utils::error::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// 編譯過程中的暫存檔路徑
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFiles {
    pub annotated: PathBuf,
    pub sorted: PathBuf,
    pub domains_all: PathBuf,
    pub domains_primary: PathBuf,
}

impl PipelineFiles {
    pub fn create(base_dir: &Path) -> Self {
        Self {
            annotated: base_dir.join("temp_annotated.txt"),
            sorted: base_dir.join("temp_sorted.txt"),
            domains_all: base_dir.join("temp_domains_all.txt"),
            domains_primary: base_dir.join("temp_domains_general.txt"),
        }
    }

    fn all(&self) -> [&Path; 4] {
        [
            &self.annotated,
            &self.sorted,
            &self.domains_all,
            &self.domains_primary,
        ]
    }

    /// Removes every work file; files that do not exist are ignored.
    pub fn cleanup(&self) -> Result<()> {
        for path in self.all() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Sorts the annotated staging log and runs the group-by into the two domain files.
pub fn aggregate_staging<F: DomainFilter + ?Sized>(
    files: &PipelineFiles,
    registry: &SourceRegistry,
    whitelist: &F,
    chunk_records: usize,
) -> Result<AggregateSummary> {
    let temp_dir = files
        .sorted
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    tracing::info!("🔀 Sorting annotated stream...");
    let stats = ExternalSorter::new(chunk_records, temp_dir).sort_file(&files.annotated, &files.sorted)?;
    tracing::debug!(
        "Sorted {} records ({} malformed skipped, {} runs)",
        stats.records,
        stats.skipped,
        stats.runs
    );

    tracing::info!("📊 Streaming group-by with contribution calculation...");
    let sorted = BufReader::new(File::open(&files.sorted)?);
    let all_out = BufWriter::new(File::create(&files.domains_all)?);
    let primary_out = BufWriter::new(File::create(&files.domains_primary)?);

    group_sorted(sorted, registry, whitelist, all_out, primary_out)
}
