//! README statistics: badges, per-source tables and acknowledgments, written
//! between HTML comment markers.

use super::hosts::{format_count, format_thousands};
use crate::config::sources::SourceConfig;
use crate::domain::model::{AggregateSummary, ContributionCounters};
use crate::utils::error::Result;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

const STATS_START: &str = "<!-- STATS_START -->";
const STATS_END: &str = "<!-- STATS_END -->";
const ACK_START: &str = "<!-- ACKNOWLEDGMENTS_START -->";
const ACK_END: &str = "<!-- ACKNOWLEDGMENTS_END -->";

static GENERAL_COUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Use `hosts` for general protection \(~)[^)]+(\))").expect("valid general count pattern")
});

static ALL_COUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Use `hosts_nsfw` for all the same domains in `hosts` \*\*\*plus\*\*\* adult content \(\*\*~)[^)]+(\*\*\))",
    )
    .expect("valid all count pattern")
});

pub struct ReadmeStats<'a> {
    pub sources: &'a [SourceConfig],
    pub source_counts: &'a BTreeMap<String, u64>,
    pub summary: &'a AggregateSummary,
    pub last_update: &'a str,
}

/// Returns `false` (after a warning) when the README or its markers are missing.
pub fn update_readme(path: &Path, stats: &ReadmeStats<'_>) -> Result<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("⚠️ {} not found, skipping statistics", path.display());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    match render_readme(&content, stats) {
        Some(updated) => {
            std::fs::write(path, updated)?;
            tracing::info!("📝 Updated {} with statistics tables", path.display());
            Ok(true)
        }
        None => {
            tracing::warn!("⚠️ {} is missing stats markers", path.display());
            Ok(false)
        }
    }
}

pub fn render_readme(content: &str, stats: &ReadmeStats<'_>) -> Option<String> {
    let general = format!("${{1}}{} domains${{2}}", format_count(stats.summary.primary_count));
    let all = format!("${{1}}{} domains${{2}}", format_count(stats.summary.all_count));
    let content = GENERAL_COUNT_PATTERN.replace_all(content, general.as_str());
    let content = ALL_COUNT_PATTERN.replace_all(&content, all.as_str());

    let content = replace_between(&content, STATS_START, STATS_END, &stats_section(stats))?;

    let acknowledgments = format!(
        "{}\n\nThanks to the maintainers of all source blocklists:\n\n{}\n\n{}",
        ACK_START,
        build_acknowledgments(stats.sources),
        ACK_END
    );
    Some(replace_between(&content, ACK_START, ACK_END, &acknowledgments).unwrap_or(content))
}

/// 以 `replacement` 取代 start..=end 標記區塊
fn replace_between(content: &str, start: &str, end: &str, replacement: &str) -> Option<String> {
    let start_idx = content.find(start)?;
    let end_idx = content[start_idx..].find(end)? + start_idx;
    Some(format!(
        "{}{}{}",
        &content[..start_idx],
        replacement,
        &content[end_idx + end.len()..]
    ))
}

fn stats_section(stats: &ReadmeStats<'_>) -> String {
    let general_sources: Vec<&SourceConfig> = stats.sources.iter().filter(|s| !s.nsfw).collect();
    let nsfw_sources: Vec<&SourceConfig> = stats.sources.iter().filter(|s| s.nsfw).collect();

    let general_table = build_table(&general_sources, stats.source_counts, &stats.summary.contrib_primary);
    let nsfw_table = build_table(&nsfw_sources, stats.source_counts, &stats.summary.contrib_all);

    let general_total = format_thousands(stats.summary.primary_count);
    let all_total = format_thousands(stats.summary.all_count);

    format!(
        r#"{start}

## Latest Run

<div align="center">

![General Domains](https://img.shields.io/badge/General_Domains-{general_total}-8be9fd?style=for-the-badge&labelColor=6272a4)
![Total Domains](https://img.shields.io/badge/Total_Domains_(with_NSFW)-{all_total}-ff79c6?style=for-the-badge&labelColor=6272a4)
![Last Updated](https://img.shields.io/badge/Last_Updated-{badge}-50fa7b?style=for-the-badge&labelColor=6272a4)

### General Protection Lists

{general_table}

### NSFW Blocking Lists

{nsfw_table}

</div>

> [!NOTE]
> **Unique Contribution** shows how many domains would disappear if that source were removed.
> Sources with low unique counts (~50 or less) provide minimal value.

{end}"#,
        start = STATS_START,
        end = STATS_END,
        badge = last_update_badge(stats.last_update),
    )
}

/// shields.io 以 `--` 表示字面上的 `-`，以 `_` 表示空白
fn last_update_badge(last_update: &str) -> String {
    let parts: Vec<&str> = last_update.split_whitespace().collect();
    match parts.as_slice() {
        [date, time, zone] => format!("{}_{}_{}", date.replace('-', "--"), time, zone),
        _ => last_update.replace(' ', "_").replace('-', "--"),
    }
}

/// Sources ranked by unique contribution, highest first.
fn build_table(
    sources: &[&SourceConfig],
    source_counts: &BTreeMap<String, u64>,
    contributions: &ContributionCounters,
) -> String {
    let mut ranked = sources.to_vec();
    ranked.sort_by_key(|source| std::cmp::Reverse(contributions.get(&source.name)));

    let rows: Vec<String> = ranked
        .iter()
        .map(|source| {
            let total = source_counts.get(&source.name).copied().unwrap_or(0);
            format!(
                "<tr><td><a href='{}'>{}</a></td><td>{}</td><td>{}</td></tr>",
                source.url,
                source.name,
                format_thousands(total),
                format_thousands(contributions.get(&source.name))
            )
        })
        .collect();

    format!(
        "<table align=\"center\">\n<thead>\n<tr>\n<th>Source List</th>\n<th>Total Domains</th>\n<th>Unique Contribution</th>\n</tr>\n</thead>\n<tbody>\n{}\n</tbody>\n</table>",
        rows.join("\n")
    )
}

/// One line per maintainer, first occurrence wins, sorted by name.
pub fn build_acknowledgments(sources: &[SourceConfig]) -> String {
    let mut maintainers = BTreeMap::new();
    for (name, url, description) in sources.iter().filter_map(SourceConfig::maintainer) {
        maintainers.entry(name).or_insert((url, description));
    }

    if maintainers.is_empty() {
        return "No maintainer information available.".to_string();
    }

    maintainers
        .iter()
        .map(|(name, (url, description))| format!("- [{}]({}) - {}", name, url, description))
        .collect::<Vec<_>>()
        .join("\n")
}
