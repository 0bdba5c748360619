//! Compilation history: per-source content hashes, change dates and counters.

use crate::config::sources::SourceConfig;
use crate::utils::error::Result;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const FORCE_INTERVAL_HOURS: i64 = 168;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceState {
    pub url: String,
    pub content_hash: String,
    pub last_fetch_date: String,
    pub last_changed_date: String,
    pub fetch_count: u64,
    pub change_count: u64,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilationState {
    pub sources: BTreeMap<String, SourceState>,
    pub last_compilation: String,
    pub compilation_count: u64,
    pub skipped_compilations: u64,
}

/// 舊版狀態檔使用 `lists` 作為鍵
#[derive(Deserialize)]
struct StoredState {
    #[serde(default)]
    sources: BTreeMap<String, SourceState>,
    #[serde(default)]
    lists: BTreeMap<String, SourceState>,
    #[serde(default)]
    last_compilation: String,
    #[serde(default)]
    compilation_count: u64,
    #[serde(default)]
    skipped_compilations: u64,
}

impl From<StoredState> for CompilationState {
    fn from(stored: StoredState) -> Self {
        let sources = if stored.sources.is_empty() {
            stored.lists
        } else {
            stored.sources
        };
        Self {
            sources,
            last_compilation: stored.last_compilation,
            compilation_count: stored.compilation_count,
            skipped_compilations: stored.skipped_compilations,
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl CompilationState {
    /// Missing or unreadable state starts fresh.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("⚠️ Cannot read {}: {}; starting fresh", path.display(), e);
                }
                return Self::default();
            }
        };

        match serde_json::from_str::<StoredState>(&content) {
            Ok(stored) => stored.into(),
            Err(e) => {
                tracing::warn!("⚠️ Corrupt state file {}: {}; starting fresh", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Records a fetch. Returns whether the content changed; a source seen for
    /// the first time counts as changed.
    pub fn update_source_state(
        &mut self,
        source: &SourceConfig,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let timestamp = now.to_rfc3339();

        match self.sources.get_mut(&source.name) {
            Some(existing) => {
                let changed = existing.content_hash != content_hash;
                existing.last_fetch_date = timestamp.clone();
                existing.fetch_count += 1;

                if changed {
                    existing.content_hash = content_hash.to_string();
                    existing.last_changed_date = timestamp;
                    existing.change_count += 1;
                }
                changed
            }
            None => {
                self.sources.insert(
                    source.name.clone(),
                    SourceState {
                        url: source.url.clone(),
                        content_hash: content_hash.to_string(),
                        last_fetch_date: timestamp.clone(),
                        last_changed_date: timestamp,
                        fetch_count: 1,
                        change_count: 1,
                        metadata: BTreeMap::new(),
                    },
                );
                true
            }
        }
    }

    /// Drops sources whose content has not changed for more than
    /// `threshold_days`, unless marked `preserve`. Returns the remaining
    /// sources and whether anything was purged.
    pub fn check_stale_sources(
        &mut self,
        sources: Vec<SourceConfig>,
        now: DateTime<Utc>,
        threshold_days: i64,
    ) -> (Vec<SourceConfig>, bool) {
        let mut active = Vec::with_capacity(sources.len());
        let mut purged = false;

        for source in sources {
            if source.preserve {
                active.push(source);
                continue;
            }

            let last_changed = self
                .sources
                .get(&source.name)
                .and_then(|state| parse_timestamp(&state.last_changed_date));

            if let Some(last_changed) = last_changed {
                let days_stale = (now - last_changed).num_days();
                if days_stale > threshold_days {
                    tracing::warn!(
                        "🗑️ Purging stale source: {} (no updates for {} days, threshold: {})",
                        source.name,
                        days_stale,
                        threshold_days
                    );
                    self.sources.remove(&source.name);
                    purged = true;
                    continue;
                }
            }

            active.push(source);
        }

        (active, purged)
    }

    /// 首次執行、時間戳無效、超過間隔或週日 00 時 (UTC) 強制編譯
    pub fn should_force_compile(&self, now: DateTime<Utc>, interval_hours: i64) -> bool {
        if self.last_compilation.is_empty() {
            return true;
        }

        let Some(last_compile) = parse_timestamp(&self.last_compilation) else {
            return true;
        };

        let hours_since = (now - last_compile).num_hours();
        let is_sunday_midnight = now.weekday() == Weekday::Sun && now.hour() == 0;

        hours_since >= interval_hours || is_sunday_midnight
    }

    pub fn record_compilation(&mut self, now: DateTime<Utc>) {
        self.last_compilation = now.to_rfc3339();
        self.compilation_count += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped_compilations += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn source(name: &str) -> SourceConfig {
        SourceConfig::new(name, format!("https://example.com/{}.txt", name))
    }

    #[test]
    fn test_new_source_counts_as_changed() {
        let mut state = CompilationState::default();
        let now = at(2024, 3, 6, 12);

        assert!(state.update_source_state(&source("one"), "hash1", now));
        let entry = &state.sources["one"];
        assert_eq!(entry.fetch_count, 1);
        assert_eq!(entry.change_count, 1);
        assert_eq!(entry.url, "https://example.com/one.txt");
    }

    #[test]
    fn test_unchanged_hash_only_bumps_fetch_count() {
        let mut state = CompilationState::default();
        let first = at(2024, 3, 6, 12);
        state.update_source_state(&source("one"), "hash1", first);

        let later = first + Duration::hours(2);
        assert!(!state.update_source_state(&source("one"), "hash1", later));
        assert!(state.update_source_state(&source("one"), "hash2", later));

        let entry = &state.sources["one"];
        assert_eq!(entry.fetch_count, 3);
        assert_eq!(entry.change_count, 2);
        assert_eq!(entry.content_hash, "hash2");
    }

    #[test]
    fn test_stale_sources_are_purged_unless_preserved() {
        let mut state = CompilationState::default();
        let long_ago = at(2023, 1, 1, 0);
        state.update_source_state(&source("old"), "h", long_ago);
        state.update_source_state(&source("kept"), "h", long_ago);
        state.update_source_state(&source("fresh"), "h", at(2024, 2, 1, 0));

        let sources = vec![source("old"), source("kept").preserve(true), source("fresh"), source("new")];
        let (active, purged) = state.check_stale_sources(sources, at(2024, 3, 6, 12), 180);

        assert!(purged);
        let names: Vec<&str> = active.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "fresh", "new"]);
        assert!(!state.sources.contains_key("old"));
    }

    #[test]
    fn test_invalid_change_date_never_purges() {
        let mut state = CompilationState::default();
        state.sources.insert(
            "odd".to_string(),
            SourceState {
                last_changed_date: "not-a-date".to_string(),
                ..SourceState::default()
            },
        );

        let (active, purged) = state.check_stale_sources(vec![source("odd")], at(2024, 3, 6, 12), 1);
        assert!(!purged);
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_force_compile_rules() {
        let wednesday = at(2024, 3, 6, 12);
        let mut state = CompilationState::default();
        assert!(state.should_force_compile(wednesday, FORCE_INTERVAL_HOURS));

        state.last_compilation = "garbage".to_string();
        assert!(state.should_force_compile(wednesday, FORCE_INTERVAL_HOURS));

        state.record_compilation(wednesday - Duration::hours(10));
        assert!(!state.should_force_compile(wednesday, FORCE_INTERVAL_HOURS));

        state.last_compilation = (wednesday - Duration::hours(168)).to_rfc3339();
        assert!(state.should_force_compile(wednesday, FORCE_INTERVAL_HOURS));

        // 2024-03-10 is a Sunday
        let sunday_midnight = at(2024, 3, 10, 0);
        state.last_compilation = (sunday_midnight - Duration::hours(1)).to_rfc3339();
        assert!(state.should_force_compile(sunday_midnight, FORCE_INTERVAL_HOURS));
        assert!(!state.should_force_compile(at(2024, 3, 10, 1), FORCE_INTERVAL_HOURS));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");

        let mut state = CompilationState::default();
        state.update_source_state(&source("one"), "hash1", at(2024, 3, 6, 12));
        state.record_compilation(at(2024, 3, 6, 12));
        state.record_skip();
        state.save(&path).unwrap();

        assert_eq!(CompilationState::load(&path), state);
    }

    #[test]
    fn test_load_missing_corrupt_and_legacy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        assert_eq!(CompilationState::load(&path), CompilationState::default());

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(CompilationState::load(&path), CompilationState::default());

        std::fs::write(
            &path,
            r#"{"lists": {"legacy": {"url": "https://example.com", "content_hash": "abc"}}, "compilation_count": 4}"#,
        )
        .unwrap();
        let state = CompilationState::load(&path);
        assert_eq!(state.sources["legacy"].content_hash, "abc");
        assert_eq!(state.compilation_count, 4);
    }
}
