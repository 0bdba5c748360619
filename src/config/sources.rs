use crate::utils::error::{Result, YahaError};
use crate::utils::validation::{validate_non_empty_string, validate_unique_names, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 單一來源清單設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nsfw: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub preserve: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer_description: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            nsfw: false,
            preserve: false,
            maintainer_name: None,
            maintainer_url: None,
            maintainer_description: None,
        }
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub fn preserve(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }

    /// General (non-NSFW) sources form the primary category.
    pub fn is_primary_category(&self) -> bool {
        !self.nsfw
    }

    /// Maintainer triple, only when all three fields are present.
    pub fn maintainer(&self) -> Option<(&str, &str, &str)> {
        match (
            self.maintainer_name.as_deref(),
            self.maintainer_url.as_deref(),
            self.maintainer_description.as_deref(),
        ) {
            (Some(name), Some(url), Some(description))
                if !name.is_empty() && !url.is_empty() && !description.is_empty() =>
            {
                Some((name, url, description))
            }
            _ => None,
        }
    }
}

impl Validate for SourceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("name", &self.name)?;
        validate_url(&format!("{}.url", self.name), &self.url)
    }
}

/// 解析來源清單 JSON，結構錯誤直接回報欄位
pub fn parse_sources(content: &str) -> Result<Vec<SourceConfig>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| YahaError::config_invalid("sources", format!("invalid JSON: {}", e)))?;

    let entries = value
        .as_array()
        .ok_or_else(|| YahaError::config_invalid("sources", "must contain a JSON array"))?;

    let mut sources = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let field = format!("sources[{}]", idx + 1);
        let object = entry
            .as_object()
            .ok_or_else(|| YahaError::config_invalid(&field, "must be a JSON object"))?;

        for required in ["name", "url"] {
            match object.get(required) {
                Some(serde_json::Value::String(_)) => {}
                Some(_) => {
                    return Err(YahaError::config_invalid(
                        format!("{}.{}", field, required),
                        "must be a string",
                    ))
                }
                None => {
                    return Err(YahaError::config_invalid(
                        &field,
                        format!("missing '{}' field", required),
                    ))
                }
            }
        }

        for flag in ["nsfw", "preserve"] {
            if object.get(flag).is_some_and(|value| !value.is_boolean()) {
                return Err(YahaError::config_invalid(
                    format!("{}.{}", field, flag),
                    "must be a boolean value",
                ));
            }
        }

        let source: SourceConfig = serde_json::from_value(entry.clone())
            .map_err(|e| YahaError::config_invalid(&field, e.to_string()))?;
        source.validate()?;
        sources.push(source);
    }

    validate_unique_names("sources", sources.iter().map(|source| source.name.as_str()))?;
    Ok(sources)
}

/// The source list is the one configuration the run cannot do without.
pub fn load_sources(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(YahaError::ConfigMissing {
                path: path.display().to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    parse_sources(&content)
}

pub fn save_sources(sources: &[SourceConfig], path: &Path) -> Result<()> {
    let mut json = serde_json::to_string_pretty(sources)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"[
    {"name": "Test List 1", "url": "https://example.com/list1.txt"},
    {"name": "Test List 2", "url": "https://example.com/list2.txt", "nsfw": false},
    {"name": "NSFW List", "url": "https://example.com/nsfw.txt", "nsfw": true, "preserve": true}
]"#;

    #[test]
    fn test_parse_sources() {
        let sources = parse_sources(SAMPLE).unwrap();

        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].name, "Test List 1");
        assert!(sources[0].is_primary_category());
        assert!(!sources[2].is_primary_category());
        assert!(sources[2].preserve);
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert!(matches!(
            parse_sources(r#"{"name": "x"}"#),
            Err(YahaError::ConfigInvalid { .. })
        ));
        assert!(parse_sources(r#"["just a string"]"#).is_err());
        assert!(parse_sources(r#"[{"name": "No URL"}]"#).is_err());
        assert!(parse_sources(r#"[{"url": "https://example.com"}]"#).is_err());
        assert!(parse_sources(r#"[{"name": "x", "url": "https://a.com", "nsfw": "yes"}]"#).is_err());
        assert!(parse_sources("not json").is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let json = r#"[
            {"name": "Same", "url": "https://a.com/1"},
            {"name": "Same", "url": "https://a.com/2"}
        ]"#;
        assert!(parse_sources(json).is_err());
    }

    #[test]
    fn test_missing_file_is_config_missing() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_sources(&temp_dir.path().join("blocklists.json"));
        assert!(matches!(result, Err(YahaError::ConfigMissing { .. })));
    }

    #[test]
    fn test_save_omits_default_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blocklists.json");
        let sources = vec![
            SourceConfig::new("Plain", "https://example.com/plain.txt"),
            SourceConfig::new("Adult", "https://example.com/adult.txt").nsfw(true),
        ];

        save_sources(&sources, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();

        assert!(!written.contains("preserve"));
        assert_eq!(written.matches("nsfw").count(), 1);
        assert_eq!(load_sources(&path).unwrap(), sources);
    }

    #[test]
    fn test_maintainer_requires_all_fields() {
        let mut source = SourceConfig::new("List", "https://example.com/list.txt");
        source.maintainer_name = Some("Someone".to_string());
        assert!(source.maintainer().is_none());

        source.maintainer_url = Some("https://someone.dev".to_string());
        source.maintainer_description = Some("Curated lists".to_string());
        assert_eq!(
            source.maintainer(),
            Some(("Someone", "https://someone.dev", "Curated lists"))
        );
    }
}
