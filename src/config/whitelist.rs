use crate::domain::ports::DomainFilter;
use crate::utils::error::Result;
use std::collections::HashSet;
use std::path::Path;

/// Exact entries plus `*.suffix` entries; a wildcard matches the suffix itself
/// and any subdomain of it, never a mere string suffix (`notexample.com`).
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    exact: HashSet<String>,
    wildcard_suffixes: Vec<String>,
}

impl Whitelist {
    pub fn parse(text: &str) -> Self {
        let mut whitelist = Self::default();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let entry = line.to_lowercase();
            match entry.strip_prefix("*.") {
                Some(suffix) => whitelist.wildcard_suffixes.push(suffix.to_string()),
                None => {
                    whitelist.exact.insert(entry);
                }
            }
        }

        whitelist
    }

    /// 檔案不存在視為空白名單
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No whitelist at {}, continuing without one", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_whitelisted(&self, domain: &str) -> bool {
        if self.exact.contains(domain) {
            return true;
        }

        self.wildcard_suffixes.iter().any(|suffix| {
            domain == suffix
                || (domain.len() > suffix.len()
                    && domain.ends_with(suffix.as_str())
                    && domain.as_bytes()[domain.len() - suffix.len() - 1] == b'.')
        })
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn wildcard_count(&self) -> usize {
        self.wildcard_suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcard_suffixes.is_empty()
    }
}

impl DomainFilter for Whitelist {
    fn is_whitelisted(&self, domain: &str) -> bool {
        Whitelist::is_whitelisted(self, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Whitelist
example.com
Safe-Domain.org
*.whitelisted.com
";

    #[test]
    fn test_parse_counts() {
        let whitelist = Whitelist::parse(SAMPLE);
        assert_eq!(whitelist.exact_count(), 2);
        assert_eq!(whitelist.wildcard_count(), 1);
    }

    #[test]
    fn test_exact_match() {
        let whitelist = Whitelist::parse(SAMPLE);
        assert!(whitelist.is_whitelisted("example.com"));
        assert!(whitelist.is_whitelisted("safe-domain.org"));
        assert!(!whitelist.is_whitelisted("sub.example.com"));
    }

    #[test]
    fn test_wildcard_match() {
        let whitelist = Whitelist::parse(SAMPLE);
        assert!(whitelist.is_whitelisted("whitelisted.com"));
        assert!(whitelist.is_whitelisted("a.whitelisted.com"));
        assert!(whitelist.is_whitelisted("a.b.whitelisted.com"));
        assert!(!whitelist.is_whitelisted("notwhitelisted.com"));
        assert!(!whitelist.is_whitelisted("whitelisted.com.evil.net"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let whitelist = Whitelist::load(&temp_dir.path().join("whitelist.txt")).unwrap();
        assert!(whitelist.is_empty());
        assert!(!whitelist.is_whitelisted("example.com"));
    }
}
