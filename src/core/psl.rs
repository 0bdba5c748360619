//! Public Suffix List rules and registrable-domain resolution.
//!
//! Rule text format:
//! - `//` comments and blank lines are ignored
//! - `!name` is an exception (carved out of a wildcard rule)
//! - `*.parent` is a wildcard: any single label prepended to `parent` is a suffix
//! - anything else is an exact suffix (malformed lines included)

use std::collections::HashSet;

/// 解析後的規則集，建立後唯讀，可跨執行緒共用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicSuffixRuleSet {
    exact: HashSet<String>,
    wildcards: HashSet<String>,
    exceptions: HashSet<String>,
}

impl PublicSuffixRuleSet {
    pub fn parse(text: &str) -> Self {
        let mut rules = Self::default();

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if let Some(exception) = line.strip_prefix('!') {
                rules.exceptions.insert(exception.to_lowercase());
            } else if let Some(parent) = line.strip_prefix("*.") {
                rules.wildcards.insert(parent.to_lowercase());
            } else {
                rules.exact.insert(line.to_lowercase());
            }
        }

        rules
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn wildcard_count(&self) -> usize {
        self.wildcards.len()
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty() && self.exceptions.is_empty()
    }

    /// Resolves `domain` (lowercase, already validated) to its registrable domain:
    /// the public suffix plus one label.
    ///
    /// Candidates are scanned from the whole domain down to the last label, so the
    /// longest matching rule wins. An exception candidate is not a public suffix and
    /// scanning simply continues with the next shorter candidate. Without any match
    /// the last two labels are returned.
    ///
    /// ```
    /// use yaha::core::psl::PublicSuffixRuleSet;
    ///
    /// let rules = PublicSuffixRuleSet::parse("com\ngithub.io\n*.ck\n!www.ck\n");
    /// assert_eq!(rules.registrable_domain("www.example.com"), "example.com");
    /// assert_eq!(rules.registrable_domain("api.user.github.io"), "user.github.io");
    /// assert_eq!(rules.registrable_domain("sub.www.ck"), "www.ck");
    /// ```
    pub fn registrable_domain<'a>(&self, domain: &'a str) -> &'a str {
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 {
            return domain;
        }

        // 每個 label 在原字串中的起始位置，候選後綴直接切片取得
        let mut starts = Vec::with_capacity(labels.len());
        let mut offset = 0;
        for label in &labels {
            starts.push(offset);
            offset += label.len() + 1;
        }

        for i in 0..labels.len() {
            let candidate = &domain[starts[i]..];

            if self.exceptions.contains(candidate) {
                continue;
            }

            let wildcard_match = i + 1 < labels.len()
                && self.wildcards.contains(&domain[starts[i + 1]..]);

            if self.exact.contains(candidate) || wildcard_match {
                return if i == 0 { domain } else { &domain[starts[i - 1]..] };
            }
        }

        &domain[starts[labels.len() - 2]..]
    }
}
