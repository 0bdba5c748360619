//! Domain extraction from hosts files, raw domain lists and Adblock filters.

use crate::core::psl::PublicSuffixRuleSet;
use regex::Regex;
use std::sync::LazyLock;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

// 保守的主機名稱 token：英數字與連字號，label 最長 63
const HOSTNAME_TOKEN: &str = r"[a-zA-Z0-9](?:[a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*";

static ADBLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\|\|({})\^", HOSTNAME_TOKEN)).expect("valid adblock pattern")
});

static HOSTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:0\.0\.0\.0|127\.0\.0\.1|::1?)\s+({})", HOSTNAME_TOKEN))
        .expect("valid hosts pattern")
});

static RAW_DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^({})$", HOSTNAME_TOKEN)).expect("valid raw domain pattern")
});

const LOCALHOST_PREFIXES: [&str; 5] = [
    "127.0.0.1 localhost",
    "::1 localhost",
    "0.0.0.0 localhost",
    "::1 ip6-localhost",
    "::1 ip6-loopback",
];

/// RFC 1035 structural check: 253 chars total, 63 per label, no empty labels,
/// no leading or trailing hyphen.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH {
        return false;
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    if domain.contains("..") {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Extracts the lowercased domain a single list line refers to, if any.
///
/// Grammars are tried in order: Adblock `||domain^`, hosts entry
/// (`0.0.0.0`, `127.0.0.1`, `::`, `::1` followed by whitespace), raw domain.
pub fn extract_domain(line: &str) -> Option<String> {
    let line = line.trim();

    if line.is_empty() || line.starts_with(['#', '!', '[']) {
        return None;
    }

    if LOCALHOST_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
        return None;
    }

    // 第一個符合的格式即採用，即使之後驗證失敗也不再嘗試其他格式
    let captures = [&*ADBLOCK_PATTERN, &*HOSTS_PATTERN, &*RAW_DOMAIN_PATTERN]
        .into_iter()
        .find_map(|pattern| pattern.captures(line))?;

    let domain = captures.get(1)?.as_str().to_lowercase();
    is_valid_domain(&domain).then_some(domain)
}

/// Whether extracted tokens are reduced to their registrable domain.
#[derive(Debug, Clone, Copy)]
enum ExtractMode<'r> {
    Raw,
    Normalized(&'r PublicSuffixRuleSet),
}

#[derive(Debug, Clone, Copy)]
pub struct DomainExtractor<'r> {
    mode: ExtractMode<'r>,
}

impl<'r> DomainExtractor<'r> {
    pub fn raw() -> Self {
        Self {
            mode: ExtractMode::Raw,
        }
    }

    pub fn normalized(rules: &'r PublicSuffixRuleSet) -> Self {
        Self {
            mode: ExtractMode::Normalized(rules),
        }
    }

    pub fn extract_line(&self, line: &str) -> Option<String> {
        let domain = extract_domain(line)?;
        match self.mode {
            ExtractMode::Raw => Some(domain),
            ExtractMode::Normalized(rules) => {
                let registrable = rules.registrable_domain(&domain);
                if registrable.len() == domain.len() {
                    Some(domain)
                } else {
                    Some(registrable.to_string())
                }
            }
        }
    }

    /// Lazily maps a line source to accepted domains, one forward pass, input order kept.
    pub fn extract<I, S>(&self, lines: I) -> Domains<'r, I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Domains {
            extractor: *self,
            lines: lines.into_iter(),
        }
    }
}

pub struct Domains<'r, I> {
    extractor: DomainExtractor<'r>,
    lines: I,
}

impl<I, S> Iterator for Domains<'_, I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.lines
            .by_ref()
            .find_map(|line| self.extractor.extract_line(line.as_ref()))
    }
}
