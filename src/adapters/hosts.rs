use crate::config::sources::SourceConfig;
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

pub const HOSTS_FILE: &str = "hosts";
pub const HOSTS_ALL_FILE: &str = "hosts_nsfw";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// `4_400_000` -> `"4.4M"`
pub fn format_count(count: u64) -> String {
    format!("{:.1}M", count as f64 / 1_000_000.0)
}

/// `1234567` -> `"1,234,567"`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn build_header<'a>(
    title: &str,
    total_domains: u64,
    sources: impl IntoIterator<Item = &'a SourceConfig>,
    source_counts: &BTreeMap<String, u64>,
    timestamp: &str,
) -> Vec<String> {
    let mut header = vec![
        "# YAHA - Yet Another Host Aggregator".to_string(),
        format!("# Compiled blocklist from multiple sources ({})", title),
        "#".to_string(),
        format!("# Last Updated: {}", timestamp),
        format!("# Total Domains: {}", format_thousands(total_domains)),
        "#".to_string(),
        "# Source Lists:".to_string(),
    ];

    for source in sources {
        let count = source_counts.get(&source.name).copied().unwrap_or(0);
        let nsfw_flag = if source.nsfw { " [NSFW]" } else { "" };
        header.push(format!(
            "#   - {}{}: {} domains",
            source.name,
            nsfw_flag,
            format_thousands(count)
        ));
        header.push(format!("#     {}", source.url));
    }

    header.extend([
        "#".to_string(),
        "# Usage: Add this URL to your blocklist subscriptions".to_string(),
        "#".to_string(),
    ]);
    header
}

/// Streams `0.0.0.0 <domain>` lines after the header and a blank line.
pub struct HostsWriter<W: Write> {
    out: BufWriter<W>,
    count: u64,
}

impl<W: Write> HostsWriter<W> {
    pub fn new(out: W, header: &[String]) -> Result<Self> {
        let mut out = BufWriter::new(out);
        writeln!(out, "{}\n", header.join("\n"))?;
        Ok(Self { out, count: 0 })
    }

    /// 空白網域略過
    pub fn push(&mut self, raw: &str) -> Result<()> {
        let domain = raw.trim();
        if !domain.is_empty() {
            writeln!(self.out, "0.0.0.0 {}", domain)?;
            self.count += 1;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64> {
        self.out.flush()?;
        Ok(self.count)
    }
}

pub fn write_hosts<W, I, S>(out: W, header: &[String], domains: I) -> Result<u64>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut writer = HostsWriter::new(out, header)?;
    for domain in domains {
        writer.push(domain.as_ref())?;
    }
    writer.finish()
}

/// 從去重後的網域檔產生 hosts 檔
pub fn write_hosts_from_file(domains_path: &Path, output_path: &Path, header: &[String]) -> Result<u64> {
    let reader = BufReader::new(File::open(domains_path)?);
    let mut writer = HostsWriter::new(File::create(output_path)?, header)?;
    for line in reader.lines() {
        writer.push(&line?)?;
    }
    writer.finish()
}
