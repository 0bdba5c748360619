//! Streaming group-by over the sorted staging log.
//!
//! Records for one domain are contiguous after sorting, so each distinct domain
//! is flushed exactly once: the whitelist is consulted, the domain is written to
//! the "all" output and, when any primary-category source listed it, to the
//! "primary" output. A source that is the only member of a domain's source set
//! gets one unique contribution in that aggregate.

use crate::core::staging::StagingReader;
use crate::domain::model::{AggregateSummary, AnnotatedDomainRecord, ContributionCounters, SourceRegistry};
use crate::domain::ports::DomainFilter;
use crate::utils::error::{Result, YahaError};
use std::collections::BTreeSet;
use std::io::{Read, Write};

pub struct DomainGrouper<'a, F: DomainFilter + ?Sized, A: Write, P: Write> {
    registry: &'a SourceRegistry,
    whitelist: &'a F,
    all_out: A,
    primary_out: P,
    current_domain: Option<String>,
    sources_all: BTreeSet<u32>,
    sources_primary: BTreeSet<u32>,
    summary: AggregateSummary,
}

impl<'a, F: DomainFilter + ?Sized, A: Write, P: Write> DomainGrouper<'a, F, A, P> {
    pub fn new(registry: &'a SourceRegistry, whitelist: &'a F, all_out: A, primary_out: P) -> Self {
        Self {
            registry,
            whitelist,
            all_out,
            primary_out,
            current_domain: None,
            sources_all: BTreeSet::new(),
            sources_primary: BTreeSet::new(),
            summary: AggregateSummary {
                contrib_all: ContributionCounters::zeroed(registry.names()),
                contrib_primary: ContributionCounters::zeroed(registry.names()),
                ..AggregateSummary::default()
            },
        }
    }

    /// Accepts the next record of a stream sorted by domain.
    pub fn feed(&mut self, record: AnnotatedDomainRecord) -> Result<()> {
        if let Some(current) = self.current_domain.as_deref() {
            if current > record.domain.as_str() {
                return Err(YahaError::processing(
                    "group-by",
                    format!("input not sorted: '{}' after '{}'", record.domain, current),
                ));
            }
        }

        if self.current_domain.as_deref() != Some(record.domain.as_str()) {
            self.flush()?;
            self.current_domain = Some(record.domain);
        }

        self.sources_all.insert(record.source_id);
        if record.is_primary_category {
            self.sources_primary.insert(record.source_id);
        }
        Ok(())
    }

    /// Emits the pending domain group, if any, and resets the per-domain sets.
    pub fn flush(&mut self) -> Result<()> {
        let Some(domain) = self.current_domain.take() else {
            return Ok(());
        };

        if self.whitelist.is_whitelisted(&domain) {
            self.summary.whitelisted_count += 1;
        } else {
            writeln!(self.all_out, "{}", domain)?;
            self.summary.all_count += 1;

            if !self.sources_primary.is_empty() {
                writeln!(self.primary_out, "{}", domain)?;
                self.summary.primary_count += 1;
            }

            if let Some(name) = sole_source(&self.sources_all, self.registry) {
                self.summary.contrib_all.increment(name);
            }
            if let Some(name) = sole_source(&self.sources_primary, self.registry) {
                self.summary.contrib_primary.increment(name);
            }
        }

        self.sources_all.clear();
        self.sources_primary.clear();
        Ok(())
    }

    pub fn finish(mut self) -> Result<(AggregateSummary, A, P)> {
        self.flush()?;
        self.all_out.flush()?;
        self.primary_out.flush()?;
        Ok((self.summary, self.all_out, self.primary_out))
    }
}

fn sole_source<'r>(sources: &BTreeSet<u32>, registry: &'r SourceRegistry) -> Option<&'r str> {
    if sources.len() != 1 {
        return None;
    }
    let source_id = *sources.first()?;
    let name = registry.name(source_id);
    if name.is_none() {
        tracing::debug!("Ignoring contribution of unknown source id {}", source_id);
    }
    name
}

/// Runs the group-by over an already sorted staging stream.
pub fn group_sorted<R, F, A, P>(
    sorted: R,
    registry: &SourceRegistry,
    whitelist: &F,
    all_out: A,
    primary_out: P,
) -> Result<AggregateSummary>
where
    R: Read,
    F: DomainFilter + ?Sized,
    A: Write,
    P: Write,
{
    let mut reader = StagingReader::new(sorted);
    let mut grouper = DomainGrouper::new(registry, whitelist, all_out, primary_out);

    while let Some(record) = reader.next_record()? {
        grouper.feed(record)?;
    }

    if reader.skipped() > 0 {
        tracing::debug!("Skipped {} malformed staging lines", reader.skipped());
    }

    let (summary, _, _) = grouper.finish()?;
    Ok(summary)
}
