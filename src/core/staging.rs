//! Tab-separated staging log: `domain<TAB>source_id<TAB>is_primary (1|0)`.

use crate::domain::model::AnnotatedDomainRecord;
use crate::utils::error::{Result, YahaError};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::io::{Read, Write};

pub struct StagingWriter<W: Write> {
    inner: csv::Writer<W>,
    written: u64,
}

impl<W: Write> StagingWriter<W> {
    pub fn new(writer: W) -> Self {
        let inner = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);
        Self { inner, written: 0 }
    }

    pub fn write(&mut self, record: &AnnotatedDomainRecord) -> Result<()> {
        let source_id = record.source_id.to_string();
        let flag = if record.is_primary_category { "1" } else { "0" };
        self.inner
            .write_record([record.domain.as_str(), source_id.as_str(), flag])?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| YahaError::IoError(e.into_error()))
    }
}

pub struct StagingReader<R: Read> {
    inner: csv::Reader<R>,
    record: StringRecord,
    skipped: u64,
}

impl<R: Read> StagingReader<R> {
    pub fn new(reader: R) -> Self {
        let inner = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        Self {
            inner,
            record: StringRecord::new(),
            skipped: 0,
        }
    }

    /// Next well-formed record. Lines with the wrong field count or a
    /// non-numeric source id are skipped.
    pub fn next_record(&mut self) -> Result<Option<AnnotatedDomainRecord>> {
        while self.inner.read_record(&mut self.record)? {
            match parse_record(&self.record) {
                Some(record) => return Ok(Some(record)),
                None => self.skipped += 1,
            }
        }
        Ok(None)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: Read> Iterator for StagingReader<R> {
    type Item = Result<AnnotatedDomainRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn parse_record(fields: &StringRecord) -> Option<AnnotatedDomainRecord> {
    if fields.len() != 3 {
        return None;
    }

    let domain = fields.get(0)?;
    if domain.is_empty() {
        return None;
    }
    let source_id = fields.get(1)?.parse().ok()?;
    let is_primary_category = fields.get(2)? == "1";

    Some(AnnotatedDomainRecord::new(domain, source_id, is_primary_category))
}
