//! External merge sort of the staging log by `(domain, source_id)`.
//!
//! Records are read in chunks, each chunk is sorted in memory and spilled to an
//! anonymous temp file, then the runs are merged with a binary heap. A single
//! chunk never touches the disk.

use crate::core::staging::{StagingReader, StagingWriter};
use crate::domain::model::AnnotatedDomainRecord;
use crate::utils::error::Result;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_RECORDS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub records: u64,
    pub skipped: u64,
    pub runs: usize,
}

#[derive(Debug, Clone)]
pub struct ExternalSorter {
    chunk_records: usize,
    temp_dir: PathBuf,
}

impl ExternalSorter {
    pub fn new(chunk_records: usize, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunk_records: chunk_records.max(1),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn sort_file(&self, input: &Path, output: &Path) -> Result<SortStats> {
        let reader = BufReader::new(File::open(input)?);
        let writer = BufWriter::new(File::create(output)?);
        self.sort(reader, writer)
    }

    pub fn sort<R: Read, W: Write>(&self, input: R, output: W) -> Result<SortStats> {
        let mut reader = StagingReader::new(input);
        let mut stats = SortStats::default();
        let mut chunk = Vec::with_capacity(self.chunk_records.min(DEFAULT_CHUNK_RECORDS));
        let mut runs = Vec::new();

        while let Some(record) = reader.next_record()? {
            stats.records += 1;
            chunk.push(record);
            if chunk.len() >= self.chunk_records {
                runs.push(self.spill(&mut chunk)?);
            }
        }
        stats.skipped = reader.skipped();

        let mut writer = StagingWriter::new(output);

        if runs.is_empty() {
            // 全部資料在記憶體內，不需要合併
            chunk.sort_unstable();
            for record in &chunk {
                writer.write(record)?;
            }
        } else {
            if !chunk.is_empty() {
                runs.push(self.spill(&mut chunk)?);
            }
            stats.runs = runs.len();
            tracing::debug!("🔀 Merging {} sorted runs", runs.len());
            merge_runs(runs, &mut writer)?;
        }

        writer.finish()?;
        Ok(stats)
    }

    fn spill(&self, chunk: &mut Vec<AnnotatedDomainRecord>) -> Result<File> {
        chunk.sort_unstable();

        let mut run = tempfile::tempfile_in(&self.temp_dir)?;
        {
            let mut writer = StagingWriter::new(BufWriter::new(&mut run));
            for record in chunk.iter() {
                writer.write(record)?;
            }
            writer.finish()?;
        }
        run.rewind()?;

        tracing::debug!("💾 Spilled sorted run of {} records", chunk.len());
        chunk.clear();
        Ok(run)
    }
}

fn merge_runs<W: Write>(runs: Vec<File>, writer: &mut StagingWriter<W>) -> Result<()> {
    let mut readers: Vec<StagingReader<BufReader<File>>> = runs
        .into_iter()
        .map(|run| StagingReader::new(BufReader::new(run)))
        .collect();

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (index, reader) in readers.iter_mut().enumerate() {
        if let Some(record) = reader.next_record()? {
            heap.push(Reverse((record, index)));
        }
    }

    while let Some(Reverse((record, index))) = heap.pop() {
        writer.write(&record)?;
        if let Some(next) = readers[index].next_record()? {
            heap.push(Reverse((next, index)));
        }
    }

    Ok(())
}
