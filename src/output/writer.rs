//! JSON Lines writer
//!
//! Writes one record per line as `{"locator": ..., "body": ...}`.

use crate::config::SourceKind;
use crate::error::{Error, Result};
use crate::types::{DateRange, Record};
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Directory output lands in when none is given
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Extension of record files
pub const OUTPUT_EXTENSION: &str = "jsonl";

/// JSON Lines file writer
pub struct RecordWriter {
    /// Buffered file handle
    writer: BufWriter<File>,
    /// Destination path
    path: PathBuf,
    /// Number of records written
    rows_written: usize,
}

impl RecordWriter {
    /// Create the file, and any missing parent directories
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::Output {
                message: format!("Failed to create directory {}: {e}", parent.display()),
            })?;
        }

        let file = File::create(path).map_err(|e| Error::Output {
            message: format!("Failed to create file {}: {e}", path.display()),
        })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            rows_written: 0,
        })
    }

    /// Append one record
    pub fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Append every record, in order
    pub fn write_all(&mut self, records: &[Record]) -> Result<()> {
        records.iter().try_for_each(|record| self.write(record))
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of records written so far
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<usize> {
        self.writer.flush().map_err(|e| Error::Output {
            message: format!("Failed to flush {}: {e}", self.path.display()),
        })?;
        Ok(self.rows_written)
    }
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

/// Write records to a JSON Lines file
pub fn write_records_to_jsonl(path: impl AsRef<Path>, records: &[Record]) -> Result<usize> {
    let mut writer = RecordWriter::create(path)?;
    writer.write_all(records)?;
    writer.close()
}

/// Read a JSON Lines file back into records
pub fn read_records_from_jsonl(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Record>(line).map_err(Error::from))
        .collect()
}

/// File name describing a run
///
/// `{source}-{start|beginning}-to-{end|current}[-max{N}]_{YYYYmmdd-HHMMSS}.jsonl`
pub fn output_file_name(
    source: SourceKind,
    range: &DateRange,
    max_results: Option<usize>,
    now: NaiveDateTime,
) -> String {
    let start = range.start_str().unwrap_or_else(|| "beginning".to_string());
    let end = range.end_str().unwrap_or_else(|| "current".to_string());
    let cap = max_results.map(|max| format!("-max{max}")).unwrap_or_default();

    format!(
        "{}-{}-to-{}{}_{}.{}",
        source.name(),
        start,
        end,
        cap,
        now.format("%Y%m%d-%H%M%S"),
        OUTPUT_EXTENSION
    )
}
