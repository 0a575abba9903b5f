//! Report I/O Module
//!
//! Reads the delimited reports written by the resistance tools into a
//! [`Table`]. Plain and gzip-compressed files are both accepted.
//!
//! # Examples
//! ```no_run
//! use amrconsensus::tsv::read_table;
//!
//! let table = read_table("sample/NCBIAMRFinder").unwrap();
//! println!("{} hits, columns: {:?}", table.len(), table.columns());
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{CombineError, Result};
use crate::table::{Table, Value};

// ============================================================================
// Report File
// ============================================================================

/// Auto-detecting report reader.
///
/// Files ending in `.gz` are decompressed on the fly, all other files are
/// read as plain text.
pub enum ReportFile {
    Plain(BufReader<File>),
    Gzipped(BufReader<MultiGzDecoder<File>>),
}

impl ReportFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CombineError::MissingInput(path.to_path_buf()),
            _ => CombineError::Io(e),
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == "gz" {
            Ok(ReportFile::Gzipped(BufReader::new(MultiGzDecoder::new(file))))
        } else {
            Ok(ReportFile::Plain(BufReader::new(file)))
        }
    }
}

impl Read for ReportFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ReportFile::Plain(r) => r.read(buf),
            ReportFile::Gzipped(r) => r.read(buf),
        }
    }
}

impl BufRead for ReportFile {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            ReportFile::Plain(r) => r.fill_buf(),
            ReportFile::Gzipped(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            ReportFile::Plain(r) => r.consume(amt),
            ReportFile::Gzipped(r) => r.consume(amt),
        }
    }
}

/// Returns `path` if it exists, else its `.gz` sibling if that exists.
pub fn resolve_existing(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let mut gz = path.as_os_str().to_os_string();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    gz.is_file().then_some(gz)
}

// ============================================================================
// Delimited Tables
// ============================================================================

/// Parses delimited text with a header line.
///
/// Quote characters are taken literally (tool descriptions contain them),
/// ragged rows are padded with missing cells and blank fields read as
/// missing. A zero-byte input yields a table without columns.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .quoting(false)
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut table = Table::new(header);

    for record in rdr.records() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        table.push_row(
            record
                .iter()
                .map(|f| {
                    let f = f.trim();
                    (!f.is_empty()).then(|| Value::text(f))
                })
                .collect(),
        );
    }

    Ok(table)
}

/// Reads a tab-separated report (plain or gzipped).
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    read_delimited(ReportFile::open(path)?, b'\t')
}

/// Reads a whole text report (plain or gzipped) into memory.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut text = String::new();
    ReportFile::open(path)?.read_to_string(&mut text)?;
    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================
