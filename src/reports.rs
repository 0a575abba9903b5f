//! Locates and loads the per-tool reports of one sample.
//!
//! A sample report directory holds whatever the tools wrote:
//!
//! ```text
//! <sample>/
//! ├── NCBIAMRFinder
//! ├── CARD-RGI.txt
//! └── ResFinder/
//!     ├── ResFinder_results_tab.txt
//!     └── PointFinder_results.txt
//! ```
//!
//! Each file may also be gzip-compressed with a `.gz` suffix. Absent
//! reports are skipped with a warning; a report that exists but cannot be
//! interpreted is an error.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CombineError, Result};
use crate::normalize::{normalize, normalize_with, SourceTable};
use crate::pointfinder::parse_point_report;
use crate::source::Source;
use crate::table::Table;
use crate::tsv::{read_table, read_text, resolve_existing};

/// Loads and normalizes one tool's report from a sample directory.
///
/// Returns [`CombineError::MissingInput`] when the tool left nothing behind.
/// For the point-mutation tool the PointFinder block report is merged in
/// when present, and either of its two reports is enough.
pub fn load_source(dir: &Path, source: Source, config: &Config) -> Result<SourceTable> {
    let expected = source
        .report_path(dir)
        .ok_or_else(|| CombineError::Config(format!("{} has no report location", source)))?;
    let tabular = resolve_existing(&expected);
    let point = source
        .point_report_path(dir)
        .and_then(|p| resolve_existing(&p));

    if tabular.is_none() && point.is_none() {
        return Err(CombineError::MissingInput(expected));
    }

    let raw = match &tabular {
        Some(path) => {
            debug!(source = %source, path = %path.display(), "reading report");
            read_table(path)?
        }
        None => Table::default(),
    };

    let point_hits = match &point {
        Some(path) => {
            debug!(source = %source, path = %path.display(), "reading point mutation report");
            let weakest = config.cutoffs_for(source).map_or(0, |c| c.weakest());
            parse_point_report(&read_text(path)?, weakest)
        }
        None => Vec::new(),
    };

    normalize_with(&raw, source, config, point_hits)
}

/// Loads every tool report found in `dir`, skipping absent ones.
pub fn load_sample(dir: &Path, config: &Config) -> Result<Vec<SourceTable>> {
    let mut tables = Vec::new();
    for source in Source::TOOLS {
        match load_source(dir, source, config) {
            Ok(table) => tables.push(table),
            Err(CombineError::MissingInput(path)) => {
                warn!(source = %source, path = %path.display(), "report not found, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(tables)
}

/// Loads the gene → phenotype annotation table.
pub fn load_phenotypes(path: &Path, config: &Config) -> Result<SourceTable> {
    let path = resolve_existing(path).ok_or_else(|| CombineError::MissingInput(path.to_path_buf()))?;
    let raw = read_table(&path)?;
    normalize(&raw, Source::PhenotypeTable, config)
}

// ============================================================================
// Tests
// ============================================================================
