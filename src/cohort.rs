//! Cohort Combination Module
//!
//! Stacks per-sample results into antibiotic × sample matrices:
//!
//! - `consensus_prediction`: the resistance call of every sample, missing
//!   where a sample never reported the antibiotic
//! - `<label>` per tool: `True` where the tool implicated a gene for the
//!   antibiotic in that sample, missing otherwise
//!
//! Rows follow the order in which antibiotics first appear across samples.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::info;

use crate::error::Result;
use crate::pipeline::{SampleReport, OUTPUT_DELIMITER};
use crate::source::Source;
use crate::table::{Table, Value};
use crate::views::ANTIBIOTIC_COLUMN;

pub const CONSENSUS_MATRIX: &str = "consensus_prediction";

/// Builds an antibiotic × sample matrix from per-sample `(antibiotic, cell)`
/// lists.
fn matrix<F>(samples: &[SampleReport], cells: F) -> Table
where
    F: Fn(&SampleReport) -> Vec<(String, Option<Value>)>,
{
    let mut columns = vec![ANTIBIOTIC_COLUMN.to_string()];
    columns.extend(samples.iter().map(|s| s.sample.clone()));
    let mut table = Table::new(columns);

    let mut rows: FxHashMap<String, usize> = FxHashMap::default();
    for sample in samples {
        for (antibiotic, cell) in cells(sample) {
            let row = *rows.entry(antibiotic.clone()).or_insert_with(|| {
                table.push_row(vec![Some(Value::Text(antibiotic))]);
                table.len() - 1
            });
            if cell.is_some() {
                table.set(row, &sample.sample, cell);
            }
        }
    }
    table
}

/// Resistance call per antibiotic and sample.
pub fn consensus_matrix(samples: &[SampleReport]) -> Table {
    matrix(samples, |s| {
        s.consensus
            .rows
            .iter()
            .map(|r| (r.antibiotic.clone(), Some(Value::Bool(r.above_cutoff))))
            .collect()
    })
}

/// Detections of one tool per antibiotic and sample.
pub fn detection_matrix(samples: &[SampleReport], source: Source) -> Table {
    matrix(samples, |s| {
        let view = &s.by_antibiotic;
        (0..view.len())
            .filter_map(|row| {
                let antibiotic = view.text(row, ANTIBIOTIC_COLUMN)?.to_string();
                let detected = view.text(row, source.label()).is_some();
                Some((antibiotic, detected.then_some(Value::Bool(true))))
            })
            .collect()
    })
}

/// All cohort matrices, named by their output stem.
pub fn combine_cohort(samples: &[SampleReport]) -> Vec<(String, Table)> {
    let mut out = vec![(CONSENSUS_MATRIX.to_string(), consensus_matrix(samples))];
    for source in Source::TOOLS {
        if samples.iter().any(|s| s.by_antibiotic.has_column(source.label())) {
            out.push((source.label().to_string(), detection_matrix(samples, source)));
        }
    }
    out
}

/// Writes `<name>_combined.csv` for every cohort matrix.
pub fn write_cohort(samples: &[SampleReport], outdir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (name, table) in combine_cohort(samples) {
        let path = outdir.join(format!("{}_combined.csv", name));
        table.write_delimited(BufWriter::new(File::create(&path)?), OUTPUT_DELIMITER)?;
        written.push(path);
    }
    info!(samples = samples.len(), files = written.len(), "wrote cohort matrices");
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================
