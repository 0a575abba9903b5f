//! Per-sample assembly: merge the normalized sources, annotate with the
//! phenotype table, build both views and the consensus, then write the
//! report files.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::consensus::{predict, ConsensusTable};
use crate::error::{CombineError, Result};
use crate::merge::{combine_tables, join, JoinKind};
use crate::normalize::SourceTable;
use crate::source::{Source, KEY_COLUMN};
use crate::table::Table;
use crate::tools::VersionTable;
use crate::views::{by_antibiotic, by_gene};

/// Field separator of written reports.
pub const OUTPUT_DELIMITER: u8 = b';';

/// Everything computed for one sample.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub sample: String,
    /// Normalized per-source tables that took part in the merge.
    pub sources: Vec<SourceTable>,
    pub merged: Table,
    pub by_gene: Table,
    pub by_antibiotic: Table,
    pub consensus: ConsensusTable,
    /// Set when the tools were run by this program.
    pub versions: Option<VersionTable>,
}

impl SampleReport {
    /// Tool sources that contributed a table.
    pub fn tool_sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|t| t.source).filter(|s| s.is_tool())
    }

    /// False when every source table came back empty.
    pub fn has_hits(&self) -> bool {
        self.sources.iter().any(|t| !t.is_empty())
    }
}

/// Reconciles the normalized tool tables of one sample.
///
/// Fails with [`CombineError::NoSourceData`] when `sources` is empty. Empty
/// tables are fine and still contribute their columns, but a warning is
/// logged when none of them holds a hit.
pub fn assemble(
    sample: &str,
    sources: Vec<SourceTable>,
    phenotypes: Option<&SourceTable>,
    config: &Config,
) -> Result<SampleReport> {
    if sources.is_empty() {
        return Err(CombineError::NoSourceData);
    }
    if sources.iter().all(SourceTable::is_empty) {
        warn!(sample, sources = sources.len(), "no source reported any hit; consensus will be empty");
    }

    let tables: Vec<Table> = sources.iter().map(SourceTable::to_table).collect();
    let labelled: Vec<(&str, &Table)> = sources
        .iter()
        .zip(&tables)
        .map(|(s, t)| (s.source.label(), t))
        .collect();
    let mut merged = combine_tables(&labelled, KEY_COLUMN)?;
    debug!(sample, genes = merged.len(), columns = merged.columns().len(), "merged sources");

    if let Some(pheno) = phenotypes {
        merged = join(&merged, &pheno.to_table(), KEY_COLUMN, JoinKind::Left, ("_o", ""))?;
        merged.drop_column(Source::PhenotypeTable.label());
    }

    let gene_view = by_gene(&merged, &config.views);
    let antibiotic_view = by_antibiotic(&merged, &config.views);
    let consensus = predict(&antibiotic_view, &config.consensus);

    info!(
        sample,
        sources = sources.len(),
        genes = merged.len(),
        antibiotics = antibiotic_view.len(),
        resistant = consensus.resistant().count(),
        "assembled consensus"
    );

    Ok(SampleReport {
        sample: sample.to_string(),
        sources,
        merged,
        by_gene: gene_view,
        by_antibiotic: antibiotic_view,
        consensus,
        versions: None,
    })
}

// ============================================================================
// Output
// ============================================================================

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    table.write_delimited(writer, OUTPUT_DELIMITER)
}

#[derive(Serialize)]
struct ConsensusJson<'a> {
    sample: &'a str,
    consensus: &'a ConsensusTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<&'a VersionTable>,
}

/// Writes all report files of a sample into `outdir` and returns their
/// paths.
pub fn write_outputs(report: &SampleReport, outdir: &Path, json: bool) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(outdir)?;
    let prefix = |suffix: &str| outdir.join(format!("{}.{}", report.sample, suffix));
    let mut written = Vec::new();

    let mut files: Vec<(PathBuf, Table)> = vec![
        (prefix("view1.csv"), report.by_antibiotic.clone()),
        (prefix("view2.csv"), report.by_gene.clone()),
        (prefix("consensus.csv"), report.consensus.to_table()),
        (prefix("merged.csv"), report.merged.clone()),
    ];
    for source in &report.sources {
        files.push((prefix(&format!("raw_{}.csv", source.source.label())), source.to_table()));
    }
    if let Some(versions) = &report.versions {
        files.push((prefix("versions.csv"), versions.to_table()));
    }

    for (path, table) in files {
        write_csv(&table, &path)?;
        written.push(path);
    }

    if json {
        let path = prefix("consensus.json");
        let doc = ConsensusJson {
            sample: &report.sample,
            consensus: &report.consensus,
            versions: report.versions.as_ref(),
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &doc)?;
        written.push(path);
    }

    debug!(sample = %report.sample, files = written.len(), "wrote reports");
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::tsv::read_delimited;

    fn source(text: &str, source: Source) -> SourceTable {
        let raw = read_delimited(text.as_bytes(), b'\t').unwrap();
        normalize(&raw, source, &Config::default()).unwrap()
    }

    fn sample_sources() -> Vec<SourceTable> {
        vec![
            source(
                "Gene symbol\tSubclass\tMethod\t% Coverage of reference sequence\t% Identity to reference sequence\n\
                 aac(3)-IIe\tGENTAMICIN\tEXACTX\t100.00\t100.00\n\
                 tet(A)\tTETRACYCLINE\tBLASTX\t90.00\t80.00\n",
                Source::HomologyFinder,
            ),
            source(
                "ORF_ID\tCut_Off\tBest_Hit_ARO\tDrug Class\n\
                 c1\tStrict\tAAC(3)-IIe\taminoglycoside antibiotic\n",
                Source::CuratedDbFinder,
            ),
            source(
                "Resistance gene\tIdentity\tCoverage\tPhenotype\n\
                 tet(A)\t92.00\t95.00\tTetracycline\n",
                Source::PointMutationFinder,
            ),
        ]
    }

    fn phenotypes() -> SourceTable {
        source(
            "Gene_accession no.\tClass\tPhenotype\n\
             aac(3)-IIe_1_X13543\tAminoglycoside\tGentamicin\n",
            Source::PhenotypeTable,
        )
    }

    #[test]
    fn test_assemble_end_to_end() {
        let pheno = phenotypes();
        let report = assemble("S1", sample_sources(), Some(&pheno), &Config::default()).unwrap();

        assert_eq!(report.merged.len(), 2);
        assert!(!report.merged.has_column("phenotype"));
        assert!(report.merged.has_column("antibiotic_phenotype"));
        assert!(report.merged.has_column("coverage_NCBIAMRFinder"));

        // gentamicin: NCBI tier 0, RGI tier 1 -> (3 + 2) / 2 = 2.5
        let genta = report.consensus.get("gentamicin").unwrap();
        assert_eq!(genta.score, Some(2.5));
        assert!(genta.above_cutoff);

        // tetracycline: NCBI tier 2, ResFinder tier 2 -> 1.0
        let tet = report.consensus.get("tetracycline").unwrap();
        assert_eq!(tet.score, Some(1.0));
        assert!(!tet.above_cutoff);

        assert!(report.has_hits());
        let tools: Vec<Source> = report.tool_sources().collect();
        assert_eq!(tools, Source::TOOLS.to_vec());
    }

    #[test]
    fn test_assemble_without_sources_fails() {
        let err = assemble("S1", Vec::new(), None, &Config::default()).unwrap_err();
        assert!(matches!(err, CombineError::NoSourceData));
    }

    #[test]
    fn test_assemble_all_empty_sources() {
        let sources = Source::TOOLS.iter().map(|&s| SourceTable::empty(s)).collect();
        let report = assemble("S1", sources, None, &Config::default()).unwrap();
        assert!(!report.has_hits());
        assert!(report.merged.is_empty());
        assert!(report.merged.has_column("tier_CARD-RGI"));
        assert!(report.consensus.is_empty());
        assert_eq!(report.by_antibiotic.columns().len(), 7);
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = assemble("S1", sample_sources(), None, &Config::default()).unwrap();
        let mut versions = VersionTable::default();
        versions.push("Main", "0.1.0");
        report.versions = Some(versions);

        let written = write_outputs(&report, dir.path(), true).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "S1.view1.csv",
                "S1.view2.csv",
                "S1.consensus.csv",
                "S1.merged.csv",
                "S1.raw_NCBIAMRFinder.csv",
                "S1.raw_CARD-RGI.csv",
                "S1.raw_ResFinder.csv",
                "S1.versions.csv",
                "S1.consensus.json",
            ]
        );

        let consensus = fs::read_to_string(dir.path().join("S1.consensus.csv")).unwrap();
        assert!(consensus.starts_with("\"antibiotic\";\"Mean weighted score\";\"Above resistance cutoff\""));
        assert!(consensus.contains("\"gentamicin\";\"2.5\";\"True\""));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("S1.consensus.json")).unwrap()).unwrap();
        assert_eq!(json["sample"], "S1");
        assert_eq!(json["versions"][0]["toolname"], "Main");
    }
}
