//! Evidence sources and the column layouts of their reports.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Prefix of per-source confidence tier columns.
pub const TIER_PREFIX: &str = "tier_";
/// Prefix of per-source normalized antibiotic columns.
pub const ANTIBIOTIC_PREFIX: &str = "antibiotic_";
/// Gene-identity merge key column.
pub const KEY_COLUMN: &str = "mo";

/// Origin of a hit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    /// NCBI AMRFinderPlus (sequence homology).
    #[serde(rename = "NCBIAMRFinder")]
    HomologyFinder,
    /// CARD Resistance Gene Identifier (curated database matcher).
    #[serde(rename = "CARD-RGI")]
    CuratedDbFinder,
    /// CGE ResFinder with PointFinder (acquired genes and point mutations).
    #[serde(rename = "ResFinder")]
    PointMutationFinder,
    /// Static gene → phenotype annotation table.
    #[serde(rename = "phenotype")]
    PhenotypeTable,
}

impl Source {
    /// The three detection tools, in report order.
    pub const TOOLS: [Source; 3] = [
        Source::HomologyFinder,
        Source::CuratedDbFinder,
        Source::PointMutationFinder,
    ];

    pub const ALL: [Source; 4] = [
        Source::HomologyFinder,
        Source::CuratedDbFinder,
        Source::PointMutationFinder,
        Source::PhenotypeTable,
    ];

    /// Label used in column names and configuration keys.
    pub fn label(self) -> &'static str {
        match self {
            Source::HomologyFinder => "NCBIAMRFinder",
            Source::CuratedDbFinder => "CARD-RGI",
            Source::PointMutationFinder => "ResFinder",
            Source::PhenotypeTable => "phenotype",
        }
    }

    pub fn from_label(label: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|s| s.label() == label)
    }

    pub fn is_tool(self) -> bool {
        self != Source::PhenotypeTable
    }

    pub fn antibiotic_column(self) -> String {
        format!("{}{}", ANTIBIOTIC_PREFIX, self.label())
    }

    pub fn tier_column(self) -> String {
        format!("{}{}", TIER_PREFIX, self.label())
    }

    /// Column layout of this source's tabular report.
    pub fn layout(self) -> SourceLayout {
        match self {
            Source::HomologyFinder => SourceLayout {
                source: self,
                gene_column: "Gene symbol",
                antibiotic_column: "Subclass",
                antibiotic_delimiter: "/",
                identity_column: Some("% Identity to reference sequence"),
                coverage_column: Some("% Coverage of reference sequence"),
                quality_column: None,
                exclude_quality: None,
                report_columns: &["Method"],
            },
            Source::CuratedDbFinder => SourceLayout {
                source: self,
                gene_column: "Best_Hit_ARO",
                antibiotic_column: "Drug Class",
                antibiotic_delimiter: "; ",
                identity_column: None,
                coverage_column: None,
                quality_column: Some("Cut_Off"),
                exclude_quality: Some("Loose"),
                report_columns: &[],
            },
            Source::PointMutationFinder => SourceLayout {
                source: self,
                gene_column: "Resistance gene",
                antibiotic_column: "Phenotype",
                antibiotic_delimiter: ",",
                identity_column: Some("Identity"),
                coverage_column: Some("Coverage"),
                quality_column: None,
                exclude_quality: None,
                report_columns: &[],
            },
            Source::PhenotypeTable => SourceLayout {
                source: self,
                gene_column: "Gene_accession no.",
                antibiotic_column: "Phenotype",
                antibiotic_delimiter: ",",
                identity_column: None,
                coverage_column: None,
                quality_column: None,
                exclude_quality: None,
                report_columns: &["Class"],
            },
        }
    }

    /// Where a tool leaves its tabular report inside a sample report
    /// directory. The phenotype table has no fixed location.
    pub fn report_path(self, dir: &Path) -> Option<PathBuf> {
        match self {
            Source::HomologyFinder => Some(dir.join("NCBIAMRFinder")),
            Source::CuratedDbFinder => Some(dir.join("CARD-RGI.txt")),
            Source::PointMutationFinder => {
                Some(dir.join("ResFinder").join("ResFinder_results_tab.txt"))
            }
            Source::PhenotypeTable => None,
        }
    }

    /// PointFinder's block report, only written by the point-mutation tool.
    pub fn point_report_path(self, dir: &Path) -> Option<PathBuf> {
        match self {
            Source::PointMutationFinder => {
                Some(dir.join("ResFinder").join("PointFinder_results.txt"))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Source-specific report columns and conventions.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    pub source: Source,
    pub gene_column: &'static str,
    pub antibiotic_column: &'static str,
    /// Separator between antibiotic names inside one cell.
    pub antibiotic_delimiter: &'static str,
    pub identity_column: Option<&'static str>,
    pub coverage_column: Option<&'static str>,
    pub quality_column: Option<&'static str>,
    /// Rows whose categorical quality equals this value are dropped up front.
    pub exclude_quality: Option<&'static str>,
    /// Extra columns copied verbatim into the normalized table.
    pub report_columns: &'static [&'static str],
}

impl SourceLayout {
    pub fn is_scored(&self) -> bool {
        self.identity_column.is_some() || self.coverage_column.is_some()
    }

    pub fn is_categorical(&self) -> bool {
        self.quality_column.is_some()
    }

    /// Canonical quality columns carried by the normalized table.
    pub fn quality_columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::new();
        if self.coverage_column.is_some() {
            cols.push("coverage");
        }
        if self.identity_column.is_some() {
            cols.push("identity");
        }
        if self.quality_column.is_some() {
            cols.push("quality");
        }
        cols
    }

    /// Column schema of the normalized table, stable even for zero rows.
    pub fn normalized_columns(&self) -> Vec<String> {
        let label = self.source.label();
        let mut cols = vec![
            self.source.antibiotic_column(),
            label.to_string(),
            KEY_COLUMN.to_string(),
        ];
        cols.extend(self.quality_columns().into_iter().map(String::from));
        if self.source.is_tool() {
            cols.push(self.source.tier_column());
        }
        cols.extend(self.report_columns.iter().map(|c| c.to_string()));
        cols
    }
}

// ============================================================================
// Tests
// ============================================================================
