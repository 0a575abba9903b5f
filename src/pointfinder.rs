//! Point Mutation Report Module
//!
//! Parses the block-structured `PointFinder_results.txt` that ResFinder
//! writes next to its acquired-gene table, turning every reported mutation
//! into [`HitRecord`]s of the point-mutation source.
//!
//! # Report Layout
//! ```text
//! Chromosomal point mutations
//! gyrA
//! Mutation	Nucleotide change	Amino acid change	Resistance	PMID
//! gyrA p.S83L	TCG -> TTG	S -> L	Nalidixic acid,Ciprofloxacin	8891148
//! 23S
//! Mutation	Nucleotide change	Amino acid change	Resistance	PMID
//! 23S r.2058A>G	A -> G	-	Erythromycin	12345
//! ```
//!
//! # Mutation Name Format
//! - Protein: `p.<Ref><Pos><Alt>`, e.g. `p.S83L`, `p.Q78*`
//! - Nucleotide: `<n|r>.<Pos><Ref>><Alt>`, e.g. `r.2058A>G`, `n.-42C>T`
//!
//! Both become `<gene>_<ref><pos><alt>` in lowercase (`gyra_s83l`,
//! `23s_a2058g`), which is also the record's merge key.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::classify::QualitySignal;
use crate::gene_key::resolve_gene_key;
use crate::normalize::{normalize_antibiotics, HitRecord};
use crate::source::Source;

static PROTEIN_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^p\.([A-Za-z*])(-?[0-9]+)([A-Za-z*])$").expect("protein change pattern")
});

static NUCLEOTIDE_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[nr]\.(-?[0-9]+)([A-Za-z]+)>([A-Za-z]+)$").expect("nucleotide change pattern")
});

// ============================================================================
// Point Mutation
// ============================================================================

/// Sequence level of a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Protein,
    Nucleotide,
}

/// A parsed point mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMutation {
    pub gene: String,
    pub kind: ChangeKind,
    pub reference: String,
    /// Position in the gene; negative for promoter positions.
    pub position: i64,
    pub alternate: String,
}

impl PointMutation {
    /// Canonical lowercase label, `gyra_s83l`.
    pub fn label(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for PointMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}{}{}", self.gene, self.reference, self.position, self.alternate)
    }
}

/// Parses a mutation name such as `p.S83L` or `r.2058A>G` within `gene`.
///
/// # Examples
/// ```
/// use amrconsensus::pointfinder::parse_mutation;
///
/// let m = parse_mutation("gyrA", "p.S83L").unwrap();
/// assert_eq!(m.position, 83);
/// assert_eq!(m.label(), "gyra_s83l");
/// ```
pub fn parse_mutation(gene: &str, change: &str) -> Option<PointMutation> {
    if let Some(caps) = PROTEIN_CHANGE.captures(change) {
        return Some(PointMutation {
            gene: gene.to_string(),
            kind: ChangeKind::Protein,
            reference: caps[1].to_string(),
            position: caps[2].parse().ok()?,
            alternate: caps[3].to_string(),
        });
    }
    let caps = NUCLEOTIDE_CHANGE.captures(change)?;
    Some(PointMutation {
        gene: gene.to_string(),
        kind: ChangeKind::Nucleotide,
        reference: caps[2].to_string(),
        position: caps[1].parse().ok()?,
        alternate: caps[3].to_string(),
    })
}

// ============================================================================
// Block Parser
// ============================================================================

fn is_gene_header(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.contains(|c: char| c.is_whitespace() || c == ':')
}

fn point_record(gene_label: String, antibiotics: Vec<String>, tier: usize) -> HitRecord {
    HitRecord {
        source: Source::PointMutationFinder,
        gene_key: resolve_gene_key(&gene_label),
        gene_label,
        antibiotics,
        quality: QualitySignal::Unscored,
        tier: Some(tier),
        extras: Vec::new(),
    }
}

/// Parses a PointFinder block report.
///
/// Recognized mutations yield one tier-0 record per resistance term.
/// Mutation lines whose change cannot be parsed are kept as a single record
/// at `weakest_tier`. Lines outside a gene block are ignored.
pub fn parse_point_report(text: &str, weakest_tier: usize) -> Vec<HitRecord> {
    let mut records = Vec::new();
    let mut current_gene: Option<&str> = None;
    let mut unparsed = 0usize;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if is_gene_header(line) {
            current_gene = Some(line.trim());
            continue;
        }
        let Some(gene) = current_gene else {
            continue;
        };
        if !line.contains('\t') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields[0].starts_with("Mutation") {
            continue;
        }
        let Some(change) = fields[0].split_whitespace().last() else {
            continue;
        };
        let terms = fields
            .get(3)
            .map(|f| normalize_antibiotics(f, ","))
            .unwrap_or_default();

        match parse_mutation(gene, change) {
            Some(mutation) => {
                let label = mutation.label();
                if terms.is_empty() {
                    records.push(point_record(label, Vec::new(), 0));
                    continue;
                }
                for term in terms {
                    records.push(point_record(label.clone(), vec![term], 0));
                }
            }
            None => {
                unparsed += 1;
                let label = format!("{}_{}", gene, change).to_lowercase();
                records.push(point_record(label, terms, weakest_tier));
            }
        }
    }

    debug!(records = records.len(), unparsed, "parsed point mutation report");
    records
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Chromosomal point mutations
Mutation\tNucleotide change\tAmino acid change\tResistance\tPMID
gyrA
Mutation\tNucleotide change\tAmino acid change\tResistance\tPMID
gyrA p.S83L\tTCG -> TTG\tS -> L\tNalidixic acid,Ciprofloxacin\t8891148
gyrA p.D87N\tGAC -> AAC\tD -> N\tNalidixic acid\t8891148

No known mutations found in parC
23S
Mutation\tNucleotide change\tAmino acid change\tResistance\tPMID
23S r.2058A>G\tA -> G\t-\tErythromycin\t12345
ampC
Mutation\tNucleotide change\tAmino acid change\tResistance\tPMID
ampC promoter n.-42C>T\tC -> T\t-\tAmpicillin\t
ampC weird-change\t-\t-\tCefoxitin\t
";

    #[test]
    fn test_parse_protein_mutation() {
        let m = parse_mutation("gyrA", "p.S83L").unwrap();
        assert_eq!(m.kind, ChangeKind::Protein);
        assert_eq!(m.reference, "S");
        assert_eq!(m.position, 83);
        assert_eq!(m.alternate, "L");
        assert_eq!(m.to_string(), "gyrA_S83L");

        let stop = parse_mutation("ompR", "p.Q78*").unwrap();
        assert_eq!(stop.label(), "ompr_q78*");
    }

    #[test]
    fn test_parse_nucleotide_mutation() {
        let m = parse_mutation("23S", "r.2058A>G").unwrap();
        assert_eq!(m.kind, ChangeKind::Nucleotide);
        assert_eq!(m.label(), "23s_a2058g");

        let promoter = parse_mutation("ampC", "n.-42C>T").unwrap();
        assert_eq!(promoter.position, -42);
        assert_eq!(promoter.label(), "ampc_c-42t");
    }

    #[test]
    fn test_parse_mutation_rejects_other_text() {
        assert!(parse_mutation("gyrA", "S83L").is_none());
        assert!(parse_mutation("gyrA", "p.S83").is_none());
        assert!(parse_mutation("gyrA", "c.248C>T").is_none());
    }

    #[test]
    fn test_gene_header() {
        assert!(is_gene_header("gyrA"));
        assert!(is_gene_header("23S"));
        assert!(!is_gene_header("Chromosomal point mutations"));
        assert!(!is_gene_header("Species: Escherichia coli"));
        assert!(!is_gene_header(""));
        assert!(is_gene_header("gyrA \t"));
    }

    #[test]
    fn test_mutation_without_resistance_terms() {
        let report = "parC\nparC p.S80I\tAGC -> ATC\tS -> I\t\t\n";
        let records = parse_point_report(report, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gene_label, "parc_s80i");
        assert_eq!(records[0].tier, Some(0));
        assert!(records[0].antibiotics.is_empty());
    }

    #[test]
    fn test_header_with_trailing_whitespace() {
        let report = "\
gyrA \t
Mutation\tNucleotide change\tAmino acid change\tResistance\tPMID
gyrA p.S83L\tTCG -> TTG\tS -> L\tCiprofloxacin\t1
";
        let records = parse_point_report(report, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].gene_label, "gyra_s83l");
        assert_eq!(records[0].antibiotics, vec!["ciprofloxacin"]);
    }

    #[test]
    fn test_parse_point_report() {
        let records = parse_point_report(REPORT, 2);
        let summary: Vec<(&str, &str, Option<usize>)> = records
            .iter()
            .map(|r| (r.gene_label.as_str(), r.antibiotics[0].as_str(), r.tier))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("gyra_s83l", "nalidixic acid", Some(0)),
                ("gyra_s83l", "ciprofloxacin", Some(0)),
                ("gyra_d87n", "nalidixic acid", Some(0)),
                ("23s_a2058g", "erythromycin", Some(0)),
                ("ampc_c-42t", "ampicillin", Some(0)),
                ("ampc_weird-change", "cefoxitin", Some(2)),
            ]
        );
        assert!(records.iter().all(|r| r.source == Source::PointMutationFinder));
        assert_eq!(records[0].gene_key, "gyra_s83l");
    }

    #[test]
    fn test_point_records_consolidate_per_mutation() {
        let records = parse_point_report(REPORT, 2);
        let table = crate::normalize::consolidate(Source::PointMutationFinder, records);
        let gyra = table.records.iter().find(|r| r.gene_key == "gyra_s83l").unwrap();
        assert_eq!(gyra.antibiotics, vec!["nalidixic acid", "ciprofloxacin"]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_empty_report() {
        assert!(parse_point_report("", 2).is_empty());
        assert!(parse_point_report("Chromosomal point mutations\n", 2).is_empty());
    }
}
