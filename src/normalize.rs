//! Record Normalizer Module
//!
//! Turns one tool's raw report table into canonical [`HitRecord`]s and
//! collapses them to one record per gene key.
//!
//! # Normalization Steps
//! 1. Drop rows with an excluded categorical quality (CARD-RGI `Loose`)
//! 2. Read identity/coverage/quality into a [`QualitySignal`] and classify it
//! 3. Normalize the antibiotic list (comma separated, lowercase, without the
//!    word "antibiotic")
//! 4. Resolve the gene key
//! 5. Order hits strongest first, deduplicate by gene label
//! 6. Group by gene key; the strongest tier group wins and its labels and
//!    antibiotics are joined
//!
//! An empty report still produces a [`SourceTable`] whose [`Table`] carries
//! the full column schema, so merging never depends on which tools found
//! something.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::classify::{QualitySignal, TierCutoffs};
use crate::config::Config;
use crate::error::{CombineError, Result};
use crate::gene_key::resolve_gene_key;
use crate::source::{Source, SourceLayout};
use crate::table::{Table, Value};

static ANTIBIOTIC_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bantibiotic\b").expect("antibiotic word pattern"));

// ============================================================================
// Hit Record
// ============================================================================

/// One gene or variant call from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub source: Source,
    /// Gene label as reported; comma-joined once records are grouped.
    pub gene_label: String,
    /// Normalized antibiotic or class names.
    pub antibiotics: Vec<String>,
    /// Cross-source merge key (`mo`).
    pub gene_key: String,
    pub quality: QualitySignal,
    /// Confidence tier, 0 = strongest. `None` for unclassified sources.
    pub tier: Option<usize>,
    /// Source-specific report columns carried through unchanged.
    pub extras: Vec<(String, Option<String>)>,
}

impl HitRecord {
    pub fn antibiotic_field(&self) -> Option<String> {
        (!self.antibiotics.is_empty()).then(|| self.antibiotics.join(","))
    }

    fn identity(&self) -> Option<f64> {
        match self.quality {
            QualitySignal::Scores { identity, .. } => identity,
            _ => None,
        }
    }

    fn coverage(&self) -> Option<f64> {
        match self.quality {
            QualitySignal::Scores { coverage, .. } => coverage,
            _ => None,
        }
    }
}

// ============================================================================
// Source Table
// ============================================================================

/// Normalized records of one source, one per gene key.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    pub source: Source,
    pub records: Vec<HitRecord>,
}

impl SourceTable {
    pub fn empty(source: Source) -> Self {
        Self { source, records: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders the records under the source's normalized column schema.
    pub fn to_table(&self) -> Table {
        let layout = self.source.layout();
        let mut table = Table::new(layout.normalized_columns());

        for rec in &self.records {
            let mut row = vec![
                rec.antibiotic_field().map(Value::Text),
                Some(Value::text(rec.gene_label.as_str())),
                Some(Value::text(rec.gene_key.as_str())),
            ];
            for col in layout.quality_columns() {
                row.push(match (col, &rec.quality) {
                    ("coverage", _) => rec.coverage().map(Value::Float),
                    ("identity", _) => rec.identity().map(Value::Float),
                    ("quality", QualitySignal::Category(Some(q))) => Some(Value::text(q.as_str())),
                    _ => None,
                });
            }
            if self.source.is_tool() {
                row.push(rec.tier.map(|t| Value::Int(t as i64)));
            }
            for col in layout.report_columns {
                let extra = rec
                    .extras
                    .iter()
                    .find(|(name, _)| name == col)
                    .and_then(|(_, v)| v.clone());
                row.push(extra.map(Value::Text));
            }
            table.push_row(row);
        }

        table
    }
}

// ============================================================================
// Field Normalization
// ============================================================================

/// Splits an antibiotic cell on the source delimiter and normalizes each name.
///
/// `"fluoroquinolone antibiotic; tetracycline antibiotic"` with `"; "`
/// becomes `["fluoroquinolone", "tetracycline"]`.
pub fn normalize_antibiotics(field: &str, delimiter: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for part in field.split(delimiter).flat_map(|p| p.split(',')) {
        let lowered = part.to_lowercase();
        let name = ANTIBIOTIC_WORD.replace_all(&lowered, "");
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// The phenotype table keys genes as `gene_variant_accession`.
fn phenotype_gene_label(raw: &str) -> &str {
    raw.split('_').next().unwrap_or(raw)
}

fn require_column(table: &Table, layout: &SourceLayout, column: &str) -> Result<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(CombineError::MissingColumn {
            table: layout.source.label().to_string(),
            column: column.to_string(),
        })
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Reads every usable row of a raw report into a classified hit.
///
/// Rows without a gene label are skipped. A report without any header
/// (zero-byte file) yields no hits.
pub fn collect_hits(
    raw: &Table,
    source: Source,
    cutoffs: Option<&TierCutoffs>,
) -> Result<Vec<HitRecord>> {
    let layout = source.layout();
    if raw.columns().is_empty() {
        return Ok(Vec::new());
    }

    require_column(raw, &layout, layout.gene_column)?;
    require_column(raw, &layout, layout.antibiotic_column)?;
    for col in [layout.identity_column, layout.coverage_column, layout.quality_column]
        .into_iter()
        .flatten()
    {
        require_column(raw, &layout, col)?;
    }

    let mut hits = Vec::with_capacity(raw.len());
    for row in 0..raw.len() {
        let Some(label) = raw.text(row, layout.gene_column) else {
            debug!(source = %source, row, "skipping row without gene label");
            continue;
        };

        let category = layout.quality_column.and_then(|c| raw.text(row, c));
        if let (Some(excluded), Some(value)) = (layout.exclude_quality, category) {
            if value == excluded {
                continue;
            }
        }

        let quality = if layout.is_scored() {
            QualitySignal::Scores {
                identity: layout
                    .identity_column
                    .and_then(|c| raw.get(row, c))
                    .and_then(Value::as_f64),
                coverage: layout
                    .coverage_column
                    .and_then(|c| raw.get(row, c))
                    .and_then(Value::as_f64),
            }
        } else if layout.is_categorical() {
            QualitySignal::Category(category.map(str::to_string))
        } else {
            QualitySignal::Unscored
        };

        let tier = if source.is_tool() {
            cutoffs.map(|c| c.classify(&quality))
        } else {
            None
        };

        let gene_label = match source {
            Source::PhenotypeTable => phenotype_gene_label(label),
            _ => label,
        }
        .to_string();

        let antibiotics = raw
            .text(row, layout.antibiotic_column)
            .map(|f| normalize_antibiotics(f, layout.antibiotic_delimiter))
            .unwrap_or_default();

        let extras = layout
            .report_columns
            .iter()
            .map(|c| (c.to_string(), raw.text(row, c).map(str::to_string)))
            .collect();

        hits.push(HitRecord {
            source,
            gene_key: resolve_gene_key(&gene_label),
            gene_label,
            antibiotics,
            quality,
            tier,
            extras,
        });
    }

    Ok(hits)
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Strongest first: lowest tier, then highest coverage, then identity.
fn strength_order(a: &HitRecord, b: &HitRecord) -> Ordering {
    let tier_rank = |h: &HitRecord| h.tier.unwrap_or(usize::MAX);
    tier_rank(a)
        .cmp(&tier_rank(b))
        .then_with(|| descending(a.coverage(), b.coverage()))
        .then_with(|| descending(a.identity(), b.identity()))
}

fn union_into(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Collapses hits to one record per gene key.
///
/// Within a key only the strongest tier survives; the gene labels of that
/// tier are comma-joined and their antibiotic lists unioned.
pub fn consolidate(source: Source, mut hits: Vec<HitRecord>) -> SourceTable {
    hits.sort_by(strength_order);

    // Deduplicate by gene label, keeping the strongest instance.
    let mut by_label: FxHashMap<String, usize> = FxHashMap::default();
    let mut unique: Vec<HitRecord> = Vec::with_capacity(hits.len());
    for hit in hits {
        match by_label.get(&hit.gene_label) {
            Some(&idx) => {
                if unique[idx].tier == hit.tier {
                    union_into(&mut unique[idx].antibiotics, &hit.antibiotics);
                }
            }
            None => {
                by_label.insert(hit.gene_label.clone(), unique.len());
                unique.push(hit);
            }
        }
    }

    // Group by gene key; the first hit of a key carries its strongest tier.
    let mut by_key: FxHashMap<String, usize> = FxHashMap::default();
    let mut grouped: Vec<HitRecord> = Vec::new();
    let mut labels: Vec<Vec<String>> = Vec::new();
    for hit in unique {
        match by_key.get(&hit.gene_key) {
            Some(&idx) => {
                if grouped[idx].tier == hit.tier {
                    if !labels[idx].contains(&hit.gene_label) {
                        labels[idx].push(hit.gene_label.clone());
                    }
                    union_into(&mut grouped[idx].antibiotics, &hit.antibiotics);
                }
            }
            None => {
                by_key.insert(hit.gene_key.clone(), grouped.len());
                labels.push(vec![hit.gene_label.clone()]);
                grouped.push(hit);
            }
        }
    }

    for (rec, names) in grouped.iter_mut().zip(labels) {
        rec.gene_label = names.join(",");
    }
    grouped.sort_by(|a, b| a.gene_key.cmp(&b.gene_key));

    SourceTable { source, records: grouped }
}

/// Normalizes a raw report, merging in any already-parsed extra hits
/// (point mutations for ResFinder).
pub fn normalize_with(
    raw: &Table,
    source: Source,
    config: &Config,
    extra_hits: Vec<HitRecord>,
) -> Result<SourceTable> {
    let mut hits = collect_hits(raw, source, config.cutoffs_for(source))?;
    let parsed = hits.len();
    hits.extend(extra_hits);

    let table = consolidate(source, hits);
    debug!(
        source = %source,
        rows = raw.len(),
        hits = parsed,
        genes = table.len(),
        "normalized report"
    );
    Ok(table)
}

/// Normalizes a raw report table.
pub fn normalize(raw: &Table, source: Source, config: &Config) -> Result<SourceTable> {
    normalize_with(raw, source, config, Vec::new())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tsv::read_delimited;

    fn parse(text: &str) -> Table {
        read_delimited(text.as_bytes(), b'\t').unwrap()
    }

    const AMRFINDER: &str = "\
Protein identifier\tGene symbol\tSequence name\tElement type\tClass\tSubclass\tMethod\t% Coverage of reference sequence\t% Identity to reference sequence
NA\tblaTEM-1\tclass A beta-lactamase TEM-1\tAMR\tBETA-LACTAM\tBETA-LACTAM\tALLELEX\t100.00\t100.00
NA\tblaCTX-M-15\tclass A ESBL CTX-M-15\tAMR\tBETA-LACTAM\tCEPHALOSPORIN\tALLELEX\t100.00\t100.00
NA\tblaCTX-M-55\tclass A ESBL CTX-M-55\tAMR\tBETA-LACTAM\tCEPHALOSPORIN/PENICILLIN\tALLELEX\t100.00\t96.00
NA\taac(3)-IIe\taminoglycoside acetyltransferase\tAMR\tAMINOGLYCOSIDE\tGENTAMICIN/TOBRAMYCIN\tBLASTX\t99.00\t99.60
";

    const RGI: &str = "\
ORF_ID\tCut_Off\tBest_Hit_ARO\tDrug Class\tBest_Identities
c1\tPerfect\tTEM-1\tmonobactam; cephalosporin; penam\t100.0
c2\tStrict\tEscherichia coli ampC beta-lactamase\tcephalosporin; penam\t98.5
c3\tLoose\tsul1\tsulfonamide antibiotic\t40.0
c4\tStrict\tAAC(3)-IIe\taminoglycoside antibiotic\t99.0
";

    #[test]
    fn test_normalize_antibiotics() {
        assert_eq!(
            normalize_antibiotics("fluoroquinolone antibiotic; tetracycline antibiotic", "; "),
            vec!["fluoroquinolone", "tetracycline"]
        );
        assert_eq!(
            normalize_antibiotics("GENTAMICIN/TOBRAMYCIN", "/"),
            vec!["gentamicin", "tobramycin"]
        );
        assert_eq!(
            normalize_antibiotics("Amoxicillin, Ampicillin,amoxicillin", ","),
            vec!["amoxicillin", "ampicillin"]
        );
        assert!(normalize_antibiotics("  ", ",").is_empty());
    }

    #[test]
    fn test_normalize_homology_groups_by_key() {
        let config = Config::default();
        let table = normalize(&parse(AMRFINDER), Source::HomologyFinder, &config).unwrap();

        let keys: Vec<&str> = table.records.iter().map(|r| r.gene_key.as_str()).collect();
        assert_eq!(keys, vec!["aac(3)-iie", "ctx-m", "tem"]);

        // CTX-M-15 (tier 0) beats CTX-M-55 (tier 1); only the tier-0 label survives.
        let ctx = &table.records[1];
        assert_eq!(ctx.tier, Some(0));
        assert_eq!(ctx.gene_label, "blaCTX-M-15");
        assert_eq!(ctx.antibiotics, vec!["cephalosporin"]);

        let aac = &table.records[0];
        assert_eq!(aac.tier, Some(2));
        assert_eq!(aac.antibiotics, vec!["gentamicin", "tobramycin"]);
        assert_eq!(aac.extras, vec![("Method".to_string(), Some("BLASTX".to_string()))]);
    }

    #[test]
    fn test_normalize_curated_drops_loose() {
        let config = Config::default();
        let table = normalize(&parse(RGI), Source::CuratedDbFinder, &config).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.records.iter().all(|r| r.gene_key != "sul"));

        let ampc = table.records.iter().find(|r| r.gene_key == "ampc").unwrap();
        assert_eq!(ampc.tier, Some(1));
        assert_eq!(ampc.antibiotics, vec!["cephalosporin", "penam"]);

        let aac = table.records.iter().find(|r| r.gene_key == "aac(3)-iie").unwrap();
        assert_eq!(aac.antibiotics, vec!["aminoglycoside"]);
    }

    #[test]
    fn test_same_tier_labels_joined() {
        let text = "\
Resistance gene\tIdentity\tCoverage\tPhenotype
blaTEM-1\t100.00\t100.00\tAmoxicillin,Ampicillin
blaTEM-2\t100.00\t100.00\tPiperacillin
blaTEM-1\t99.00\t100.00\tTicarcillin
";
        let table = normalize(&parse(text), Source::PointMutationFinder, &Config::default()).unwrap();
        assert_eq!(table.len(), 1);
        let tem = &table.records[0];
        assert_eq!(tem.gene_key, "tem");
        assert_eq!(tem.gene_label, "blaTEM-1,blaTEM-2");
        assert_eq!(tem.antibiotics, vec!["amoxicillin", "ampicillin", "piperacillin"]);
    }

    #[test]
    fn test_phenotype_label_and_class() {
        let text = "\
Gene_accession no.\tClass\tPhenotype\tPMID
blaTEM-1_1_J01749\tBeta-lactam\tAmoxicillin, Ampicillin\t
blaTEM-2_1_X54606\tBeta-lactam\tAmoxicillin, Cephalothin\t
aac(3)-IIa_1_X51534\tAminoglycoside\tGentamicin, Tobramycin\t
";
        let table = normalize(&parse(text), Source::PhenotypeTable, &Config::default()).unwrap();
        assert_eq!(table.len(), 2);

        let tem = table.records.iter().find(|r| r.gene_key == "tem").unwrap();
        assert_eq!(tem.tier, None);
        assert_eq!(tem.gene_label, "blaTEM-1,blaTEM-2");
        assert_eq!(tem.antibiotics, vec!["amoxicillin", "ampicillin", "cephalothin"]);

        let rendered = table.to_table();
        assert!(!rendered.has_column("tier_phenotype"));
        let row = (0..rendered.len()).find(|&r| rendered.text(r, "mo") == Some("aac(3)-iia")).unwrap();
        assert_eq!(rendered.text(row, "Class"), Some("Aminoglycoside"));
    }

    #[test]
    fn test_empty_report_keeps_schema() {
        let config = Config::default();
        for source in Source::ALL {
            let table = normalize(&Table::default(), source, &config).unwrap();
            assert!(table.is_empty());
            let rendered = table.to_table();
            assert!(rendered.is_empty());
            assert_eq!(rendered.columns(), source.layout().normalized_columns().as_slice());
        }

        let header_only = parse("Resistance gene\tIdentity\tCoverage\tPhenotype\n");
        let table = normalize(&header_only, Source::PointMutationFinder, &config).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_column_is_error() {
        let raw = parse("Gene symbol\tSubclass\nsul1\tSULFONAMIDE\n");
        let err = normalize(&raw, Source::HomologyFinder, &Config::default()).unwrap_err();
        assert!(matches!(err, CombineError::MissingColumn { .. }));
    }

    #[test]
    fn test_unparsable_scores_fall_to_weakest() {
        let raw = parse("Resistance gene\tIdentity\tCoverage\tPhenotype\nsul2\tNA\t100\tSulfamethoxazole\n");
        let table = normalize(&raw, Source::PointMutationFinder, &Config::default()).unwrap();
        assert_eq!(table.records[0].tier, Some(2));
    }

    #[test]
    fn test_to_table_columns_and_values() {
        let table = normalize(&parse(AMRFINDER), Source::HomologyFinder, &Config::default())
            .unwrap()
            .to_table();
        let row = (0..table.len()).find(|&r| table.text(r, "mo") == Some("tem")).unwrap();
        assert_eq!(table.text(row, "antibiotic_NCBIAMRFinder"), Some("beta-lactam"));
        assert_eq!(table.text(row, "NCBIAMRFinder"), Some("blaTEM-1"));
        assert_eq!(table.get(row, "tier_NCBIAMRFinder"), Some(&Value::Int(0)));
        assert_eq!(table.get(row, "identity"), Some(&Value::Float(100.0)));
        assert_eq!(table.text(row, "Method"), Some("ALLELEX"));
    }
}
