//! View Builder Module
//!
//! Projects the merged gene table into the two report views:
//!
//! - **By-gene**: one row per gene key with every tool's gene labels and
//!   tiers, the resistance class and a predicted phenotype.
//! - **By-antibiotic**: one row per antibiotic name with, per tool, the
//!   genes implicating it and the strongest (minimum) tier among them.
//!
//! Both views pick a gene's antibiotic list from the first source in the
//! configured precedence that has one, so the curated phenotype table wins
//! over tool annotations by default.

use rustc_hash::FxHashMap;

use crate::config::ViewConfig;
use crate::source::{Source, KEY_COLUMN, TIER_PREFIX};
use crate::table::{Table, Value};

pub const ANTIBIOTIC_COLUMN: &str = "antibiotic";
pub const CLASS_COLUMN: &str = "Class";
pub const PREDICTED_COLUMN: &str = "predicted phenotype";

/// Antibiotic field of `row` from the first source in `precedence` that
/// reports one.
pub fn precedence_field<'a>(table: &'a Table, row: usize, precedence: &[Source]) -> Option<&'a str> {
    precedence
        .iter()
        .find_map(|s| table.text(row, &s.antibiotic_column()))
}

// ============================================================================
// By-Gene View
// ============================================================================

/// One row per gene key.
///
/// Columns: `mo`, then tier and tool gene-label columns in merged order,
/// `Class` and `predicted phenotype`.
pub fn by_gene(merged: &Table, config: &ViewConfig) -> Table {
    let mut columns: Vec<&str> = vec![KEY_COLUMN];
    for c in merged.columns() {
        let is_tool_label = Source::from_label(c).is_some_and(Source::is_tool);
        if c.starts_with(TIER_PREFIX) || is_tool_label {
            columns.push(c.as_str());
        }
    }
    columns.push(CLASS_COLUMN);

    let mut view = merged.select(&columns);
    view.add_column(PREDICTED_COLUMN);
    for row in 0..merged.len() {
        let predicted = precedence_field(merged, row, &config.precedence).map(Value::text);
        view.set(row, PREDICTED_COLUMN, predicted);
    }
    view
}

// ============================================================================
// By-Antibiotic View
// ============================================================================

#[derive(Default)]
struct AntibioticGroup {
    genes: Vec<Vec<String>>,
    tiers: Vec<Option<i64>>,
}

/// One row per antibiotic, in order of first appearance.
///
/// Columns: `antibiotic`, one gene-label column per tool present in the
/// merged table, then `tier_<label>` for the same tools.
pub fn by_antibiotic(merged: &Table, config: &ViewConfig) -> Table {
    let tools: Vec<Source> = Source::TOOLS
        .into_iter()
        .filter(|s| merged.has_column(s.label()))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut groups: Vec<AntibioticGroup> = Vec::new();

    for row in 0..merged.len() {
        let Some(field) = precedence_field(merged, row, &config.precedence) else {
            continue;
        };
        for name in field.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let gi = *index.entry(name.to_string()).or_insert_with(|| {
                order.push(name.to_string());
                groups.push(AntibioticGroup {
                    genes: vec![Vec::new(); tools.len()],
                    tiers: vec![None; tools.len()],
                });
                groups.len() - 1
            });
            let group = &mut groups[gi];

            for (ti, tool) in tools.iter().enumerate() {
                if let Some(labels) = merged.text(row, tool.label()) {
                    for gene in labels.split(',').map(str::trim).filter(|g| !g.is_empty()) {
                        if !group.genes[ti].iter().any(|g| g == gene) {
                            group.genes[ti].push(gene.to_string());
                        }
                    }
                }
                let tier = merged.get(row, &tool.tier_column()).and_then(Value::as_i64);
                if let Some(t) = tier {
                    group.tiers[ti] = Some(group.tiers[ti].map_or(t, |cur| cur.min(t)));
                }
            }
        }
    }

    let mut columns: Vec<String> = vec![ANTIBIOTIC_COLUMN.to_string()];
    columns.extend(tools.iter().map(|s| s.label().to_string()));
    columns.extend(tools.iter().map(|s| s.tier_column()));

    let mut view = Table::new(columns);
    for (name, group) in order.into_iter().zip(groups) {
        let mut row = vec![Some(Value::Text(name))];
        row.extend(
            group
                .genes
                .into_iter()
                .map(|g| (!g.is_empty()).then(|| Value::Text(g.join(",")))),
        );
        row.extend(group.tiers.into_iter().map(|t| t.map(Value::Int)));
        view.push_row(row);
    }
    view
}

// ============================================================================
// Tests
// ============================================================================
