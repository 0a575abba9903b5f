//! Consensus Predictor Module
//!
//! Turns the per-tool tiers of the by-antibiotic view into one weighted
//! score and a resistant / not-resistant call per antibiotic.
//!
//! # Scoring
//! Each tool with a tier contributes `(max_tier_value - tier) * weight`.
//! The score is the mean over contributing tools; tools without a tier for
//! the antibiotic are left out of the mean, not counted as zero. The call is
//! `score > max_tier_value * min_prediction_score`.
//!
//! With the defaults (`max_tier_value = 3`, `min_prediction_score = 0.5`,
//! weights 1.0) a single tier-0 hit or two tier-1 hits suffice.

use serde::Serialize;

use crate::config::ConsensusConfig;
use crate::source::TIER_PREFIX;
use crate::table::{Table, Value};
use crate::views::ANTIBIOTIC_COLUMN;

pub const SCORE_COLUMN: &str = "Mean weighted score";
pub const CUTOFF_COLUMN: &str = "Above resistance cutoff";

/// Consensus for one antibiotic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusScore {
    pub antibiotic: String,
    /// `None` when no tool reported a tier.
    pub score: Option<f64>,
    pub above_cutoff: bool,
}

/// Consensus rows in by-antibiotic view order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConsensusTable {
    pub rows: Vec<ConsensusScore>,
}

impl ConsensusTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, antibiotic: &str) -> Option<&ConsensusScore> {
        self.rows.iter().find(|r| r.antibiotic == antibiotic)
    }

    /// Antibiotics called resistant.
    pub fn resistant(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter(|r| r.above_cutoff)
            .map(|r| r.antibiotic.as_str())
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new([ANTIBIOTIC_COLUMN, SCORE_COLUMN, CUTOFF_COLUMN]);
        for r in &self.rows {
            table.push_row(vec![
                Some(Value::text(r.antibiotic.as_str())),
                r.score.map(Value::Float),
                Some(Value::Bool(r.above_cutoff)),
            ]);
        }
        table
    }
}

/// Scores every row of a by-antibiotic view.
///
/// The antibiotic name is read from the `antibiotic` column, or the first
/// column when that is absent. Every `tier_<label>` column takes part, with
/// the weight configured for `<label>`.
pub fn predict(by_antibiotic: &Table, config: &ConsensusConfig) -> ConsensusTable {
    let name_column = if by_antibiotic.has_column(ANTIBIOTIC_COLUMN) {
        Some(ANTIBIOTIC_COLUMN.to_string())
    } else {
        by_antibiotic.columns().first().cloned()
    };

    let tier_columns: Vec<(&str, f64)> = by_antibiotic
        .columns()
        .iter()
        .filter_map(|c| {
            let label = c.strip_prefix(TIER_PREFIX)?;
            Some((c.as_str(), config.weight_for(label)))
        })
        .collect();

    let cutoff = config.cutoff();
    let rows = (0..by_antibiotic.len())
        .map(|row| {
            let antibiotic = name_column
                .as_deref()
                .and_then(|c| by_antibiotic.get(row, c))
                .map(|v| v.to_string())
                .unwrap_or_default();

            let contributions: Vec<f64> = tier_columns
                .iter()
                .filter_map(|(col, weight)| {
                    let tier = by_antibiotic.get(row, col).and_then(Value::as_f64)?;
                    Some((config.max_tier_value - tier) * weight)
                })
                .collect();

            let score = (!contributions.is_empty())
                .then(|| contributions.iter().sum::<f64>() / contributions.len() as f64);

            ConsensusScore {
                antibiotic,
                score,
                above_cutoff: score.is_some_and(|s| s > cutoff),
            }
        })
        .collect();

    ConsensusTable { rows }
}

// ============================================================================
// Tests
// ============================================================================
