//! Confidence Classifier Module
//!
//! Maps the quality signal of a hit onto an ordinal confidence tier,
//! 0 being the strongest evidence.
//!
//! # Cutoff Shapes
//! - **Scores**: tools reporting identity% and coverage% get one threshold
//!   pair per tier. A hit lands in the first tier whose thresholds it meets.
//! - **Categories**: tools reporting a categorical tier (CARD-RGI's
//!   `Perfect`/`Strict`/`Loose`) get an ordered list of accepted values.
//!
//! Classification is total: a hit that matches nothing, or lacks the values
//! needed to be compared, falls into the weakest tier.

use serde::{Deserialize, Serialize};

use crate::error::CombineError;

// ============================================================================
// Quality Signal
// ============================================================================

/// Quality evidence reported for a single hit.
#[derive(Debug, Clone, PartialEq)]
pub enum QualitySignal {
    Scores {
        identity: Option<f64>,
        coverage: Option<f64>,
    },
    Category(Option<String>),
    Unscored,
}

// ============================================================================
// Cutoffs
// ============================================================================

/// Minimum identity/coverage for one tier. `None` places no requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCutoff {
    pub identity: Option<f64>,
    pub coverage: Option<f64>,
}

impl ScoreCutoff {
    fn accepts(&self, identity: Option<f64>, coverage: Option<f64>) -> bool {
        meets(self.identity, identity) && meets(self.coverage, coverage)
    }
}

fn meets(threshold: Option<f64>, value: Option<f64>) -> bool {
    match (threshold, value) {
        (None, _) => true,
        (Some(t), Some(v)) => v >= t,
        (Some(_), None) => false,
    }
}

/// Per-source tier cutoffs, strongest tier first.
///
/// Deserializes from the column-wise form used in configuration files:
/// ```toml
/// identity = [100.0, 95.0, 0.0]
/// coverage = [100.0, 100.0, 0.0]
/// ```
/// or `quality = ["Perfect", "Strict", "Loose"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CutoffColumns", into = "CutoffColumns")]
pub enum TierCutoffs {
    Scores(Vec<ScoreCutoff>),
    Categories(Vec<String>),
}

impl TierCutoffs {
    /// Defaults shared by AMRFinderPlus and ResFinder.
    pub fn default_scores() -> Self {
        TierCutoffs::Scores(vec![
            ScoreCutoff { identity: Some(100.0), coverage: Some(100.0) },
            ScoreCutoff { identity: Some(95.0), coverage: Some(100.0) },
            ScoreCutoff { identity: Some(0.0), coverage: Some(0.0) },
        ])
    }

    /// Defaults for CARD-RGI's cut-off categories.
    pub fn default_categories() -> Self {
        TierCutoffs::Categories(
            ["Perfect", "Strict", "Loose"].iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            TierCutoffs::Scores(v) => v.len(),
            TierCutoffs::Categories(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the weakest tier.
    pub fn weakest(&self) -> usize {
        self.len().saturating_sub(1)
    }

    /// Tier for a hit. Always `< self.len()` for non-empty cutoffs.
    pub fn classify(&self, quality: &QualitySignal) -> usize {
        let matched = match (self, quality) {
            (TierCutoffs::Scores(tiers), QualitySignal::Scores { identity, coverage }) => {
                tiers.iter().position(|t| t.accepts(*identity, *coverage))
            }
            (TierCutoffs::Categories(tiers), QualitySignal::Category(Some(value))) => {
                tiers.iter().position(|t| t == value)
            }
            _ => None,
        };
        matched.unwrap_or_else(|| self.weakest())
    }
}

/// Column-wise serialized form of [`TierCutoffs`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutoffColumns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Vec<String>>,
}

impl TryFrom<CutoffColumns> for TierCutoffs {
    type Error = CombineError;

    fn try_from(cols: CutoffColumns) -> Result<Self, Self::Error> {
        match (cols.identity, cols.coverage, cols.quality) {
            (None, None, Some(quality)) => {
                if quality.is_empty() {
                    return Err(CombineError::Config("quality cutoffs are empty".into()));
                }
                Ok(TierCutoffs::Categories(quality))
            }
            (identity, coverage, None) if identity.is_some() || coverage.is_some() => {
                let n = identity.as_ref().or(coverage.as_ref()).map_or(0, Vec::len);
                if n == 0 {
                    return Err(CombineError::Config("score cutoffs are empty".into()));
                }
                if identity.as_ref().is_some_and(|v| v.len() != n)
                    || coverage.as_ref().is_some_and(|v| v.len() != n)
                {
                    return Err(CombineError::Config(
                        "identity and coverage cutoffs differ in length".into(),
                    ));
                }
                let tiers = (0..n)
                    .map(|i| ScoreCutoff {
                        identity: identity.as_ref().map(|v| v[i]),
                        coverage: coverage.as_ref().map(|v| v[i]),
                    })
                    .collect();
                Ok(TierCutoffs::Scores(tiers))
            }
            (None, None, None) => Err(CombineError::Config("cutoff table is empty".into())),
            _ => Err(CombineError::Config(
                "cutoffs mix score and quality columns".into(),
            )),
        }
    }
}

impl From<TierCutoffs> for CutoffColumns {
    fn from(cutoffs: TierCutoffs) -> Self {
        match cutoffs {
            TierCutoffs::Categories(quality) => CutoffColumns {
                quality: Some(quality),
                ..Default::default()
            },
            TierCutoffs::Scores(tiers) => {
                let identity: Option<Vec<f64>> = tiers.iter().map(|t| t.identity).collect();
                let coverage: Option<Vec<f64>> = tiers.iter().map(|t| t.coverage).collect();
                CutoffColumns { identity, coverage, quality: None }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(identity: f64, coverage: f64) -> QualitySignal {
        QualitySignal::Scores { identity: Some(identity), coverage: Some(coverage) }
    }

    #[test]
    fn test_classify_scores() {
        let cutoffs = TierCutoffs::default_scores();
        assert_eq!(cutoffs.classify(&scores(100.0, 100.0)), 0);
        assert_eq!(cutoffs.classify(&scores(99.1, 100.0)), 1);
        assert_eq!(cutoffs.classify(&scores(100.0, 98.0)), 2);
        assert_eq!(cutoffs.classify(&scores(80.0, 60.0)), 2);
    }

    #[test]
    fn test_classify_missing_value_is_weakest() {
        let cutoffs = TierCutoffs::default_scores();
        let q = QualitySignal::Scores { identity: Some(100.0), coverage: None };
        assert_eq!(cutoffs.classify(&q), 2);
        assert_eq!(cutoffs.classify(&QualitySignal::Unscored), 2);
    }

    #[test]
    fn test_classify_categories() {
        let cutoffs = TierCutoffs::default_categories();
        let cat = |s: &str| QualitySignal::Category(Some(s.to_string()));
        assert_eq!(cutoffs.classify(&cat("Perfect")), 0);
        assert_eq!(cutoffs.classify(&cat("Strict")), 1);
        assert_eq!(cutoffs.classify(&cat("Loose")), 2);
        assert_eq!(cutoffs.classify(&cat("perfect")), 2);
        assert_eq!(cutoffs.classify(&QualitySignal::Category(None)), 2);
    }

    #[test]
    fn test_classify_shape_mismatch_is_weakest() {
        let cutoffs = TierCutoffs::default_categories();
        assert_eq!(cutoffs.classify(&scores(100.0, 100.0)), 2);
    }

    #[test]
    fn test_classify_always_in_range() {
        let all = [TierCutoffs::default_scores(), TierCutoffs::default_categories()];
        let signals = [
            scores(f64::NAN, 100.0),
            scores(-1.0, 1e9),
            QualitySignal::Category(Some(String::new())),
            QualitySignal::Unscored,
        ];
        for cutoffs in &all {
            for s in &signals {
                assert!(cutoffs.classify(s) < cutoffs.len());
            }
        }
    }

    #[test]
    fn test_single_dimension_scores() {
        let cutoffs = TierCutoffs::try_from(CutoffColumns {
            identity: Some(vec![98.0, 0.0]),
            ..Default::default()
        })
        .unwrap();
        let q = QualitySignal::Scores { identity: Some(99.0), coverage: None };
        assert_eq!(cutoffs.classify(&q), 0);
    }

    #[test]
    fn test_cutoff_validation() {
        let mismatched = CutoffColumns {
            identity: Some(vec![100.0, 0.0]),
            coverage: Some(vec![100.0]),
            quality: None,
        };
        assert!(TierCutoffs::try_from(mismatched).is_err());

        let empty = CutoffColumns { quality: Some(vec![]), ..Default::default() };
        assert!(TierCutoffs::try_from(empty).is_err());

        assert!(TierCutoffs::try_from(CutoffColumns::default()).is_err());
    }

    #[test]
    fn test_columns_roundtrip() {
        let cols = CutoffColumns::from(TierCutoffs::default_scores());
        assert_eq!(cols.identity, Some(vec![100.0, 95.0, 0.0]));
        assert_eq!(cols.coverage, Some(vec![100.0, 100.0, 0.0]));
        assert_eq!(TierCutoffs::try_from(cols).unwrap(), TierCutoffs::default_scores());
    }
}
