//! Configuration: tier cutoffs, consensus weights, view precedence and
//! tool locations. Every section is optional in the TOML file and falls
//! back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::TierCutoffs;
use crate::error::{CombineError, Result};
use crate::source::Source;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tier cutoffs keyed by source label.
    pub cutoffs: BTreeMap<String, TierCutoffs>,
    pub consensus: ConsensusConfig,
    pub views: ViewConfig,
    pub tools: ToolConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut cutoffs = BTreeMap::new();
        cutoffs.insert(
            Source::HomologyFinder.label().to_string(),
            TierCutoffs::default_scores(),
        );
        cutoffs.insert(
            Source::CuratedDbFinder.label().to_string(),
            TierCutoffs::default_categories(),
        );
        cutoffs.insert(
            Source::PointMutationFinder.label().to_string(),
            TierCutoffs::default_scores(),
        );
        Self {
            cutoffs,
            consensus: ConsensusConfig::default(),
            views: ViewConfig::default(),
            tools: ToolConfig::default(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML configuration. Cutoff tables given in
    /// the file replace the defaults for their source only.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        for (label, cutoffs) in Config::default().cutoffs {
            config.cutoffs.entry(label).or_insert(cutoffs);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CombineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        for (label, cutoffs) in &self.cutoffs {
            match Source::from_label(label) {
                Some(source) if source.is_tool() => {}
                _ => {
                    return Err(CombineError::Config(format!(
                        "cutoffs given for unknown tool '{}'",
                        label
                    )))
                }
            }
            if cutoffs.is_empty() {
                return Err(CombineError::Config(format!("empty cutoffs for {}", label)));
            }
        }
        for source in Source::TOOLS {
            let cutoffs = self.cutoffs_for(source).ok_or_else(|| {
                CombineError::Config(format!("no cutoffs configured for {}", source))
            })?;
            let layout = source.layout();
            let compatible = match cutoffs {
                TierCutoffs::Scores(_) => layout.is_scored(),
                TierCutoffs::Categories(_) => layout.is_categorical(),
            };
            if !compatible {
                return Err(CombineError::Config(format!(
                    "cutoff kind does not match the quality columns reported by {}",
                    source
                )));
            }
        }
        self.consensus.validate()?;
        self.views.validate()?;
        Ok(())
    }

    pub fn cutoffs_for(&self, source: Source) -> Option<&TierCutoffs> {
        self.cutoffs.get(source.label())
    }
}

// ============================================================================
// Consensus
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Score of a tier-0 hit before weighting.
    pub max_tier_value: f64,
    /// Fraction of `max_tier_value` the mean must exceed.
    pub min_prediction_score: f64,
    /// Per-source weights keyed by label; unlisted sources weigh 1.0.
    pub weights: BTreeMap<String, f64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_tier_value: 3.0,
            min_prediction_score: 0.5,
            weights: BTreeMap::new(),
        }
    }
}

impl ConsensusConfig {
    pub fn weight_for(&self, label: &str) -> f64 {
        self.weights.get(label).copied().unwrap_or(1.0)
    }

    pub fn cutoff(&self) -> f64 {
        self.max_tier_value * self.min_prediction_score
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_tier_value > 0.0) {
            return Err(CombineError::Config("max_tier_value must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_prediction_score) {
            return Err(CombineError::Config(
                "min_prediction_score must be between 0 and 1".into(),
            ));
        }
        for (label, weight) in &self.weights {
            if Source::from_label(label).is_none() {
                return Err(CombineError::Config(format!("weight given for unknown source '{}'", label)));
            }
            if !(*weight >= 0.0) {
                return Err(CombineError::Config(format!("negative weight for {}", label)));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Sources consulted, in order, for a gene's antibiotic list.
    pub precedence: Vec<Source>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            precedence: vec![
                Source::PhenotypeTable,
                Source::HomologyFinder,
                Source::CuratedDbFinder,
                Source::PointMutationFinder,
            ],
        }
    }
}

impl ViewConfig {
    fn validate(&self) -> Result<()> {
        if self.precedence.is_empty() {
            return Err(CombineError::Config("view precedence is empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Tools
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub amrfinder: String,
    pub rgi: String,
    pub resfinder: String,
    pub db_resfinder: Option<PathBuf>,
    pub db_pointfinder: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            amrfinder: "amrfinder".to_string(),
            rgi: "rgi".to_string(),
            resfinder: "run_resfinder.py".to_string(),
            db_resfinder: None,
            db_pointfinder: None,
        }
    }
}

impl ToolConfig {
    pub fn command(&self, source: Source) -> Option<&str> {
        match source {
            Source::HomologyFinder => Some(self.amrfinder.as_str()),
            Source::CuratedDbFinder => Some(self.rgi.as_str()),
            Source::PointMutationFinder => Some(self.resfinder.as_str()),
            Source::PhenotypeTable => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
