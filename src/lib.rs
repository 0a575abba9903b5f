//! amrconsensus - Consensus Antimicrobial Resistance Prediction
//!
//! Reconciles the reports of NCBI AMRFinderPlus, CARD-RGI and
//! ResFinder/PointFinder into one gene table keyed by a shared gene
//! identity, and scores every antibiotic by how strongly the tools agree.
//!
//! # Modules
//! - `table`: named-column tables exchanged between stages
//! - `tsv`: delimited report reading with gzip support
//! - `source`: evidence sources and their report layouts
//! - `classify`: confidence tiers from identity/coverage or categories
//! - `gene_key`: cross-tool gene identity (`mo`) resolution
//! - `normalize`: per-source hit records, deduplicated per gene key
//! - `pointfinder`: PointFinder mutation block reports
//! - `merge`: sort-merge joins on the gene key
//! - `views`: by-gene and by-antibiotic views
//! - `consensus`: weighted consensus score per antibiotic
//! - `reports`: locating and loading a sample's reports
//! - `pipeline`: per-sample assembly and report writing
//! - `tools`: running the detection tools and collecting versions
//! - `seqsphere`: SeqSphere+ `.spec` export
//! - `cohort`: multi-sample matrices
//! - `config`: TOML configuration
//! - `logging`: tracing subscriber setup

pub mod error;
pub mod table;
pub mod tsv;
pub mod source;
pub mod classify;
pub mod gene_key;
pub mod config;
pub mod normalize;
pub mod pointfinder;
pub mod merge;
pub mod views;
pub mod consensus;
pub mod reports;
pub mod pipeline;
pub mod tools;
pub mod seqsphere;
pub mod cohort;
pub mod logging;

pub use error::{CombineError, Result};
