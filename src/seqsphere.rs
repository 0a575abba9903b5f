//! SeqSphere+ `.spec` export of the resistant calls.
//!
//! ```text
//! ef.Antimicrobial.gentamicin=Resistant
//! ef.Antimicrobial.amoxicillin_clavulanic_acid=Resistant
//! ef.Antimicrobial.amrfinder_version=amrfinder-3.11.26;db-2023-11-15.1
//! ef.Antimicrobial.script_version=0.1.0
//! ```

use std::fs;
use std::path::Path;

use crate::pipeline::SampleReport;
use crate::source::Source;
use crate::tools::{VersionTable, MAIN_TOOL};

const FIELD_PREFIX: &str = "ef.Antimicrobial.";

/// Field name of a drug: lowercase, `+` and spaces become `_`.
pub fn drug_field(drug: &str) -> String {
    drug.replace(['+', ' '], "_").to_lowercase()
}

/// SeqSphere template field holding a tool's version.
pub fn version_tag(source: Source) -> Option<&'static str> {
    match source {
        Source::HomologyFinder => Some("amrfinder_version"),
        Source::CuratedDbFinder => Some("card_version"),
        Source::PointMutationFinder => Some("resfinder_version"),
        Source::PhenotypeTable => None,
    }
}

/// Renders the `.spec` lines for one sample.
pub fn render_spec<'a>(
    resistant: impl IntoIterator<Item = &'a str>,
    tools: impl IntoIterator<Item = Source>,
    versions: Option<&VersionTable>,
) -> String {
    let mut out = String::new();
    for drug in resistant {
        out.push_str(&format!("{}{}=Resistant\n", FIELD_PREFIX, drug_field(drug)));
    }
    if let Some(versions) = versions {
        for source in tools {
            let tag = version_tag(source);
            if let (Some(tag), Some(version)) = (tag, versions.get(source.label())) {
                out.push_str(&format!("{}{}={}\n", FIELD_PREFIX, tag, version));
            }
        }
    }
    let main = versions
        .and_then(|v| v.get(MAIN_TOOL))
        .unwrap_or(env!("CARGO_PKG_VERSION"));
    out.push_str(&format!("{}script_version={}\n", FIELD_PREFIX, main));
    out
}

pub fn write_spec(report: &SampleReport, path: &Path) -> crate::error::Result<()> {
    let text = render_spec(
        report.consensus.resistant(),
        report.tool_sources(),
        report.versions.as_ref(),
    );
    fs::write(path, text)?;
    Ok(())
}
