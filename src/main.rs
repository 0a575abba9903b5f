use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use amrconsensus::cohort::write_cohort;
use amrconsensus::config::Config;
use amrconsensus::logging::init_tracing;
use amrconsensus::normalize::SourceTable;
use amrconsensus::pipeline::{assemble, write_outputs, SampleReport};
use amrconsensus::reports::{load_phenotypes, load_sample};
use amrconsensus::seqsphere::write_spec;
use amrconsensus::source::Source;
use amrconsensus::tools::{
    available_tools, collect_versions, prepare_input, run_tools, CommandRunner,
};

#[derive(Parser)]
#[command(name = "amrconsensus")]
#[command(version)]
#[command(about = "Consensus AMR prediction from AMRFinderPlus, CARD-RGI and ResFinder")]
#[command(long_about = r#"
amrconsensus - consensus antimicrobial resistance prediction

Combines the reports of three resistance detection tools:
  NCBIAMRFinder   NCBI AMRFinderPlus (sequence homology)
  CARD-RGI        CARD Resistance Gene Identifier (curated database)
  ResFinder       CGE ResFinder + PointFinder (acquired genes, point mutations)

WORKFLOW:
  Reports → normalize per tool → resolve gene key → classify tier
          → merge on gene key → views → weighted consensus per antibiotic

REPORT DIRECTORY LAYOUT (files may be gzipped):
  NCBIAMRFinder
  CARD-RGI.txt
  ResFinder/ResFinder_results_tab.txt
  ResFinder/PointFinder_results.txt

OUTPUT FILES (';' separated, all fields quoted):
  {sample}.view1.csv        By-antibiotic view
  {sample}.view2.csv        By-gene view
  {sample}.consensus.csv    Mean weighted score and resistance call
  {sample}.merged.csv       Merged gene table
  {sample}.raw_{tool}.csv   Normalized per-tool tables
  {sample}.versions.csv     Tool versions (when tools were run)
  {sample}.consensus.json   With --json
  consensus_prediction_combined.csv, {tool}_combined.csv   Batch mode

INPUT MODES:
  Reports  One sample report directory (-r)
  Batch    Directory whose sub-directories are report directories (-l)
  Assembly Run the tools on a FASTA assembly first (-i)

EXAMPLES:
  amrconsensus -r reports/S1/ -p phenotypes.txt -o results/
  amrconsensus -l reports/ -p phenotypes.txt -o results/ -t 8
  amrconsensus -i S1.fasta.gz -s "Escherichia coli" --spec S1.spec -o results/
"#)]
struct Args {
    #[arg(short = 'r', long, value_name = "DIR", help_heading = "Input")]
    reports: Option<PathBuf>,

    #[arg(short = 'l', long, value_name = "DIR", help_heading = "Input", conflicts_with_all = ["reports", "input", "spec"])]
    samples: Option<PathBuf>,

    #[arg(short = 'i', long, value_name = "FASTA", help_heading = "Input", conflicts_with = "reports")]
    input: Option<PathBuf>,

    /// Sample name (default: report directory or FASTA file name)
    #[arg(short = 'n', long, value_name = "SAMPLE", help_heading = "Input")]
    name: Option<String>,

    /// Gene → phenotype annotation table (ResFinder phenotypes.txt)
    #[arg(short = 'p', long, value_name = "FILE", help_heading = "Input")]
    phenotypes: Option<PathBuf>,

    #[arg(short = 's', long, value_name = "SPECIES", help_heading = "Tools")]
    species: Option<String>,

    /// Use every available tool (default when no tool is selected)
    #[arg(long, help_heading = "Tools")]
    auto: bool,

    #[arg(long, help_heading = "Tools")]
    amrfinder: bool,

    #[arg(long, help_heading = "Tools")]
    rgi: bool,

    #[arg(long, help_heading = "Tools")]
    resfinder: bool,

    /// Parent directory for temporary tool output
    #[arg(long = "tmp", value_name = "DIR", default_value = "/tmp", help_heading = "Tools")]
    tmpdir: PathBuf,

    /// Print tool versions and exit
    #[arg(long, help_heading = "Tools")]
    versions: bool,

    #[arg(short = 'o', long, value_name = "DIR", default_value = ".", help_heading = "Output")]
    outdir: PathBuf,

    /// Write resistant calls as a SeqSphere+ .spec file
    #[arg(long, value_name = "FILE", help_heading = "Output")]
    spec: Option<PathBuf>,

    /// Also write {sample}.consensus.json
    #[arg(long, help_heading = "Output")]
    json: bool,

    #[arg(short = 'c', long, value_name = "FILE", help_heading = "Runtime")]
    config: Option<PathBuf>,

    /// Threads for batch mode (0 = all CPUs)
    #[arg(short = 't', long, default_value = "0", help_heading = "Runtime")]
    threads: usize,

    #[arg(short = 'v', long, help_heading = "Runtime")]
    verbose: bool,
}

impl Args {
    fn selected_tools(&self) -> Vec<Source> {
        let flags = [self.amrfinder, self.rgi, self.resfinder];
        if self.auto || flags.iter().all(|f| !f) {
            return Source::TOOLS.to_vec();
        }
        Source::TOOLS
            .into_iter()
            .zip(flags)
            .filter_map(|(source, on)| on.then_some(source))
            .collect()
    }
}

fn main() -> Result<()> {
    let mut args = Args::parse();
    let start_time = Instant::now();
    init_tracing(args.verbose);

    if args.threads == 0 {
        args.threads = num_cpus::get();
    }

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => Config::default(),
    };

    if args.versions {
        let runner = CommandRunner::new(config.tools.clone(), None);
        let tools = available_tools(&runner, &args.selected_tools());
        for entry in collect_versions(&runner, &tools).entries {
            println!("{}:{}", entry.toolname, entry.version);
        }
        return Ok(());
    }

    let phenotypes = match &args.phenotypes {
        Some(path) => Some(
            load_phenotypes(path, &config)
                .with_context(|| format!("Failed to load phenotype table {}", path.display()))?,
        ),
        None => None,
    };

    fs::create_dir_all(&args.outdir)
        .with_context(|| format!("Failed to create output directory {}", args.outdir.display()))?;

    if let Some(dir) = &args.samples {
        run_batch(dir, &args, phenotypes.as_ref(), &config)?;
    } else {
        let report = if let Some(input) = &args.input {
            run_assembly(input, &args, phenotypes.as_ref(), &config)?
        } else if let Some(dir) = &args.reports {
            let name = sample_name(args.name.as_deref(), dir);
            process_report_dir(dir, &name, phenotypes.as_ref(), &config)?
        } else {
            anyhow::bail!("No input provided. Use -r, -l or -i");
        };

        write_outputs(&report, &args.outdir, args.json)?;
        if let Some(spec) = &args.spec {
            write_spec(&report, spec)
                .with_context(|| format!("Failed to write {}", spec.display()))?;
        }
        let resistant: Vec<&str> = report.consensus.resistant().collect();
        info!(sample = %report.sample, "resistant: {}", resistant.join(", "));
    }

    info!("Total time: {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Sample name from `-n`, else the file name up to its first dot.
fn sample_name(explicit: Option<&str>, path: &Path) -> String {
    if let Some(name) = explicit {
        return name.to_string();
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|n| !n.is_empty())
        .unwrap_or("sample")
        .to_string()
}

fn process_report_dir(
    dir: &Path,
    name: &str,
    phenotypes: Option<&SourceTable>,
    config: &Config,
) -> Result<SampleReport> {
    let sources = load_sample(dir, config)
        .with_context(|| format!("Failed to load reports from {}", dir.display()))?;
    assemble(name, sources, phenotypes, config)
        .with_context(|| format!("No usable tool output for {}", name))
}

fn run_assembly(
    input: &Path,
    args: &Args,
    phenotypes: Option<&SourceTable>,
    config: &Config,
) -> Result<SampleReport> {
    let runner = CommandRunner::new(config.tools.clone(), args.species.clone());
    let tools = available_tools(&runner, &args.selected_tools());
    if tools.is_empty() {
        anyhow::bail!("None of the selected tools was found");
    }

    let tmp = tempfile::Builder::new()
        .prefix("amrconsensus")
        .tempdir_in(&args.tmpdir)
        .with_context(|| format!("Failed to create temporary directory in {}", args.tmpdir.display()))?;
    let fasta = prepare_input(input, tmp.path())?;

    let versions = collect_versions(&runner, &tools);
    let finished = run_tools(&runner, &tools, &fasta, tmp.path());
    if finished.len() < tools.len() {
        warn!("{} of {} tools failed", tools.len() - finished.len(), tools.len());
    }

    let name = sample_name(args.name.as_deref(), input);
    let mut report = process_report_dir(tmp.path(), &name, phenotypes, config)?;
    report.versions = Some(versions);
    Ok(report)
}

/// Sub-directories of `dir`, by name.
fn find_sample_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut samples: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            samples.insert(name.to_string(), path.clone());
        }
    }
    if samples.is_empty() {
        anyhow::bail!("No sample report directories found in {:?}", dir);
    }
    Ok(samples.into_iter().collect())
}

fn run_batch(
    dir: &Path,
    args: &Args,
    phenotypes: Option<&SourceTable>,
    config: &Config,
) -> Result<()> {
    let samples = find_sample_dirs(dir)?;
    info!("Processing {} sample(s) with {} threads", samples.len(), args.threads);

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .ok();

    let results: Vec<(String, Result<SampleReport>)> = samples
        .par_iter()
        .map(|(name, path)| {
            let report = process_report_dir(path, name, phenotypes, config).and_then(|report| {
                write_outputs(&report, &args.outdir, args.json)?;
                Ok(report)
            });
            (name.clone(), report)
        })
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    for (name, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => error!("ERROR processing {}: {:#}", name, e),
        }
    }

    if reports.is_empty() {
        anyhow::bail!("No sample could be processed");
    }
    write_cohort(&reports, &args.outdir)?;
    Ok(())
}
