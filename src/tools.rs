//! External Tool Runner Module
//!
//! Runs AMRFinderPlus, CARD-RGI and ResFinder on an assembly and collects
//! their version strings. The reconciliation engine never depends on this
//! module; it only reads the reports the tools leave behind, laid out the
//! way [`crate::reports`] expects them.
//!
//! # Version Strings
//! | Tool          | Format                                   |
//! |---------------|------------------------------------------|
//! | NCBIAMRFinder | `amrfinder-<v>;db-<v>`                   |
//! | CARD-RGI      | `rgi-<v>;db-<v>`                         |
//! | ResFinder     | `resfinder-<v>;acqdb-<v>;pointdb-<v>`    |
//! | Main          | crate version                            |

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ToolConfig;
use crate::error::{CombineError, Result};
use crate::source::Source;
use crate::table::{Table, Value};
use crate::tsv::ReportFile;

/// Name under which this program's own version is recorded.
pub const MAIN_TOOL: &str = "Main";

static AMRFINDER_SOFTWARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Software version: (\S+)").expect("software version pattern"));

static AMRFINDER_DATABASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Database version: (\S+)").expect("database version pattern"));

// ============================================================================
// Tool Runner
// ============================================================================

/// Capability to run a detection tool and report its version.
pub trait ToolRunner: Sync {
    /// Runs `source` on `input`, writing its report into `outdir` under the
    /// sample report layout.
    fn run(&self, source: Source, input: &Path, outdir: &Path) -> Result<()>;

    /// Version string of `source`.
    fn version(&self, source: Source) -> Result<String>;
}

/// Locates an executable, either as an absolute path or on `PATH`.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() && path.exists() {
        return Ok(path.to_path_buf());
    }

    if let Ok(paths) = env::var("PATH") {
        for dir in env::split_paths(&paths) {
            let full_path = dir.join(name);
            if full_path.exists() && full_path.is_file() {
                return Ok(full_path);
            }
        }
    }

    Err(CombineError::Tool(format!(
        "{} not found in PATH. Please install it or add it to your PATH.",
        name
    )))
}

/// Runs a command and returns its stdout and stderr combined.
fn capture(cmd: &mut Command, what: &str) -> Result<String> {
    let output = cmd
        .output()
        .map_err(|e| CombineError::Tool(format!("failed to run {}: {}", what, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CombineError::Tool(format!(
            "{} failed (exit code: {:?}): {}",
            what,
            output.status.code(),
            stderr.trim()
        )));
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

// ============================================================================
// Organism Translation
// ============================================================================

/// First `n` words of a species name.
fn leading_words(species: &str, n: usize) -> Vec<&str> {
    species.split_whitespace().take(n).collect()
}

/// Organisms accepted by `amrfinder --organism`, from `amrfinder -l` output.
pub fn parse_amrfinder_organisms(output: &str) -> Vec<String> {
    output
        .split_once(':')
        .map(|(_, list)| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Finds `organism` in `available`, trying the full name, then the genus.
pub fn find_organism(available: &[String], organism: &str) -> Option<String> {
    let by_underscore = organism.split('_').next().unwrap_or(organism);
    let by_space = organism.split(' ').next().unwrap_or(organism);
    [organism, by_underscore, by_space]
        .into_iter()
        .find(|candidate| available.iter().any(|a| a == candidate))
        .map(str::to_string)
}

/// `Escherichia coli K-12` → `Escherichia_coli`, as amrfinder names them.
pub fn amrfinder_organism_name(species: &str) -> String {
    leading_words(species, 2).join("_")
}

/// `Escherichia coli K-12` → `escherichia coli`, as PointFinder names them.
pub fn pointfinder_organism_name(species: &str) -> String {
    leading_words(species, 2).join(" ").to_lowercase()
}

/// Species available in a PointFinder database directory.
pub fn pointfinder_organisms(db_pointfinder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(db_pointfinder)? {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().trim().replace('_', " "));
        }
    }
    names.sort();
    Ok(names)
}

// ============================================================================
// Version Parsing
// ============================================================================

/// Builds `amrfinder-<v>;db-<v>` from `amrfinder -l` output.
pub fn parse_amrfinder_version(output: &str) -> String {
    let find = |re: &Regex| {
        output
            .lines()
            .find_map(|line| re.captures(line).map(|c| c[1].to_string()))
            .unwrap_or_default()
    };
    format!(
        "amrfinder-{};db-{}",
        find(&AMRFINDER_SOFTWARE),
        find(&AMRFINDER_DATABASE)
    )
}

pub fn format_rgi_version(tool: &str, database: &str) -> String {
    format!("rgi-{};db-{}", tool.trim(), database.trim())
}

pub fn format_resfinder_version(tool: &str, acquired: &str, point: &str) -> String {
    format!("resfinder-{};acqdb-{};pointdb-{}", tool.trim(), acquired.trim(), point.trim())
}

/// Version of a git checkout, as `git describe` reports it.
fn git_describe(dir: &Path) -> Result<String> {
    let text = capture(
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["describe", "--tags", "--always"]),
        "git describe",
    )?;
    Ok(text.trim().to_string())
}

// ============================================================================
// Command Runner
// ============================================================================

/// [`ToolRunner`] that spawns the tools as child processes.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    tools: ToolConfig,
    species: Option<String>,
}

impl CommandRunner {
    pub fn new(tools: ToolConfig, species: Option<String>) -> Self {
        Self {
            tools,
            species: species.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn executable(&self, source: Source) -> Result<PathBuf> {
        let name = self
            .tools
            .command(source)
            .ok_or_else(|| CombineError::Tool(format!("{} is not a tool", source)))?;
        find_executable(name)
    }

    /// ResFinder database directory; defaults to `db_<kind>` next to the
    /// directory holding `run_resfinder.py`.
    fn resfinder_db(&self, configured: Option<&PathBuf>, kind: &str) -> Result<PathBuf> {
        if let Some(path) = configured {
            return Ok(path.clone());
        }
        let exe = self.executable(Source::PointMutationFinder)?;
        let base = exe
            .parent()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        Ok(base.join(format!("db_{}", kind)))
    }

    fn amrfinder_organism(&self, exe: &Path) -> Option<String> {
        let species = self.species.as_deref()?;
        let listing = match capture(Command::new(exe).arg("-l"), "amrfinder -l") {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot list amrfinder organisms: {}", e);
                return None;
            }
        };
        find_organism(&parse_amrfinder_organisms(&listing), &amrfinder_organism_name(species))
    }

    fn pointfinder_organism(&self, db_pointfinder: &Path) -> Option<String> {
        let species = self.species.as_deref()?;
        let available = match pointfinder_organisms(db_pointfinder) {
            Ok(list) => list,
            Err(e) => {
                warn!(path = %db_pointfinder.display(), "cannot list PointFinder species: {}", e);
                return None;
            }
        };
        find_organism(&available, &pointfinder_organism_name(species))
    }

    /// Full command line for one tool.
    pub fn command(&self, source: Source, input: &Path, outdir: &Path) -> Result<Command> {
        let exe = self.executable(source)?;
        let mut cmd = Command::new(&exe);
        match source {
            Source::HomologyFinder => {
                cmd.arg("-n").arg(input);
                if let Some(organism) = self.amrfinder_organism(&exe) {
                    cmd.arg("--organism").arg(organism);
                }
                cmd.arg("-o").arg(outdir.join(source.label()));
            }
            Source::CuratedDbFinder => {
                // rgi appends `.txt` to the output prefix
                cmd.arg("main")
                    .arg("-i")
                    .arg(input)
                    .arg("-o")
                    .arg(outdir.join(source.label()));
            }
            Source::PointMutationFinder => {
                let db_point = self.resfinder_db(self.tools.db_pointfinder.as_ref(), "pointfinder")?;
                let db_res = self.resfinder_db(self.tools.db_resfinder.as_ref(), "resfinder")?;
                cmd.arg("--acquired")
                    .arg("-db_point")
                    .arg(&db_point)
                    .arg("-db_res")
                    .arg(&db_res)
                    .arg("-ifa")
                    .arg(input);
                if let Some(organism) = self.pointfinder_organism(&db_point) {
                    cmd.arg("--point").arg("--species").arg(organism);
                }
                cmd.arg("-o").arg(outdir.join(source.label()));
            }
            Source::PhenotypeTable => {
                return Err(CombineError::Tool("the phenotype table is not a tool".into()));
            }
        }
        Ok(cmd)
    }
}

impl ToolRunner for CommandRunner {
    fn run(&self, source: Source, input: &Path, outdir: &Path) -> Result<()> {
        let mut cmd = self.command(source, input, outdir)?;
        info!(tool = %source, "running {:?}", cmd);
        capture(&mut cmd, source.label())?;
        Ok(())
    }

    fn version(&self, source: Source) -> Result<String> {
        let exe = self.executable(source)?;
        match source {
            Source::HomologyFinder => {
                let text = capture(Command::new(&exe).arg("-l"), "amrfinder -l")?;
                Ok(parse_amrfinder_version(&text))
            }
            Source::CuratedDbFinder => {
                let tool = capture(Command::new(&exe).args(["main", "-v"]), "rgi main -v")?;
                let db = capture(Command::new(&exe).args(["database", "-v"]), "rgi database -v")?;
                Ok(format_rgi_version(&tool, &db))
            }
            Source::PointMutationFinder => {
                let tool_dir = exe.parent().unwrap_or_else(|| Path::new("."));
                let db_res = self.resfinder_db(self.tools.db_resfinder.as_ref(), "resfinder")?;
                let db_point = self.resfinder_db(self.tools.db_pointfinder.as_ref(), "pointfinder")?;
                Ok(format_resfinder_version(
                    &git_describe(tool_dir)?,
                    &git_describe(&db_res)?,
                    &git_describe(&db_point)?,
                ))
            }
            Source::PhenotypeTable => Err(CombineError::Tool("the phenotype table is not a tool".into())),
        }
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// Selected tools whose executables can be found; the others are dropped
/// with a warning.
pub fn available_tools(runner: &CommandRunner, selected: &[Source]) -> Vec<Source> {
    selected
        .iter()
        .copied()
        .filter(|&source| match runner.executable(source) {
            Ok(path) => {
                debug!(tool = %source, path = %path.display(), "found tool");
                true
            }
            Err(e) => {
                warn!(tool = %source, "skipping: {}", e);
                false
            }
        })
        .collect()
}

/// Runs the tools concurrently and returns those that succeeded.
pub fn run_tools<R: ToolRunner>(runner: &R, sources: &[Source], input: &Path, outdir: &Path) -> Vec<Source> {
    let results: Vec<(Source, Result<()>)> = std::thread::scope(|s| {
        let handles: Vec<_> = sources
            .iter()
            .map(|&source| (source, s.spawn(move || runner.run(source, input, outdir))))
            .collect();
        handles
            .into_iter()
            .map(|(source, handle)| {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(CombineError::Tool(format!("{} runner panicked", source))));
                (source, result)
            })
            .collect()
    });

    results
        .into_iter()
        .filter_map(|(source, result)| match result {
            Ok(()) => Some(source),
            Err(e) => {
                warn!(tool = %source, "tool failed: {}", e);
                None
            }
        })
        .collect()
}

/// Decompresses a gzipped assembly into `tmpdir`; plain files are used as is.
pub fn prepare_input(input: &Path, tmpdir: &Path) -> Result<PathBuf> {
    if input.extension().and_then(|e| e.to_str()) != Some("gz") {
        return Ok(input.to_path_buf());
    }
    let target = tmpdir.join("input_file.fasta");
    let mut reader = ReportFile::open(input)?;
    let mut writer = BufWriter::new(File::create(&target)?);
    io::copy(&mut reader, &mut writer)?;
    Ok(target)
}

// ============================================================================
// Versions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolVersion {
    pub toolname: String,
    pub version: String,
}

/// Tool versions in collection order, `Main` last.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VersionTable {
    pub entries: Vec<ToolVersion>,
}

impl VersionTable {
    pub fn push(&mut self, toolname: &str, version: impl Into<String>) {
        self.entries.push(ToolVersion {
            toolname: toolname.to_string(),
            version: version.into(),
        });
    }

    pub fn get(&self, toolname: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.toolname == toolname)
            .map(|e| e.version.as_str())
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(["toolname", "version"]);
        for e in &self.entries {
            table.push_row(vec![
                Some(Value::text(e.toolname.as_str())),
                Some(Value::text(e.version.as_str())),
            ]);
        }
        table
    }
}

/// Collects versions of `sources` plus this program's own version. Tools
/// whose version cannot be determined are left out.
pub fn collect_versions<R: ToolRunner + ?Sized>(runner: &R, sources: &[Source]) -> VersionTable {
    let mut versions = VersionTable::default();
    for &source in sources {
        match runner.version(source) {
            Ok(v) => versions.push(source.label(), v),
            Err(e) => warn!(tool = %source, "cannot determine version: {}", e),
        }
    }
    versions.push(MAIN_TOOL, env!("CARGO_PKG_VERSION"));
    versions
}

// ============================================================================
// Tests
// ============================================================================
