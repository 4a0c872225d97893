//! Std adapters for greenbench.
//!
//! In clean-arch terms: this is where we touch the world. Process spawning,
//! `perf stat` report parsing, the external energy table, and the
//! allocation-tracking memory probe all live here.

use anyhow::Context;
use std::path::{Path, PathBuf};

pub mod alloc;

const ENERGY_COLUMN: &str = "energy_j";

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("energy csv {} has no `energy_j` column", .path.display())]
    MissingEnergyColumn { path: PathBuf },

    #[error("failed to read energy csv {}", .path.display())]
    EnergyCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, AdapterError>;
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, AdapterError> {
        if spec.argv.is_empty() {
            return Err(AdapterError::EmptyArgv);
        }

        let mut cmd = std::process::Command::new(&spec.argv[0]);
        if spec.argv.len() > 1 {
            cmd.args(&spec.argv[1..]);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let out = cmd
            .output()
            .with_context(|| format!("failed to run {:?}", spec.argv))
            .map_err(AdapterError::Other)?;

        Ok(RunOutput {
            status_code: out.status.code().unwrap_or(-1),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

/// Samples one hardware counter around a child command.
///
/// Probes are best-effort: a missing profiler, an unsupported event, or an
/// unparsable report all come back as `None`, never as an error.
pub trait CounterProbe {
    fn sample(&self, event: &str, target: &[String]) -> Option<f64>;
}

/// `perf stat`-backed probe. Spawns `perf stat -e <event> -- <target...>`
/// and pulls the count out of the report perf prints on stderr.
#[derive(Debug, Clone)]
pub struct PerfStatProbe<R> {
    runner: R,
    perf_bin: String,
}

impl<R> PerfStatProbe<R> {
    pub fn new(runner: R, perf_bin: impl Into<String>) -> Self {
        PerfStatProbe {
            runner,
            perf_bin: perf_bin.into(),
        }
    }
}

impl<R: ProcessRunner> CounterProbe for PerfStatProbe<R> {
    fn sample(&self, event: &str, target: &[String]) -> Option<f64> {
        if target.is_empty() {
            return None;
        }

        let mut argv = vec![
            self.perf_bin.clone(),
            "stat".to_string(),
            "-e".to_string(),
            event.to_string(),
            "--".to_string(),
        ];
        argv.extend(target.iter().cloned());

        let output = self
            .runner
            .run(&CommandSpec {
                argv,
                env: Vec::new(),
            })
            .ok()?;

        // perf writes the counter report to stderr even on success.
        parse_counter_report(&String::from_utf8_lossy(&output.stderr), event)
    }
}

/// Extracts the count for `event` from a `perf stat` report.
///
/// Handles both the human format (`1,234,567  event`) and the CSV format
/// (`1234567,,event`), including fractional counts such as Joules.
/// `<not supported>` / `<not counted>` lines carry no number and are
/// skipped. The last matching line wins.
pub fn parse_counter_report(report: &str, event: &str) -> Option<f64> {
    let mut value = None;
    for line in report.lines() {
        if !line.contains(event) {
            continue;
        }
        if let Some(v) = leading_number(line) {
            value = Some(v);
        }
    }
    value
}

fn leading_number(line: &str) -> Option<f64> {
    let token: String = line
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    if token.is_empty() {
        return None;
    }
    token.parse().ok()
}

/// Per-run energy readings loaded from an external CSV.
///
/// Rows map to logged run indices in order. A row that is missing or does
/// not parse degrades that run's energy to absent; a file that cannot be
/// read at all, or lacks the `energy_j` column, is the caller's error.
#[derive(Debug, Clone)]
pub struct EnergyCsv {
    rows: Vec<Option<f64>>,
}

impl EnergyCsv {
    pub fn load(path: &Path) -> Result<Self, AdapterError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| AdapterError::EnergyCsv {
            path: path.to_path_buf(),
            source,
        })?;

        let headers = reader
            .headers()
            .map_err(|source| AdapterError::EnergyCsv {
                path: path.to_path_buf(),
                source,
            })?
            .clone();

        let column = headers
            .iter()
            .position(|h| h.trim() == ENERGY_COLUMN)
            .ok_or_else(|| AdapterError::MissingEnergyColumn {
                path: path.to_path_buf(),
            })?;

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|source| AdapterError::EnergyCsv {
                path: path.to_path_buf(),
                source,
            })?;
            rows.push(
                row.get(column)
                    .and_then(|cell| cell.trim().parse::<f64>().ok()),
            );
        }

        Ok(EnergyCsv { rows })
    }

    pub fn get(&self, run_idx: usize) -> Option<f64> {
        self.rows.get(run_idx).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
