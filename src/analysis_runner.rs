//! Runner for the external fea analysis.
//!
//! Executes an fea example as a child process and captures the metric map it
//! writes, for comparison against historical reference values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Metric name to scalar value, as produced by one analysis run.
pub type ObservedValues = HashMap<String, f64>;

/// Failure during the setup phase.
///
/// Fatal to the whole benchmark: comparison never starts, and nothing is
/// retried because the analysis is deterministic.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to spawn analysis process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("error waiting for analysis process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("analysis timed out after {0}ms")]
    Timeout(u64),

    #[error("analysis exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("failed to read analysis output: {0}")]
    Output(#[source] std::io::Error),

    #[error("malformed analysis output: {0}")]
    Malformed(String),
}

/// Configuration for running the analysis binary.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Path to the fea binary.
    pub binary: PathBuf,
    /// Worker processes the analysis may use. Advisory; affects setup time,
    /// never the metric values.
    pub num_procs: usize,
    /// Timeout for one analysis run.
    pub timeout: Duration,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("fea"),
            num_procs: 8,
            timeout: Duration::from_secs(300),
            working_dir: None,
        }
    }
}

/// Runs the analysis for `example` exactly once and captures its metric map.
///
/// The output artifact is a temp file removed on every exit path, and a run
/// that exceeds the timeout is killed.
pub fn run_analysis(example: &str, config: &AnalysisConfig) -> Result<ObservedValues, SetupError> {
    let output_file = NamedTempFile::new().map_err(SetupError::Output)?;

    let mut command = Command::new(&config.binary);
    command.arg("run");
    command.arg(example);
    command.arg("--procs");
    command.arg(config.num_procs.to_string());
    command.arg("--output");
    command.arg(output_file.path());

    if let Some(ref dir) = config.working_dir {
        command.current_dir(dir);
    }

    let output = execute_with_timeout(&mut command, config.timeout)?;

    if !output.status.success() {
        return Err(SetupError::Failed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let content = std::fs::read_to_string(output_file.path()).map_err(SetupError::Output)?;
    parse_observed(&content)
}

/// Parses the JSON metric map emitted by the analysis.
///
/// The contract is strict: a JSON object whose values are all finite
/// numbers. A NaN or infinite metric would compare as nothing meaningful,
/// so it is rejected here instead.
pub fn parse_observed(content: &str) -> Result<ObservedValues, SetupError> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| SetupError::Malformed(format!("invalid JSON: {e}")))?;

    let Some(object) = json.as_object() else {
        return Err(SetupError::Malformed(
            "expected a JSON object of metric values".to_string(),
        ));
    };

    let mut observed = ObservedValues::with_capacity(object.len());
    for (name, value) in object {
        let Some(number) = value.as_f64() else {
            return Err(SetupError::Malformed(format!(
                "metric {name} is not a number: {value}"
            )));
        };
        if !number.is_finite() {
            return Err(SetupError::Malformed(format!(
                "metric {name} is not finite: {number}"
            )));
        }
        observed.insert(name.clone(), number);
    }

    Ok(observed)
}

#[allow(clippy::cast_possible_truncation)]
fn execute_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output, SetupError> {
    use std::io::{BufRead, BufReader};
    use std::thread;

    let mut child = command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(SetupError::Spawn)?;

    let timeout_ms = timeout.as_millis() as u64;
    let start = std::time::Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = child.stdout.take().map_or_else(Vec::new, |s| {
                    BufReader::new(s)
                        .lines()
                        .map_while(Result::ok)
                        .collect::<Vec<_>>()
                        .join("\n")
                        .into_bytes()
                });
                let stderr = child.stderr.take().map_or_else(Vec::new, |s| {
                    BufReader::new(s)
                        .lines()
                        .map_while(Result::ok)
                        .collect::<Vec<_>>()
                        .join("\n")
                        .into_bytes()
                });
                return Ok(Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    return Err(SetupError::Timeout(timeout_ms));
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(SetupError::Wait(e)),
        }
    }
}

/// Checks if the fea binary is available.
pub fn check_analysis_available(config: &AnalysisConfig) -> Result<String> {
    let output = Command::new(&config.binary)
        .arg("--version")
        .output()
        .context("Failed to run fea --version")?;

    if output.status.success() {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(version)
    } else {
        Err(anyhow!(
            "fea returned non-zero: {}",
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}

/// Finds the fea binary.
pub fn find_analysis_binary() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("FEA_BIN") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let relative = Path::new("../fea/target/release/fea");
    if relative.exists() {
        return Some(relative.to_path_buf());
    }

    if Command::new("fea").arg("--version").output().is_ok() {
        return Some(PathBuf::from("fea"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.binary, PathBuf::from("fea"));
        assert_eq!(config.num_procs, 8);
    }

    #[test]
    fn parse_observed_valid() {
        let observed = parse_observed(
            r#"{"pressure_mass": 125.00000000026239, "pressure_ks_vmfailure": 0.3522022461334997}"#,
        )
        .unwrap();
        assert_eq!(observed.len(), 2);
        assert!((observed["pressure_mass"] - 125.00000000026239).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_observed_rejects_non_object() {
        assert!(matches!(
            parse_observed("[1.0, 2.0]"),
            Err(SetupError::Malformed(_))
        ));
    }

    #[test]
    fn parse_observed_rejects_non_numeric_metric() {
        assert!(matches!(
            parse_observed(r#"{"mass": "heavy"}"#),
            Err(SetupError::Malformed(_))
        ));
    }

    #[test]
    fn parse_observed_rejects_invalid_json() {
        assert!(matches!(
            parse_observed("not json"),
            Err(SetupError::Malformed(_))
        ));
    }

    #[test]
    fn missing_binary_is_a_setup_error() {
        let config = AnalysisConfig {
            binary: PathBuf::from("/nonexistent/fea"),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            run_analysis("plate", &config),
            Err(SetupError::Spawn(_))
        ));
    }
}
