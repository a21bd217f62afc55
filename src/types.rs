//! Common types for fea-bench.
//!
//! Defines benchmark specifications and results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::comparator::CompareReport;

/// One regression benchmark: an analysis example to run and the historical
/// values its metrics must reproduce.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkSpec {
    /// Benchmark name (populated from the `HashMap` key).
    #[serde(default)]
    pub name: String,
    /// Analysis example to run.
    pub example: Option<String>,
    /// Worker processes for the analysis. Advisory only.
    #[serde(default = "default_num_procs")]
    pub num_procs: usize,
    /// Historical reference values, metric name to expected scalar.
    #[serde(default)]
    pub reference: HashMap<String, f64>,
    /// Tolerance override.
    pub tolerance: Option<ToleranceSpec>,
}

const fn default_num_procs() -> usize {
    8
}

/// Tolerance overrides from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct ToleranceSpec {
    pub rtol: Option<f64>,
    pub atol: Option<f64>,
}

/// Result of running one benchmark.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BenchResult {
    /// Analysis ran; per-metric verdicts inside.
    Completed { name: String, report: CompareReport },
    /// Setup failed; no comparisons were attempted.
    Error { name: String, error: String },
    /// Benchmark could not be run as specified.
    Skip { name: String, reason: String },
}

impl BenchResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Completed { report, .. } if report.is_pass())
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Completed { report, .. } if !report.is_pass())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Completed { name, .. } | Self::Error { name, .. } | Self::Skip { name, .. } => {
                name
            }
        }
    }
}

/// Benchmark file structure.
#[derive(Debug, Deserialize)]
pub struct BenchmarkFile {
    /// Example shared by benchmarks in this file.
    #[serde(rename = "_example")]
    pub example: Option<String>,

    /// Benchmarks in this file.
    #[serde(default)]
    pub benchmarks: HashMap<String, BenchmarkSpec>,
}

/// Loads benchmark specs from a YAML file.
pub fn load_benchmark_specs(content: &str) -> anyhow::Result<Vec<BenchmarkSpec>> {
    let file: BenchmarkFile = serde_yaml_ng::from_str(content)?;
    let mut specs = Vec::new();

    for (name, mut spec) in file.benchmarks {
        spec.name = name;
        if spec.example.is_none() {
            spec.example.clone_from(&file.example);
        }
        specs.push(spec);
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{MetricOutcome, MetricReport};

    #[test]
    fn parse_benchmark_file() {
        let yaml = r#"
_example: plate
benchmarks:
  plate_historical:
    num_procs: 8
    reference:
      point_force_ks_vmfailure: 1.4546105780086274
      point_force_mass: 12.500000000000535
      pressure_ks_vmfailure: 0.3522022461334997
      pressure_mass: 125.00000000026239
"#;
        let specs = load_benchmark_specs(yaml).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "plate_historical");
        assert_eq!(specs[0].example, Some("plate".to_string()));
        assert_eq!(specs[0].num_procs, 8);
        assert_eq!(specs[0].reference.len(), 4);
        assert!(
            (specs[0].reference["point_force_mass"] - 12.500000000000535).abs() < f64::EPSILON
        );
    }

    #[test]
    fn per_spec_example_overrides_file_default() {
        let yaml = r#"
_example: plate
benchmarks:
  coarse_mesh:
    example: plate_coarse
    reference:
      pressure_mass: 125.0
"#;
        let specs = load_benchmark_specs(yaml).unwrap();
        assert_eq!(specs[0].example, Some("plate_coarse".to_string()));
    }

    #[test]
    fn bench_result_pass_and_fail() {
        let pass = BenchResult::Completed {
            name: "plate".to_string(),
            report: CompareReport {
                metrics: vec![MetricReport {
                    metric: "pressure_mass".to_string(),
                    outcome: MetricOutcome::Pass {
                        observed: 125.0,
                        expected: 125.0,
                        delta: 0.0,
                    },
                }],
                missing: Vec::new(),
            },
        };
        assert!(pass.is_pass());
        assert!(!pass.is_fail());

        let error = BenchResult::Error {
            name: "plate".to_string(),
            error: "analysis exited with code 1".to_string(),
        };
        assert!(!error.is_pass());
        assert!(!error.is_fail());
        assert_eq!(error.name(), "plate");
    }
}
