//! Reference comparator for analysis metrics.
//!
//! Compares observed metric values against historical reference values and
//! produces one verdict per metric. A failing metric never suppresses the
//! checks of the others.

use std::collections::HashMap;

use serde::Serialize;

use crate::tolerance::{delta, within_tolerance, Tolerance};

/// Verdict for a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MetricOutcome {
    /// Observed value within the tolerance band.
    Pass {
        observed: f64,
        expected: f64,
        delta: f64,
    },
    /// Observed value outside the tolerance band.
    ToleranceExceeded {
        observed: f64,
        expected: f64,
        delta: f64,
        band: f64,
    },
    /// Observed metric has no reference entry. Indicates the reference data
    /// drifted from the analysis output contract, not a numeric regression.
    UnknownMetric { observed: f64 },
}

/// Per-metric comparison result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReport {
    /// Metric name.
    pub metric: String,
    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl MetricReport {
    pub const fn is_pass(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Pass { .. })
    }
}

/// Comparison of one observed-values map against a reference map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompareReport {
    /// Per-metric verdicts, in metric-name order.
    pub metrics: Vec<MetricReport>,
    /// Reference metrics the analysis never produced. Coverage drift in this
    /// direction is a warning, not a failure.
    pub missing: Vec<String>,
}

impl CompareReport {
    /// True only if every observed metric passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.metrics.iter().all(MetricReport::is_pass)
    }

    #[must_use]
    pub fn passed(&self) -> usize {
        self.metrics.iter().filter(|m| m.is_pass()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.metrics.len() - self.passed()
    }
}

/// Compares every observed metric against the reference map.
///
/// Metrics are visited in name order so reports are deterministic. Each
/// metric gets its own verdict; nothing short-circuits.
#[must_use]
pub fn compare_metrics(
    observed: &HashMap<String, f64>,
    reference: &HashMap<String, f64>,
    tolerance: &Tolerance,
) -> CompareReport {
    let mut names: Vec<&String> = observed.keys().collect();
    names.sort();

    let metrics = names
        .into_iter()
        .map(|name| {
            let value = observed[name];
            let outcome = reference.get(name).map_or(
                MetricOutcome::UnknownMetric { observed: value },
                |&expected| {
                    let diff = delta(value, expected);
                    if within_tolerance(value, expected, tolerance) {
                        MetricOutcome::Pass {
                            observed: value,
                            expected,
                            delta: diff,
                        }
                    } else {
                        MetricOutcome::ToleranceExceeded {
                            observed: value,
                            expected,
                            delta: diff,
                            band: tolerance.band(expected),
                        }
                    }
                },
            );
            MetricReport {
                metric: name.clone(),
                outcome,
            }
        })
        .collect();

    let mut missing: Vec<String> = reference
        .keys()
        .filter(|name| !observed.contains_key(*name))
        .cloned()
        .collect();
    missing.sort();

    CompareReport { metrics, missing }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plate_reference() -> HashMap<String, f64> {
        HashMap::from([
            ("point_force_ks_vmfailure".to_string(), 1.4546105780086274),
            ("point_force_mass".to_string(), 12.500000000000535),
            ("pressure_ks_vmfailure".to_string(), 0.3522022461334997),
            ("pressure_mass".to_string(), 125.00000000026239),
        ])
    }

    #[test]
    fn matching_values_pass_with_zero_delta() {
        let observed = plate_reference();
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::default());

        assert!(report.is_pass());
        assert_eq!(report.metrics.len(), 4);
        for metric in &report.metrics {
            assert!(matches!(
                metric.outcome,
                MetricOutcome::Pass { delta, .. } if delta == 0.0
            ));
        }
    }

    #[test]
    fn out_of_band_value_is_tolerance_exceeded() {
        let observed = HashMap::from([("pressure_mass".to_string(), 126.0)]);
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::default());

        assert!(!report.is_pass());
        let MetricOutcome::ToleranceExceeded { delta, band, .. } = report.metrics[0].outcome
        else {
            panic!("expected ToleranceExceeded, got {:?}", report.metrics[0].outcome);
        };
        assert!((delta - 1.0).abs() < 1e-8);
        assert!(delta > band);
    }

    #[test]
    fn observed_metric_without_reference_is_unknown() {
        let observed = HashMap::from([("unknown_metric".to_string(), 3.14)]);
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::default());

        assert!(!report.is_pass());
        assert_eq!(
            report.metrics[0].outcome,
            MetricOutcome::UnknownMetric { observed: 3.14 }
        );
    }

    #[test]
    fn failing_metric_does_not_suppress_the_others() {
        let mut observed = plate_reference();
        observed.insert("pressure_mass".to_string(), 126.0);
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::default());

        assert_eq!(report.metrics.len(), 4);
        assert_eq!(report.passed(), 3);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn reports_are_ordered_and_idempotent() {
        let observed = plate_reference();
        let reference = plate_reference();
        let first = compare_metrics(&observed, &reference, &Tolerance::default());
        let second = compare_metrics(&observed, &reference, &Tolerance::default());

        assert_eq!(first, second);
        let names: Vec<&str> = first.metrics.iter().map(|m| m.metric.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "point_force_ks_vmfailure",
                "point_force_mass",
                "pressure_ks_vmfailure",
                "pressure_mass",
            ]
        );
    }

    #[test]
    fn reference_metric_never_produced_is_a_warning_not_a_failure() {
        let observed = HashMap::from([("pressure_mass".to_string(), 125.00000000026239)]);
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::default());

        assert!(report.is_pass());
        assert_eq!(
            report.missing,
            vec![
                "point_force_ks_vmfailure",
                "point_force_mass",
                "pressure_ks_vmfailure",
            ]
        );
    }

    #[test]
    fn looser_tolerance_accepts_the_same_delta() {
        let observed = HashMap::from([("pressure_mass".to_string(), 126.0)]);
        let report = compare_metrics(&observed, &plate_reference(), &Tolerance::new(0.01, 1e-6));

        assert!(report.is_pass());
    }
}
