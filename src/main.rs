//! fea-bench: CLI entry point.
//!
//! Regression-benchmarks fea examples against historical reference values.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;

use fea_bench::analysis_runner::{
    check_analysis_available, find_analysis_binary, run_analysis, AnalysisConfig,
};
use fea_bench::comparator::{compare_metrics, MetricOutcome, MetricReport};
use fea_bench::tolerance::Tolerance;
use fea_bench::types::{load_benchmark_specs, BenchResult, BenchmarkSpec};

#[derive(Parser)]
#[command(name = "fea-bench")]
#[command(about = "Regression benchmarking of fea examples against historical reference values")]
#[command(version)]
struct Cli {
    /// Run all benchmarks (headless mode with colored output).
    #[arg(long)]
    all: bool,

    /// Path to benchmark specs directory.
    #[arg(short, long, default_value = "benchmarks")]
    benchmarks: PathBuf,

    /// Path to fea binary (or set `FEA_BIN` env var).
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Override the worker-process count for every benchmark.
    #[arg(short, long)]
    procs: Option<usize>,

    /// Timeout for one analysis run, in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find fea binary
    let analysis_binary = cli
        .binary
        .or_else(find_analysis_binary)
        .ok_or_else(|| anyhow::anyhow!("fea binary not found. Set FEA_BIN or use --binary"))?;

    let base_config = AnalysisConfig {
        binary: analysis_binary.clone(),
        timeout: Duration::from_secs(cli.timeout),
        ..AnalysisConfig::default()
    };

    let version = check_analysis_available(&base_config).map_err(|_| {
        anyhow::anyhow!(
            "fea binary not runnable: {}. Set FEA_BIN or use --binary",
            analysis_binary.display()
        )
    })?;

    println!("{}", "fea-bench".bold());
    println!("  Binary: {}", analysis_binary.display());
    println!("  Version: {version}");
    println!("  Benchmarks: {}", cli.benchmarks.display());
    println!();

    // Load benchmark specs
    let specs = load_benchmarks(&cli.benchmarks)?;
    println!("Loaded {} benchmarks", specs.len());
    println!();

    if cli.all {
        run_all_mode(&specs, &base_config, cli.procs)?;
    } else {
        println!("Use --all to run all benchmarks");
    }

    Ok(())
}

fn load_benchmarks(benchmarks_dir: &PathBuf) -> anyhow::Result<Vec<BenchmarkSpec>> {
    let mut all_specs = Vec::new();

    if !benchmarks_dir.exists() {
        anyhow::bail!("Benchmarks directory not found: {}", benchmarks_dir.display());
    }

    for entry in fs::read_dir(benchmarks_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().is_some_and(|e| e == "yaml") {
            let content = fs::read_to_string(&path)?;
            match load_benchmark_specs(&content) {
                Ok(specs) => all_specs.extend(specs),
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {e}", path.display());
                }
            }
        }
    }

    all_specs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(all_specs)
}

#[allow(clippy::unnecessary_wraps)] // Result for consistent main() error handling
fn run_all_mode(
    specs: &[BenchmarkSpec],
    base_config: &AnalysisConfig,
    procs_override: Option<usize>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut results = Vec::new();

    println!("{}", "Running benchmarks...".cyan());

    for spec in specs {
        let result = run_benchmark(spec, base_config, procs_override);
        print_result(&result);
        results.push(result);
    }

    let elapsed = start.elapsed();

    // Summary
    println!();
    println!("{}", "=".repeat(60));

    let passed = results.iter().filter(|r| r.is_pass()).count();
    let failed = results.iter().filter(|r| r.is_fail()).count();
    let errored = results
        .iter()
        .filter(|r| matches!(r, BenchResult::Error { .. }))
        .count();
    let skipped = results
        .iter()
        .filter(|r| matches!(r, BenchResult::Skip { .. }))
        .count();

    let (metrics_passed, metrics_failed) = results.iter().fold((0, 0), |(p, f), r| match r {
        BenchResult::Completed { report, .. } => (p + report.passed(), f + report.failed()),
        _ => (p, f),
    });

    if failed == 0 && errored == 0 {
        println!(
            "  {} {} passed ({} metrics), {} skipped in {:.2}s",
            "PASS".green(),
            passed.to_string().green(),
            metrics_passed,
            skipped,
            elapsed.as_secs_f64()
        );
    } else {
        println!(
            "  {} {} passed, {} failed ({} metrics), {} errored, {} skipped in {:.2}s",
            "FAIL".red(),
            passed,
            failed.to_string().red(),
            metrics_failed,
            errored,
            skipped,
            elapsed.as_secs_f64()
        );
    }

    println!("{}", "=".repeat(60));

    if failed + errored > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Runs a single benchmark by:
/// 1. Running the fea example once (setup)
/// 2. Comparing every observed metric against the reference values
fn run_benchmark(
    spec: &BenchmarkSpec,
    base_config: &AnalysisConfig,
    procs_override: Option<usize>,
) -> BenchResult {
    let Some(ref example) = spec.example else {
        return BenchResult::Skip {
            name: spec.name.clone(),
            reason: "No example specified".to_string(),
        };
    };

    if spec.reference.is_empty() {
        return BenchResult::Skip {
            name: spec.name.clone(),
            reason: "No reference values".to_string(),
        };
    }

    let config = AnalysisConfig {
        num_procs: procs_override.unwrap_or(spec.num_procs),
        ..base_config.clone()
    };

    // Setup: one analysis run, no retry. A failure here is fatal to the
    // benchmark and no comparison is attempted.
    let observed = match run_analysis(example, &config) {
        Ok(observed) => observed,
        Err(e) => {
            return BenchResult::Error {
                name: spec.name.clone(),
                error: e.to_string(),
            };
        }
    };

    let tolerance = spec.tolerance.as_ref().map_or_else(Tolerance::default, |t| {
        Tolerance::new(t.rtol.unwrap_or(1e-6), t.atol.unwrap_or(1e-6))
    });

    let report = compare_metrics(&observed, &spec.reference, &tolerance);

    BenchResult::Completed {
        name: spec.name.clone(),
        report,
    }
}

fn print_result(result: &BenchResult) {
    match result {
        BenchResult::Completed { name, report } => {
            if report.is_pass() {
                println!("  {} {}", "✓".green(), name);
            } else {
                println!("  {} {}", "✗".red(), name.red());
            }
            for metric in &report.metrics {
                print_metric(metric);
            }
            for metric in &report.missing {
                println!(
                    "      {} {}",
                    "○".yellow(),
                    format!("{metric}: in reference but not produced by analysis").dimmed()
                );
            }
        }
        BenchResult::Error { name, error } => {
            println!("  {} {} (setup error)", "✗".red(), name.red());
            println!("      {error}");
        }
        BenchResult::Skip { name, reason } => {
            println!("  {} {} ({})", "○".yellow(), name.dimmed(), reason.dimmed());
        }
    }
}

fn print_metric(metric: &MetricReport) {
    match &metric.outcome {
        MetricOutcome::Pass { delta, .. } => {
            println!(
                "      {} {} (delta {delta:.3e})",
                "✓".green(),
                metric.metric
            );
        }
        MetricOutcome::ToleranceExceeded {
            observed,
            expected,
            delta,
            band,
        } => {
            println!(
                "      {} {}: observed={observed:.16}, expected={expected:.16} (delta {delta:.3e}, tolerance {band:.3e})",
                "✗".red(),
                metric.metric.red()
            );
        }
        MetricOutcome::UnknownMetric { observed } => {
            println!(
                "      {} {}: no reference entry (observed {observed})",
                "✗".red(),
                metric.metric.red()
            );
        }
    }
}
