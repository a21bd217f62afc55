//! fea-bench: regression benchmarking of fea examples.
//!
//! Runs fea analysis examples and compares their metric outputs against
//! historical reference values within floating-point tolerance.

pub mod analysis_runner;
pub mod comparator;
pub mod tolerance;
pub mod types;
