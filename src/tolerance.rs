//! Tolerance band model for metric comparison.
//!
//! A metric passes when `|observed - expected| <= atol + rtol * |expected|`,
//! so small expected values are governed by the absolute floor and large
//! ones by the relative term.

use serde::{Deserialize, Serialize};

/// Relative and absolute tolerance for a metric comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tolerance {
    /// Relative tolerance, scaled by the magnitude of the expected value.
    pub rtol: f64,
    /// Absolute tolerance floor.
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
        }
    }
}

impl Tolerance {
    #[must_use]
    pub const fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    /// Width of the allowed band around `expected`.
    #[inline]
    #[must_use]
    pub fn band(&self, expected: f64) -> f64 {
        self.atol + self.rtol * expected.abs()
    }
}

/// Absolute difference between observed and expected.
#[inline]
#[must_use]
pub fn delta(observed: f64, expected: f64) -> f64 {
    (observed - expected).abs()
}

/// Checks whether the observed value lies within the tolerance band.
#[inline]
#[must_use]
pub fn within_tolerance(observed: f64, expected: f64, tolerance: &Tolerance) -> bool {
    delta(observed, expected) <= tolerance.band(expected)
}
