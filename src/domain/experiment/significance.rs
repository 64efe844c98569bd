//! Significance analysis for A/B experiments.
//!
//! The default [`SignificanceMethod::Heuristic`] maps a Welch-style t statistic
//! onto a coarse p-value through fixed breakpoints; it is not a calibrated test.
//! [`SignificanceMethod::StudentT`] computes a two-sided p-value from the
//! Student's t distribution with Welch–Satterthwaite degrees of freedom.

use crate::domain::errors::StoreError;
use crate::domain::types::{mean, percent_change};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_METRIC_KEY: &str = "primary_score";
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Minimum samples per arm before significance is considered
const MIN_SAMPLES: usize = 3;
/// Minimum samples per arm before a standard error exists
const MIN_SPREAD_SAMPLES: usize = 2;
/// Normal critical value used for the confidence interval
const Z_CRITICAL: f64 = 1.96;
/// Standard errors below this are treated as zero spread
const ZERO_SE: f64 = 1e-12;
/// `(t threshold, p-value)` pairs, checked in order
const T_BREAKPOINTS: [(f64, f64); 2] = [(2.0, 0.05), (1.96, 0.05)];
const FALLBACK_P: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceMethod {
    #[default]
    Heuristic,
    StudentT,
}

impl fmt::Display for SignificanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignificanceMethod::Heuristic => write!(f, "heuristic"),
            SignificanceMethod::StudentT => write!(f, "student_t"),
        }
    }
}

impl FromStr for SignificanceMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" => Ok(SignificanceMethod::Heuristic),
            "student_t" | "students_t" | "t" => Ok(SignificanceMethod::StudentT),
            other => Err(StoreError::invalid(format!(
                "unknown significance method '{}', expected 'heuristic' or 'student_t'",
                other
            ))),
        }
    }
}

/// Outcome of `analyze_results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub baseline_mean: f64,
    pub optimized_mean: f64,
    pub baseline_count: usize,
    pub optimized_count: usize,
    pub improvement_percent: f64,
    pub is_significant: bool,
    pub p_value: f64,
    /// Interval for `optimized_mean - baseline_mean`
    pub confidence_interval: (f64, f64),
}

/// Compares the two arms' samples of a single metric
pub fn analyze(
    baseline: &[f64],
    optimized: &[f64],
    confidence_level: f64,
    method: SignificanceMethod,
) -> ExperimentResults {
    let baseline_mean = mean(baseline);
    let optimized_mean = mean(optimized);
    let diff = optimized_mean - baseline_mean;

    let n_b = baseline.len();
    let n_o = optimized.len();

    // Spread is defined once each arm has two samples
    let spread = (n_b >= MIN_SPREAD_SAMPLES && n_o >= MIN_SPREAD_SAMPLES)
        .then(|| {
            let se_b = sample_variance(baseline, baseline_mean) / n_b as f64;
            let se_o = sample_variance(optimized, optimized_mean) / n_o as f64;
            (se_b, se_o, (se_b + se_o).sqrt())
        })
        .filter(|(_, _, se)| *se > ZERO_SE);

    let (p_value, confidence_interval) = match spread {
        None => (1.0, (diff, diff)),
        Some((se_b, se_o, se)) => {
            let interval = (diff - Z_CRITICAL * se, diff + Z_CRITICAL * se);
            if n_b < MIN_SAMPLES || n_o < MIN_SAMPLES {
                (1.0, interval)
            } else {
                let t = diff.abs() / se;
                let p = match method {
                    SignificanceMethod::Heuristic => heuristic_p_value(t),
                    SignificanceMethod::StudentT => {
                        student_t_p_value(t, welch_degrees_of_freedom(se_b, se_o, n_b, n_o))
                    }
                };
                (p, interval)
            }
        }
    };

    ExperimentResults {
        baseline_mean,
        optimized_mean,
        baseline_count: baseline.len(),
        optimized_count: optimized.len(),
        improvement_percent: percent_change(baseline_mean, optimized_mean),
        is_significant: p_value < (1.0 - confidence_level),
        p_value,
        confidence_interval,
    }
}

/// Sample variance with an `n - 1` denominator
fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

fn heuristic_p_value(t: f64) -> f64 {
    T_BREAKPOINTS
        .iter()
        .find(|(threshold, _)| t > *threshold)
        .map(|(_, p)| *p)
        .unwrap_or(FALLBACK_P)
}

fn welch_degrees_of_freedom(se_b: f64, se_o: f64, n_b: usize, n_o: usize) -> f64 {
    let numerator = (se_b + se_o).powi(2);
    let denominator = se_b.powi(2) / (n_b - 1) as f64 + se_o.powi(2) / (n_o - 1) as f64;
    if denominator <= 0.0 {
        (n_b + n_o - 2) as f64
    } else {
        numerator / denominator
    }
}

fn student_t_p_value(t: f64, df: f64) -> f64 {
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| (2.0 * (1.0 - dist.cdf(t))).clamp(0.0, 1.0))
        .unwrap_or(1.0)
}
