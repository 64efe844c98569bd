use crate::domain::ports::{Example, Metric};
use crate::domain::types::Fields;

/// `1 - |predicted - expected|` on a numeric field, clamped to `[0, 1]`.
///
/// A prediction missing the field, or an example without a label, scores 0.
pub struct ScoreAgreementMetric {
    field: String,
}

impl ScoreAgreementMetric {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Metric for ScoreAgreementMetric {
    fn score(&self, example: &Example, prediction: &Fields) -> f64 {
        match (
            example.labels.get_f64(&self.field),
            prediction.get_f64(&self.field),
        ) {
            (Some(expected), Some(predicted)) => (1.0 - (predicted - expected).abs()).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// 1.0 when a string output equals the label (case-insensitive), else 0.0
pub struct ExactMatchMetric {
    field: String,
}

impl ExactMatchMetric {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Metric for ExactMatchMetric {
    fn score(&self, example: &Example, prediction: &Fields) -> f64 {
        match (
            example.labels.get_str(&self.field),
            prediction.get_str(&self.field),
        ) {
            (Some(expected), Some(predicted))
                if expected.trim().eq_ignore_ascii_case(predicted.trim()) =>
            {
                1.0
            }
            _ => 0.0,
        }
    }
}
