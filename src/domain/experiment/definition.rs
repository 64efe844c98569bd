use crate::domain::errors::StoreError;
use crate::domain::types::MetricMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arm of an A/B experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Baseline,
    Optimized,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Optimized => "optimized",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Variant::Baseline),
            "optimized" => Ok(Variant::Optimized),
            other => Err(StoreError::invalid(format!(
                "variant must be 'baseline' or 'optimized', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Active,
    Stopped,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Active => "active",
            ExperimentStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ExperimentStatus::Active),
            "stopped" => Ok(ExperimentStatus::Stopped),
            other => Err(StoreError::invalid(format!(
                "unknown experiment status '{}'",
                other
            ))),
        }
    }
}

/// A/B experiment comparing a baseline and an optimized module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub module_type: String,
    pub baseline_ref: Option<String>,
    pub optimized_ref: Option<String>,
    /// Share of traffic routed to the baseline arm
    pub split_ratio: f64,
    pub created_at: DateTime<Utc>,
    pub status: ExperimentStatus,
    pub notes: Option<String>,
}

impl Experiment {
    /// Maps a uniform draw in `[0, 1)` onto an arm
    pub fn choose_variant(&self, draw: f64) -> Variant {
        if draw < self.split_ratio {
            Variant::Baseline
        } else {
            Variant::Optimized
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub name: String,
    pub module_type: String,
    pub baseline_ref: Option<String>,
    pub optimized_ref: Option<String>,
    pub split_ratio: f64,
    pub notes: Option<String>,
}

impl NewExperiment {
    pub fn new(name: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_type: module_type.into(),
            baseline_ref: None,
            optimized_ref: None,
            split_ratio: 0.5,
            notes: None,
        }
    }

    pub fn with_refs(
        mut self,
        baseline_ref: Option<String>,
        optimized_ref: Option<String>,
    ) -> Self {
        self.baseline_ref = baseline_ref;
        self.optimized_ref = optimized_ref;
        self
    }

    pub fn with_split_ratio(mut self, split_ratio: f64) -> Self {
        self.split_ratio = split_ratio;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        // NaN fails both comparisons
        if !(self.split_ratio > 0.0 && self.split_ratio <= 1.0) {
            return Err(StoreError::invalid(format!(
                "split_ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }
        Ok(())
    }
}

/// Single recorded outcome of live traffic against one arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub experiment_id: String,
    pub variant: Variant,
    pub timestamp: DateTime<Utc>,
    pub metrics: MetricMap,
}
