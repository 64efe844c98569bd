use crate::domain::types::ParamMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeType {
    Relevance,
    Faithfulness,
    Minimality,
    Safety,
}

impl JudgeType {
    pub const ALL: [JudgeType; 4] = [
        JudgeType::Relevance,
        JudgeType::Faithfulness,
        JudgeType::Minimality,
        JudgeType::Safety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JudgeType::Relevance => "relevance",
            JudgeType::Faithfulness => "faithfulness",
            JudgeType::Minimality => "minimality",
            JudgeType::Safety => "safety",
        }
    }
}

impl fmt::Display for JudgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JudgeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JudgeType::ALL
            .into_iter()
            .find(|j| j.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid judge type: {}. Must be one of relevance, faithfulness, minimality, safety",
                    s
                )
            })
    }
}

/// Logical unit being optimized and versioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    Rubric,
    Judge(JudgeType),
}

impl ModuleKind {
    /// Registry key for this kind
    pub fn module_type(&self) -> String {
        match self {
            ModuleKind::Rubric => "rubric_optimizer".to_string(),
            ModuleKind::Judge(judge) => format!("judge_{}", judge),
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module_type())
    }
}

impl FromStr for ModuleKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        match lowered.as_str() {
            "rubric" | "rubric_optimizer" => Ok(ModuleKind::Rubric),
            other => match other.strip_prefix("judge_") {
                Some(judge) => Ok(ModuleKind::Judge(judge.parse()?)),
                None => anyhow::bail!(
                    "Invalid module kind: {}. Must be 'rubric_optimizer' or 'judge_<type>'",
                    s
                ),
            },
        }
    }
}

/// Parameters handed to the optimizer and recorded with the registered version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub num_trials: u32,
    pub num_candidates: u32,
    pub init_temperature: f64,
    pub max_bootstrapped_demos: u32,
    pub max_labeled_demos: u32,
    #[serde(flatten)]
    pub extra: ParamMap,
}

impl OptimizerConfig {
    pub fn rubric() -> Self {
        Self {
            num_trials: 100,
            num_candidates: 10,
            init_temperature: 1.0,
            max_bootstrapped_demos: 4,
            max_labeled_demos: 4,
            extra: ParamMap::new(),
        }
    }

    pub fn judge() -> Self {
        Self {
            num_trials: 150,
            num_candidates: 15,
            init_temperature: 1.2,
            max_bootstrapped_demos: 5,
            max_labeled_demos: 5,
            extra: ParamMap::new(),
        }
    }

    pub fn for_kind(kind: &ModuleKind) -> Self {
        match kind {
            ModuleKind::Rubric => Self::rubric(),
            ModuleKind::Judge(_) => Self::judge(),
        }
    }

    pub fn with_trials(mut self, num_trials: u32) -> Self {
        self.num_trials = num_trials;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Flattened parameter map as stored in the registry
    pub fn to_params(&self) -> Result<ParamMap, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Ok(ParamMap::from([("config".to_string(), other)])),
        }
    }
}
