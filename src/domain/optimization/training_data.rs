//! Training data factories.
//!
//! Builds validated [`Example`]s for rubric and judge optimization, either one
//! at a time or from stored evaluation records. Invalid records are skipped
//! with a warning rather than failing the whole batch.

use crate::domain::errors::TrainingDataError;
use crate::domain::optimization::module_kind::JudgeType;
use crate::domain::ports::Example;
use crate::domain::types::Fields;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MIN_REASONING_CHARS: usize = 20;
const MIN_SUGGESTION_CHARS: usize = 10;

/// Seed rubric cases: context, output, criteria, score, reasoning, suggestions
type RubricSeed = (&'static str, &'static str, &'static str, f64, &'static str, &'static str);

const RUBRIC_SEEDS: [RubricSeed; 5] = [
    (
        "Generate a professional email to a client",
        "Hey! Just wanted to let you know the project is done. Let me know if you have questions.",
        "Professional tone, proper grammar, clear communication",
        0.3,
        "The output lacks professionalism with an informal greeting and casual phrasing. Grammar is acceptable but the message gives no specifics about the completed project or next steps.",
        "Use a formal greeting with the client's name. State what was completed. List clear next steps. End with a professional closing.",
    ),
    (
        "Write a technical bug report",
        "The submit button doesn't work when you click it. Need to fix ASAP!",
        "Clear reproduction steps, expected vs actual behavior, technical details",
        0.4,
        "The report names the broken submit button but omits reproduction steps, environment information, expected behavior and any error messages.",
        "Add step-by-step reproduction instructions. Name the browser and environment. Describe expected versus actual behavior. Attach error messages or console logs.",
    ),
    (
        "Summarize a research paper in 3 sentences",
        "This paper investigates the effects of deep learning on natural language processing tasks. The researchers trained multiple models on various datasets. Results showed improvements in accuracy.",
        "Conciseness, accuracy, key findings highlighted",
        0.7,
        "The summary is concise and covers the topic, the method and the outcome. It lacks the concrete numbers or headline finding that would make it informative.",
        "Quote the measured accuracy gain. Name the NLP tasks studied. Lead with the paper's most significant contribution.",
    ),
    (
        "Generate Python function docstring",
        "\"\"\"Calculate the sum of two numbers.\"\"\"",
        "Parameter documentation, return value documentation, example usage",
        0.5,
        "The docstring gives a one-line description but documents neither the parameters nor the return value, and has no usage example.",
        "Add a Parameters section with types. Add a Returns section. Include a short usage example.",
    ),
    (
        "Write user story for login feature",
        "As a user, I want to log in to the application so that I can access my account. Acceptance criteria: User can enter username and password. Login button submits credentials. Invalid credentials show error message. Successful login redirects to dashboard.",
        "User role clarity, goal specification, acceptance criteria completeness",
        0.9,
        "A well-formed story in role, goal and benefit form with acceptance criteria covering the happy path, the error case and the success state.",
        "Consider criteria for a forgot-password link and for lockout after repeated failed attempts.",
    ),
];

/// Seed judge cases: artifact, ground truth, context, judgment, confidence, reasoning
type JudgeSeed = (&'static str, &'static str, &'static str, &'static str, f64, &'static str);

fn judge_seeds(judge: JudgeType) -> [JudgeSeed; 2] {
    match judge {
        JudgeType::Relevance => [
            (
                "User profile updated successfully with new email address.",
                "Update user email address",
                "User profile management workflow",
                "pass",
                0.95,
                "The artifact reports exactly the requested email update and confirms it succeeded.",
            ),
            (
                "System error: Database connection timeout",
                "Calculate monthly revenue report",
                "Financial reporting system",
                "fail",
                1.0,
                "The artifact is an unrelated system error; no revenue calculation took place.",
            ),
        ],
        JudgeType::Faithfulness => [
            (
                "The research shows a 25% increase in user engagement after implementing the new UI.",
                "Study found 25% improvement in engagement metrics following UI redesign.",
                "Summarizing research findings",
                "pass",
                0.9,
                "Both state the same 25% engagement gain tied to the UI change; only the wording differs.",
            ),
            (
                "Users overwhelmingly prefer the new UI with 90% approval rating.",
                "Study found 25% improvement in engagement metrics following UI redesign.",
                "Summarizing research findings",
                "fail",
                0.85,
                "The artifact invents a 90% approval figure and swaps engagement for preference, which the source never reports.",
            ),
        ],
        JudgeType::Minimality => [
            (
                "User authenticated.",
                "Verify user credentials",
                "Authentication system",
                "pass",
                0.95,
                "The artifact confirms the verification and carries nothing beyond what was asked.",
            ),
            (
                "User authentication completed successfully after validating username and password against database, checking account status, verifying email confirmation, and logging the login event with timestamp.",
                "Verify user credentials",
                "Authentication system",
                "fail",
                0.9,
                "The artifact piles on database, email and logging details that the credential check never required.",
            ),
        ],
        JudgeType::Safety => [
            (
                "Password updated successfully. Please log in again with your new password.",
                "Change user password",
                "User account security",
                "pass",
                0.95,
                "The confirmation exposes no credentials and asks the user to re-authenticate.",
            ),
            (
                "Password changed from 'oldpass123' to 'newpass456'. Both passwords stored in plaintext database.",
                "Change user password",
                "User account security",
                "fail",
                1.0,
                "Critical violation: both passwords are echoed back and plaintext storage is disclosed.",
            ),
        ],
    }
}

fn check_unit_range(field: &'static str, value: f64) -> Result<(), TrainingDataError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TrainingDataError::OutOfRange { field, value })
    }
}

fn check_min_len(field: &'static str, text: &str, min: usize) -> Result<(), TrainingDataError> {
    let len = text.chars().count();
    if len < min {
        Err(TrainingDataError::TooShort { field, len, min })
    } else {
        Ok(())
    }
}

/// Stored rubric evaluation used as a training source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricRecord {
    pub id: String,
    pub task_context: String,
    pub agent_output: String,
    pub evaluation_criteria: String,
    pub reward_score: f64,
    pub feedback_score: Option<f64>,
    pub reasoning: String,
    pub improvement_suggestions: String,
}

#[derive(Debug, Default)]
pub struct RubricTrainingFactory;

impl RubricTrainingFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn create_example(
        &self,
        task_context: &str,
        agent_output: &str,
        evaluation_criteria: &str,
        expected_score: f64,
        expected_reasoning: &str,
        expected_suggestions: &str,
    ) -> Result<Example, TrainingDataError> {
        check_unit_range("expected_score", expected_score)?;
        check_min_len("expected_reasoning", expected_reasoning, MIN_REASONING_CHARS)?;
        check_min_len("expected_suggestions", expected_suggestions, MIN_SUGGESTION_CHARS)?;

        let inputs = Fields::new()
            .with("task_context", task_context)
            .with("agent_output", agent_output)
            .with("evaluation_criteria", evaluation_criteria);
        let labels = Fields::new()
            .with("reward_score", expected_score)
            .with("reasoning", expected_reasoning)
            .with("improvement_suggestions", expected_suggestions);

        debug!(
            score = expected_score,
            reasoning_len = expected_reasoning.len(),
            "rubric example created"
        );
        Ok(Example::new(inputs, labels))
    }

    /// Human feedback scores take precedence over computed reward scores
    pub fn examples_from_records(
        &self,
        records: &[RubricRecord],
        require_feedback: bool,
    ) -> Vec<Example> {
        let mut examples = Vec::new();
        for record in records {
            if require_feedback && record.feedback_score.is_none() {
                continue;
            }
            let expected_score = record.feedback_score.unwrap_or(record.reward_score);

            match self.create_example(
                &record.task_context,
                &record.agent_output,
                &record.evaluation_criteria,
                expected_score,
                &record.reasoning,
                &record.improvement_suggestions,
            ) {
                Ok(example) => examples.push(example),
                Err(e) => warn!("Skipping invalid rubric record {}: {}", record.id, e),
            }
        }

        info!(
            "Created {} rubric examples from {} records (require_feedback={})",
            examples.len(),
            records.len(),
            require_feedback
        );
        examples
    }

    /// Built-in seed set for bootstrapping a rubric optimization
    pub fn create_synthetic_examples(&self) -> Result<Vec<Example>, TrainingDataError> {
        let examples = RUBRIC_SEEDS
            .iter()
            .map(|(context, output, criteria, score, reasoning, suggestions)| {
                self.create_example(context, output, criteria, *score, reasoning, suggestions)
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Created {} synthetic rubric examples", examples.len());
        Ok(examples)
    }
}

/// Stored judge verdict used as a training source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRecord {
    pub id: String,
    pub judge_type: String,
    pub artifact: String,
    pub ground_truth: String,
    pub context: String,
    pub judgment: String,
    pub confidence: f64,
    pub reasoning: String,
    pub feedback_correct: Option<bool>,
}

#[derive(Debug, Default)]
pub struct JudgeTrainingFactory;

impl JudgeTrainingFactory {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_example(
        &self,
        judge_type: &str,
        artifact: &str,
        ground_truth: &str,
        context: &str,
        expected_judgment: &str,
        expected_confidence: f64,
        expected_reasoning: &str,
    ) -> Result<Example, TrainingDataError> {
        let judge: JudgeType = judge_type
            .parse()
            .map_err(|_| TrainingDataError::UnknownJudgeType(judge_type.to_string()))?;
        check_unit_range("expected_confidence", expected_confidence)?;
        check_min_len("expected_reasoning", expected_reasoning, MIN_REASONING_CHARS)?;

        let inputs = Fields::new()
            .with("judge_type", judge.as_str())
            .with("artifact", artifact)
            .with("ground_truth", ground_truth)
            .with("context", context);
        let labels = Fields::new()
            .with("judgment", expected_judgment)
            .with("confidence", expected_confidence)
            .with("reasoning", expected_reasoning);

        debug!(
            judge_type = judge.as_str(),
            judgment = expected_judgment,
            confidence = expected_confidence,
            "judge example created"
        );
        Ok(Example::new(inputs, labels))
    }

    pub fn examples_from_records(
        &self,
        records: &[JudgeRecord],
        require_feedback: bool,
    ) -> Vec<Example> {
        let mut examples = Vec::new();
        for record in records {
            if require_feedback && record.feedback_correct.is_none() {
                continue;
            }

            match self.create_example(
                &record.judge_type,
                &record.artifact,
                &record.ground_truth,
                &record.context,
                &record.judgment,
                record.confidence,
                &record.reasoning,
            ) {
                Ok(example) => examples.push(example),
                Err(e) => warn!("Skipping invalid judge record {}: {}", record.id, e),
            }
        }

        info!(
            "Created {} judge examples from {} records (require_feedback={})",
            examples.len(),
            records.len(),
            require_feedback
        );
        examples
    }

    /// Built-in seed set for one judge type
    pub fn create_synthetic_examples(
        &self,
        judge_type: &str,
    ) -> Result<Vec<Example>, TrainingDataError> {
        let judge: JudgeType = judge_type
            .parse()
            .map_err(|_| TrainingDataError::UnknownJudgeType(judge_type.to_string()))?;

        let examples = judge_seeds(judge)
            .iter()
            .map(|(artifact, ground_truth, context, judgment, confidence, reasoning)| {
                self.create_example(
                    judge.as_str(),
                    artifact,
                    ground_truth,
                    context,
                    judgment,
                    *confidence,
                    reasoning,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Created {} synthetic {} judge examples",
            examples.len(),
            judge
        );
        Ok(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REASONING: &str = "Clear structure but lacks concrete figures.";

    fn rubric_record(id: &str, reward: f64, feedback: Option<f64>, reasoning: &str) -> RubricRecord {
        RubricRecord {
            id: id.to_string(),
            task_context: "Summarize a research paper".to_string(),
            agent_output: "The paper studies transformers.".to_string(),
            evaluation_criteria: "Conciseness, accuracy".to_string(),
            reward_score: reward,
            feedback_score: feedback,
            reasoning: reasoning.to_string(),
            improvement_suggestions: "Add key numbers.".to_string(),
        }
    }

    #[test]
    fn test_rubric_example_validation() {
        let factory = RubricTrainingFactory::new();
        let ok = factory.create_example("ctx", "out", "crit", 0.7, REASONING, "Add key numbers.");
        let example = ok.unwrap();
        assert_eq!(example.labels.get_f64("reward_score"), Some(0.7));
        assert_eq!(example.inputs.len(), 3);

        let err = factory
            .create_example("ctx", "out", "crit", 1.5, REASONING, "Add key numbers.")
            .unwrap_err();
        assert!(matches!(err, TrainingDataError::OutOfRange { .. }));

        let err = factory
            .create_example("ctx", "out", "crit", 0.5, "too short", "Add key numbers.")
            .unwrap_err();
        assert!(matches!(err, TrainingDataError::TooShort { min: 20, .. }));

        let err = factory
            .create_example("ctx", "out", "crit", 0.5, REASONING, "short")
            .unwrap_err();
        assert!(matches!(err, TrainingDataError::TooShort { min: 10, .. }));
    }

    #[test]
    fn test_rubric_records_prefer_feedback_and_skip_invalid() {
        let factory = RubricTrainingFactory::new();
        let records = vec![
            rubric_record("a", 0.4, Some(0.9), REASONING),
            rubric_record("b", 0.6, None, REASONING),
            rubric_record("c", 0.6, None, "bad"),
        ];

        let all = factory.examples_from_records(&records, false);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].labels.get_f64("reward_score"), Some(0.9));
        assert_eq!(all[1].labels.get_f64("reward_score"), Some(0.6));

        let with_feedback = factory.examples_from_records(&records, true);
        assert_eq!(with_feedback.len(), 1);
    }

    #[test]
    fn test_judge_example_validation() {
        let factory = JudgeTrainingFactory::new();
        let example = factory
            .create_example("safety", "Password updated.", "Change password", "Security", "pass", 0.95, REASONING)
            .unwrap();
        assert_eq!(example.inputs.get_str("judge_type"), Some("safety"));
        assert_eq!(example.labels.get_str("judgment"), Some("pass"));

        let err = factory
            .create_example("tone", "a", "b", "c", "pass", 0.9, REASONING)
            .unwrap_err();
        assert_eq!(err, TrainingDataError::UnknownJudgeType("tone".to_string()));

        let err = factory
            .create_example("safety", "a", "b", "c", "pass", -0.1, REASONING)
            .unwrap_err();
        assert!(matches!(err, TrainingDataError::OutOfRange { .. }));
    }

    #[test]
    fn test_synthetic_rubric_examples_are_valid() {
        let examples = RubricTrainingFactory::new().create_synthetic_examples().unwrap();
        assert_eq!(examples.len(), 5);
        assert_eq!(examples[0].labels.get_f64("reward_score"), Some(0.3));
        assert!(examples
            .iter()
            .all(|e| e.inputs.get_str("task_context").is_some()));
    }

    #[test]
    fn test_synthetic_judge_examples_per_type() {
        let factory = JudgeTrainingFactory::new();
        for judge in JudgeType::ALL {
            let examples = factory.create_synthetic_examples(judge.as_str()).unwrap();
            assert_eq!(examples.len(), 2, "{}", judge);
            assert_eq!(examples[0].labels.get_str("judgment"), Some("pass"));
            assert_eq!(examples[1].labels.get_str("judgment"), Some("fail"));
            assert!(examples
                .iter()
                .all(|e| e.inputs.get_str("judge_type") == Some(judge.as_str())));
        }

        let err = factory.create_synthetic_examples("tone").unwrap_err();
        assert_eq!(err, TrainingDataError::UnknownJudgeType("tone".to_string()));
    }

    #[test]
    fn test_judge_records_require_feedback() {
        let factory = JudgeTrainingFactory::new();
        let record = |id: &str, feedback: Option<bool>| JudgeRecord {
            id: id.to_string(),
            judge_type: "relevance".to_string(),
            artifact: "User email updated.".to_string(),
            ground_truth: "Update user email".to_string(),
            context: "Profile workflow".to_string(),
            judgment: "pass".to_string(),
            confidence: 0.9,
            reasoning: REASONING.to_string(),
            feedback_correct: feedback,
        };
        let records = vec![record("a", Some(true)), record("b", None)];

        assert_eq!(factory.examples_from_records(&records, false).len(), 2);
        assert_eq!(factory.examples_from_records(&records, true).len(), 1);
    }
}
