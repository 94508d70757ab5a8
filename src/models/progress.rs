use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted submission state of one step. `Default` is the record used when
/// the backend has nothing stored or the fetch failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub tests_passed: u32,
    #[serde(default)]
    pub tests_total: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub last_edited: Option<DateTime<Utc>>,
}

impl StepProgress {
    pub fn is_attempted(&self) -> bool {
        self.tests_passed > 0 || !self.code.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgressEntry {
    pub step_id: String,
    #[serde(flatten)]
    pub progress: StepProgress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgressInfo {
    pub challenge_id: String,
    pub exercise_id: String,
    pub title: String,
    pub attempted: bool,
    pub completed: bool,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub total_tests: u32,
    pub passed_tests: u32,
    pub steps: Vec<StepProgressEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgressInfo {
    pub exercise_id: String,
    pub title: String,
    pub attempted: bool,
    pub completed: bool,
    /// Integer percentage in `0..=100`.
    pub completion_rate: u32,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub total_challenges: u32,
    pub completed_challenges: u32,
    pub total_tests: u32,
    pub passed_tests: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalProgress {
    pub total_steps: u32,
    pub completed_steps: u32,
    pub total_tests: u32,
    pub passed_tests: u32,
    pub exercises_total: u32,
    pub exercises_completed: u32,
    pub real_overall_score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attempted_when_code_or_tests_present() {
        assert!(!StepProgress::default().is_attempted());

        let whitespace = StepProgress {
            code: "  \n\t".into(),
            ..Default::default()
        };
        assert!(!whitespace.is_attempted());

        let with_code = StepProgress {
            code: "fn main() {}".into(),
            ..Default::default()
        };
        assert!(with_code.is_attempted());

        let with_tests = StepProgress {
            tests_passed: 1,
            tests_total: 4,
            ..Default::default()
        };
        assert!(with_tests.is_attempted());
    }

    #[test]
    fn progress_tolerates_missing_fields() {
        let parsed: StepProgress = serde_json::from_value(json!({
            "is_completed": true,
            "last_edited": "2026-03-01T10:15:00Z"
        }))
        .unwrap();
        assert!(parsed.is_completed);
        assert_eq!(parsed.tests_total, 0);
        assert!(parsed.code.is_empty());
        assert!(parsed.last_edited.is_some());
    }
}
