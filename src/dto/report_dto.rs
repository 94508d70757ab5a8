use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::models::progress::{ChallengeProgressInfo, ExerciseProgressInfo};
use crate::models::schedule::DetailedExerciseResult;
use crate::services::tree_walker::PartialFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Xlsx,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub candidate_token: Option<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

/// Candidate token after trimming, whichever way the caller supplied it.
#[derive(Debug, Clone, Validate)]
pub struct CandidateToken {
    #[validate(length(min = 1, max = 512))]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationSource {
    /// Computed from the walked exercise → challenge → step tree.
    Full,
    /// Derived from the counters the backend embeds in the schedule result.
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub report_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub schedule_id: String,
    pub candidate_name: String,
    pub position: Option<String>,
    pub interview_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub overall_score: u32,
    pub exercises_completed: u32,
    pub exercises_total: u32,
    pub steps_completed: u32,
    pub steps_total: u32,
    pub tests_passed: u32,
    pub tests_total: u32,
    pub time_limit_minutes: Option<u32>,
    pub session_status: String,
    pub aggregation: AggregationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub exercise_progress: BTreeMap<String, ExerciseProgressInfo>,
    /// Keyed by exercise id, then challenge id.
    pub challenge_progress: BTreeMap<String, BTreeMap<String, ChallengeProgressInfo>>,
    pub partial_failures: Vec<PartialFailure>,
    pub assigned_exercises: Vec<DetailedExerciseResult>,
    pub raw_results: RawResults,
}

/// Backend documents exactly as they were received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResults {
    pub schedule: JsonValue,
    pub exercise_results: JsonValue,
}
