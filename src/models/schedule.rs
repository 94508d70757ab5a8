use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::exercise::{deserialize_id_flexible, Exercise};

/// Session state of a schedule. States this service does not know keep the
/// backend's wording so the report never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Expired,
    Unknown(String),
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ScheduleStatus::Scheduled => "scheduled",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
            ScheduleStatus::Expired => "expired",
            ScheduleStatus::Unknown(raw) => raw.as_str(),
        }
    }
}

impl From<String> for ScheduleStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "scheduled" => ScheduleStatus::Scheduled,
            "in_progress" => ScheduleStatus::InProgress,
            "completed" => ScheduleStatus::Completed,
            "cancelled" => ScheduleStatus::Cancelled,
            "expired" => ScheduleStatus::Expired,
            _ => ScheduleStatus::Unknown(raw),
        }
    }
}

impl From<ScheduleStatus> for String {
    fn from(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewInfo {
    pub title: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Counters the backend embeds next to each assigned exercise. Used when
/// the progress tree cannot be walked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedSummary {
    #[serde(default)]
    pub total_steps: u32,
    #[serde(default)]
    pub completed_steps: u32,
    #[serde(default)]
    pub total_tests: u32,
    #[serde(default)]
    pub passed_tests: u32,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedExerciseResult {
    pub exercise: Exercise,
    #[serde(default)]
    pub summary: Option<EmbeddedSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    #[serde(deserialize_with = "deserialize_id_flexible")]
    pub id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub interview: Option<InterviewInfo>,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub detailed_results: Vec<DetailedExerciseResult>,
}
