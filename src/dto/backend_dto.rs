use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FetchError;
use crate::models::exercise::{Exercise, Step};
use crate::models::schedule::DetailedExerciseResult;

/// A decoded backend document next to the exact JSON it came from, so the
/// report can hand the payload back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload<T> {
    pub data: T,
    pub raw: JsonValue,
}

impl<T: DeserializeOwned> RawPayload<T> {
    pub fn decode(raw: JsonValue) -> Result<Self, FetchError> {
        let data = T::deserialize(&raw).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(Self { data, raw })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateExerciseResultsResponse {
    #[serde(default)]
    pub user_exercise: Option<JsonValue>,
    #[serde(default)]
    pub detailed_results: Vec<DetailedExerciseResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateExercisesResponse {
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeDetailResponse {
    #[serde(default)]
    pub steps: Vec<Step>,
}
