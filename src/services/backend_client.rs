use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use serde_json::Value as JsonValue;

use crate::dto::backend_dto::{
    CandidateExerciseResultsResponse, CandidateExercisesResponse, ChallengeDetailResponse,
    RawPayload,
};
use crate::error::{Error, FetchError, Result};
use crate::models::exercise::{Exercise, Step};
use crate::models::progress::StepProgress;
use crate::models::schedule::ScheduleResult;

/// Read-only view of the interview backend used to assemble a report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultsBackend: Send + Sync {
    async fn get_schedule(
        &self,
        schedule_id: &str,
    ) -> std::result::Result<RawPayload<ScheduleResult>, FetchError>;

    async fn get_candidate_exercise_results(
        &self,
        schedule_id: &str,
    ) -> std::result::Result<RawPayload<CandidateExerciseResultsResponse>, FetchError>;

    /// Full exercise catalog of a candidate, challenges included.
    async fn get_candidate_exercises(
        &self,
        candidate_token: &str,
    ) -> std::result::Result<Vec<Exercise>, FetchError>;

    async fn get_challenge(
        &self,
        candidate_token: &str,
        challenge_id: &str,
    ) -> std::result::Result<Vec<Step>, FetchError>;

    /// `Ok(None)` when nothing has been stored for the step yet.
    async fn load_progress(
        &self,
        candidate_token: &str,
        challenge_id: &str,
        step_id: &str,
    ) -> std::result::Result<Option<StepProgress>, FetchError>;
}

#[derive(Clone)]
pub struct HttpResultsBackend {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    timeout: Duration,
}

impl HttpResultsBackend {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Backend URL {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport("Backend URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }

    /// GET a JSON document; a 404 maps to `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> std::result::Result<Option<T>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        serde_json::from_slice::<T>(&body)
            .map(Some)
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn get_required<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> std::result::Result<T, FetchError> {
        self.get_json(url).await?.ok_or(FetchError::NotFound)
    }
}

#[async_trait]
impl ResultsBackend for HttpResultsBackend {
    #[instrument(skip(self))]
    async fn get_schedule(
        &self,
        schedule_id: &str,
    ) -> std::result::Result<RawPayload<ScheduleResult>, FetchError> {
        let url = self.endpoint(&["api", "interviews", "schedules", schedule_id])?;
        debug!("Fetching schedule");
        let raw: JsonValue = self.get_required(url).await?;
        RawPayload::decode(raw)
    }

    #[instrument(skip(self))]
    async fn get_candidate_exercise_results(
        &self,
        schedule_id: &str,
    ) -> std::result::Result<RawPayload<CandidateExerciseResultsResponse>, FetchError> {
        let url = self.endpoint(&[
            "api",
            "interviews",
            "schedules",
            schedule_id,
            "exercise-results",
        ])?;
        debug!("Fetching candidate exercise results");
        let raw: JsonValue = self.get_required(url).await?;
        RawPayload::decode(raw)
    }

    #[instrument(skip_all)]
    async fn get_candidate_exercises(
        &self,
        candidate_token: &str,
    ) -> std::result::Result<Vec<Exercise>, FetchError> {
        let url = self.endpoint(&["api", "candidate", candidate_token, "exercises"])?;
        debug!("Fetching candidate exercise catalog");
        let response: CandidateExercisesResponse = self.get_required(url).await?;
        Ok(response.exercises)
    }

    #[instrument(skip(self, candidate_token))]
    async fn get_challenge(
        &self,
        candidate_token: &str,
        challenge_id: &str,
    ) -> std::result::Result<Vec<Step>, FetchError> {
        let url = self.endpoint(&["api", "candidate", candidate_token, "challenges", challenge_id])?;
        let response: ChallengeDetailResponse = self.get_required(url).await?;
        Ok(response.steps)
    }

    #[instrument(skip(self, candidate_token))]
    async fn load_progress(
        &self,
        candidate_token: &str,
        challenge_id: &str,
        step_id: &str,
    ) -> std::result::Result<Option<StepProgress>, FetchError> {
        let url = self.endpoint(&[
            "api",
            "candidate",
            candidate_token,
            "challenges",
            challenge_id,
            "steps",
            step_id,
            "progress",
        ])?;
        // The backend answers `null` as well as 404 for untouched steps.
        let progress: Option<Option<StepProgress>> = self.get_json(url).await?;
        Ok(progress.flatten())
    }
}
