use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::models::exercise::{Challenge, Exercise};
use crate::models::progress::{StepProgress, StepProgressEntry};
use crate::models::schedule::DetailedExerciseResult;
use crate::services::backend_client::ResultsBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureLevel {
    Catalog,
    Exercise,
    Challenge,
    Step,
}

/// A node the walk could not fetch. The report still carries a best-effort
/// value for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialFailure {
    pub level: FailureLevel,
    pub exercise_id: Option<String>,
    pub challenge_id: Option<String>,
    pub step_id: Option<String>,
    pub message: String,
}

impl PartialFailure {
    fn catalog(err: &FetchError) -> Self {
        Self {
            level: FailureLevel::Catalog,
            exercise_id: None,
            challenge_id: None,
            step_id: None,
            message: err.to_string(),
        }
    }

    fn exercise(exercise_id: &str, message: impl Into<String>) -> Self {
        Self {
            level: FailureLevel::Exercise,
            exercise_id: Some(exercise_id.to_string()),
            challenge_id: None,
            step_id: None,
            message: message.into(),
        }
    }

    fn challenge(exercise_id: &str, challenge_id: &str, err: &FetchError) -> Self {
        Self {
            level: FailureLevel::Challenge,
            exercise_id: Some(exercise_id.to_string()),
            challenge_id: Some(challenge_id.to_string()),
            step_id: None,
            message: err.to_string(),
        }
    }

    fn step(exercise_id: &str, challenge_id: &str, step_id: &str, err: &FetchError) -> Self {
        Self {
            level: FailureLevel::Step,
            exercise_id: Some(exercise_id.to_string()),
            challenge_id: Some(challenge_id.to_string()),
            step_id: Some(step_id.to_string()),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeSnapshot {
    pub challenge: Challenge,
    pub steps: Vec<StepProgressEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSnapshot {
    pub exercise: Exercise,
    pub challenges: Vec<ChallengeSnapshot>,
}

/// Raw exercise → challenge → step progress as fetched, before reduction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub assigned_exercises: u32,
    pub exercises: Vec<ExerciseSnapshot>,
    pub failures: Vec<PartialFailure>,
}

#[derive(Clone)]
pub struct ExerciseTreeWalker {
    backend: Arc<dyn ResultsBackend>,
    concurrency: usize,
    request_timeout: Duration,
}

impl ExerciseTreeWalker {
    pub fn new(backend: Arc<dyn ResultsBackend>, concurrency: usize, request_timeout: Duration) -> Self {
        Self {
            backend,
            concurrency: concurrency.max(1),
            request_timeout,
        }
    }

    /// Runs one backend call under the request timeout, giving up as soon as
    /// `cancel` fires.
    pub(crate) async fn guarded<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = tokio::time::timeout(self.request_timeout, fut) => {
                outcome.unwrap_or_else(|_| Err(FetchError::Timeout(self.request_timeout)))
            }
        }
    }

    /// Fetches progress for every assigned exercise. Individual failures are
    /// recorded on the snapshot; only cancellation aborts the walk.
    #[instrument(skip_all, fields(exercises = exercises.len()))]
    pub async fn walk(
        &self,
        candidate_token: &str,
        exercises: &[DetailedExerciseResult],
        cancel: &CancellationToken,
    ) -> Result<ProgressSnapshot, FetchError> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(exercises.len());
        let mut duplicates = Vec::new();
        for assigned in exercises {
            if seen.insert(assigned.exercise.id.as_str()) {
                unique.push(assigned);
            } else {
                duplicates.push(assigned.exercise.id.as_str());
            }
        }

        let mut snapshot = ProgressSnapshot {
            assigned_exercises: u32::try_from(unique.len()).unwrap_or(u32::MAX),
            ..Default::default()
        };
        for exercise_id in duplicates {
            warn!(exercise_id, "Exercise assigned more than once, counting it once");
            snapshot.failures.push(PartialFailure::exercise(
                exercise_id,
                "exercise assigned more than once",
            ));
        }
        if unique.is_empty() {
            return Ok(snapshot);
        }

        let catalog = match self
            .guarded(cancel, self.backend.get_candidate_exercises(candidate_token))
            .await
        {
            Ok(catalog) => catalog,
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(err) => {
                warn!(error = %err, "Candidate exercise catalog unavailable, skipping progress walk");
                snapshot.failures.push(PartialFailure::catalog(&err));
                return Ok(snapshot);
            }
        };

        for assigned in unique {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let exercise_id = assigned.exercise.id.as_str();
            let Some(entry) = catalog.iter().find(|e| e.id == exercise_id) else {
                warn!(exercise_id, "Assigned exercise missing from candidate catalog");
                snapshot.failures.push(PartialFailure::exercise(
                    exercise_id,
                    "exercise not found in candidate catalog",
                ));
                continue;
            };

            debug!(exercise_id, challenges = entry.challenges.len(), "Walking exercise");

            let walked: Vec<(ChallengeSnapshot, Vec<PartialFailure>)> =
                stream::iter(entry.challenges.clone())
                    .map(|challenge| async move {
                        self.walk_challenge(candidate_token, exercise_id, &challenge, cancel)
                            .await
                    })
                    .buffered(self.concurrency)
                    .collect()
                    .await;

            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let mut challenges = Vec::with_capacity(walked.len());
            for (challenge, failures) in walked {
                challenges.push(challenge);
                snapshot.failures.extend(failures);
            }

            let mut exercise = assigned.exercise.clone();
            exercise.challenges.clear();
            snapshot.exercises.push(ExerciseSnapshot {
                exercise,
                challenges,
            });
        }

        Ok(snapshot)
    }

    async fn walk_challenge(
        &self,
        candidate_token: &str,
        exercise_id: &str,
        challenge: &Challenge,
        cancel: &CancellationToken,
    ) -> (ChallengeSnapshot, Vec<PartialFailure>) {
        let mut failures = Vec::new();
        let mut snapshot = ChallengeSnapshot {
            challenge: Challenge {
                steps: Vec::new(),
                ..challenge.clone()
            },
            steps: Vec::new(),
        };

        let steps = match self
            .guarded(cancel, self.backend.get_challenge(candidate_token, &challenge.id))
            .await
        {
            Ok(steps) => steps,
            Err(FetchError::Cancelled) => return (snapshot, failures),
            Err(err) => {
                warn!(
                    exercise_id,
                    challenge_id = %challenge.id,
                    error = %err,
                    "Challenge unavailable, recording it without progress"
                );
                failures.push(PartialFailure::challenge(exercise_id, &challenge.id, &err));
                return (snapshot, failures);
            }
        };

        for step in steps {
            let progress = match self
                .guarded(
                    cancel,
                    self.backend
                        .load_progress(candidate_token, &challenge.id, &step.id),
                )
                .await
            {
                Ok(progress) => progress.unwrap_or_default(),
                Err(FetchError::Cancelled) => return (snapshot, failures),
                Err(err) => {
                    warn!(
                        exercise_id,
                        challenge_id = %challenge.id,
                        step_id = %step.id,
                        error = %err,
                        "Step progress unavailable, counting it as untouched"
                    );
                    failures.push(PartialFailure::step(
                        exercise_id,
                        &challenge.id,
                        &step.id,
                        &err,
                    ));
                    StepProgress::default()
                }
            };

            snapshot.steps.push(StepProgressEntry {
                step_id: step.id,
                progress,
            });
        }

        (snapshot, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::backend_dto::{CandidateExerciseResultsResponse, RawPayload};
    use crate::models::exercise::{Difficulty, Step};
    use crate::models::schedule::ScheduleResult;
    use crate::services::backend_client::MockResultsBackend;
    use crate::services::progress_reducer::reduce_snapshot;
    use async_trait::async_trait;

    fn step(id: &str) -> Step {
        Step {
            id: id.to_string(),
            title: None,
            order: None,
        }
    }

    fn challenge(id: &str) -> Challenge {
        Challenge {
            id: id.to_string(),
            title: format!("Challenge {}", id),
            description: None,
            steps: vec![],
        }
    }

    fn exercise(id: &str, challenges: Vec<Challenge>) -> Exercise {
        Exercise {
            id: id.to_string(),
            title: format!("Exercise {}", id),
            description: None,
            language: Some("python".to_string()),
            difficulty: Difficulty::Beginner,
            challenges,
        }
    }

    fn assigned(id: &str) -> DetailedExerciseResult {
        DetailedExerciseResult {
            exercise: exercise(id, vec![]),
            summary: None,
        }
    }

    fn walker(backend: MockResultsBackend) -> ExerciseTreeWalker {
        ExerciseTreeWalker::new(Arc::new(backend), 2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn failed_step_fetch_counts_as_empty_progress() {
        let mut backend = MockResultsBackend::new();
        backend
            .expect_get_candidate_exercises()
            .times(1)
            .returning(|_| Ok(vec![exercise("ex-1", vec![challenge("c-1")])]));
        backend
            .expect_get_challenge()
            .returning(|_, _| Ok(vec![step("s1"), step("s2")]));
        backend
            .expect_load_progress()
            .returning(|_, _, step_id| {
                if step_id == "s2" {
                    Err(FetchError::Transport("connection reset".to_string()))
                } else {
                    Ok(Some(StepProgress {
                        code: "print(1)".to_string(),
                        tests_passed: 2,
                        tests_total: 2,
                        is_completed: true,
                        last_edited: None,
                    }))
                }
            });

        let snapshot = walker(backend)
            .walk("tok", &[assigned("ex-1")], &CancellationToken::new())
            .await
            .unwrap();

        let steps = &snapshot.exercises[0].challenges[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].step_id, "s2");
        assert_eq!(steps[1].progress, StepProgress::default());
        assert!(!steps[1].progress.is_completed);
        assert_eq!(steps[1].progress.tests_total, 0);
        assert_eq!(steps[1].progress.code, "");

        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].level, FailureLevel::Step);
        assert_eq!(snapshot.failures[0].step_id.as_deref(), Some("s2"));

        let aggregates = reduce_snapshot(&snapshot);
        let info = &aggregates.challenge_progress["ex-1"]["c-1"];
        assert_eq!(info.total_steps, 2);
        assert_eq!(info.completed_steps, 1);
        assert!(!info.completed);
    }

    #[tokio::test]
    async fn failed_challenge_is_kept_with_zero_progress() {
        let mut backend = MockResultsBackend::new();
        backend.expect_get_candidate_exercises().returning(|_| {
            Ok(vec![exercise(
                "ex-1",
                vec![challenge("c-1"), challenge("c-2"), challenge("c-3")],
            )])
        });
        backend.expect_get_challenge().returning(|_, challenge_id| {
            if challenge_id == "c-2" {
                Err(FetchError::Status(500))
            } else {
                Ok(vec![step(&format!("{}-s", challenge_id))])
            }
        });
        backend
            .expect_load_progress()
            .returning(|_, _, _| Ok(None));

        let snapshot = walker(backend)
            .walk("tok", &[assigned("ex-1")], &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = snapshot.exercises[0]
            .challenges
            .iter()
            .map(|c| c.challenge.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3"]);
        assert!(snapshot.exercises[0].challenges[1].steps.is_empty());
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].level, FailureLevel::Challenge);

        let aggregates = reduce_snapshot(&snapshot);
        let failed = &aggregates.challenge_progress["ex-1"]["c-2"];
        assert!(!failed.attempted);
        assert!(!failed.completed);
        assert_eq!(failed.total_steps, 0);
        assert_eq!(aggregates.exercise_progress["ex-1"].total_steps, 2);
    }

    #[tokio::test]
    async fn catalog_failure_skips_every_exercise() {
        let mut backend = MockResultsBackend::new();
        backend
            .expect_get_candidate_exercises()
            .times(1)
            .returning(|_| Err(FetchError::Status(503)));
        backend.expect_get_challenge().times(0);

        let snapshot = walker(backend)
            .walk(
                "tok",
                &[assigned("ex-1"), assigned("ex-2")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(snapshot.exercises.is_empty());
        assert_eq!(snapshot.assigned_exercises, 2);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].level, FailureLevel::Catalog);
        assert_eq!(reduce_snapshot(&snapshot).global.real_overall_score, 0);
    }

    #[tokio::test]
    async fn catalog_is_fetched_once_for_all_exercises() {
        let mut backend = MockResultsBackend::new();
        backend
            .expect_get_candidate_exercises()
            .times(1)
            .returning(|_| {
                Ok(vec![
                    exercise("ex-1", vec![challenge("c-1")]),
                    exercise("ex-2", vec![challenge("c-2")]),
                ])
            });
        backend
            .expect_get_challenge()
            .times(2)
            .returning(|_, _| Ok(vec![]));

        let snapshot = walker(backend)
            .walk(
                "tok",
                &[assigned("ex-1"), assigned("ex-2"), assigned("ex-missing")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.exercises.len(), 2);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].level, FailureLevel::Exercise);
        assert_eq!(snapshot.failures[0].exercise_id.as_deref(), Some("ex-missing"));
    }

    #[tokio::test]
    async fn cancelled_walk_returns_cancelled() {
        let mut backend = MockResultsBackend::new();
        backend
            .expect_get_candidate_exercises()
            .returning(|_| Ok(vec![exercise("ex-1", vec![challenge("c-1")])]));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = walker(backend)
            .walk("tok", &[assigned("ex-1")], &cancel)
            .await;
        assert!(matches!(outcome, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn duplicate_assignment_is_walked_once() {
        let mut backend = MockResultsBackend::new();
        backend
            .expect_get_candidate_exercises()
            .returning(|_| Ok(vec![exercise("ex-1", vec![challenge("c-1")])]));
        backend
            .expect_get_challenge()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let snapshot = walker(backend)
            .walk(
                "tok",
                &[assigned("ex-1"), assigned("ex-1")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.assigned_exercises, 1);
        assert_eq!(snapshot.exercises.len(), 1);
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].level, FailureLevel::Exercise);
        assert_eq!(snapshot.failures[0].exercise_id.as_deref(), Some("ex-1"));
        assert_eq!(reduce_snapshot(&snapshot).global.exercises_total, 1);
    }

    #[tokio::test]
    async fn nothing_assigned_makes_no_calls() {
        let mut backend = MockResultsBackend::new();
        backend.expect_get_candidate_exercises().times(0);

        let snapshot = walker(backend)
            .walk("tok", &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot, ProgressSnapshot::default());
    }

    /// Backend whose step progress endpoint never answers in time.
    struct StalledProgressBackend;

    #[async_trait]
    impl ResultsBackend for StalledProgressBackend {
        async fn get_schedule(&self, _: &str) -> Result<RawPayload<ScheduleResult>, FetchError> {
            Err(FetchError::NotFound)
        }

        async fn get_candidate_exercise_results(
            &self,
            _: &str,
        ) -> Result<RawPayload<CandidateExerciseResultsResponse>, FetchError> {
            Err(FetchError::NotFound)
        }

        async fn get_candidate_exercises(&self, _: &str) -> Result<Vec<Exercise>, FetchError> {
            Ok(vec![
                exercise("ex-1", vec![challenge("c-1"), challenge("c-2")]),
                exercise("ex-2", vec![challenge("c-3")]),
            ])
        }

        async fn get_challenge(&self, _: &str, _: &str) -> Result<Vec<Step>, FetchError> {
            Ok(vec![step("s1")])
        }

        async fn load_progress(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<Option<StepProgress>, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn slow_step_times_out_instead_of_stalling() {
        let walker = ExerciseTreeWalker::new(
            Arc::new(StalledProgressBackend),
            1,
            Duration::from_millis(50),
        );

        let snapshot = walker
            .walk("tok", &[assigned("ex-1")], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(snapshot.failures.len(), 2);
        assert!(snapshot
            .failures
            .iter()
            .all(|f| f.level == FailureLevel::Step && f.message.contains("timed out")));
        assert_eq!(
            snapshot.exercises[0].challenges[0].steps[0].progress,
            StepProgress::default()
        );
    }

    #[tokio::test]
    async fn cancelling_mid_walk_aborts_without_a_snapshot() {
        let walker = ExerciseTreeWalker::new(
            Arc::new(StalledProgressBackend),
            2,
            Duration::from_secs(10),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            walker.walk("tok", &[assigned("ex-1"), assigned("ex-2")], &cancel),
        )
        .await
        .expect("walk should stop soon after cancellation");

        assert!(matches!(outcome, Err(FetchError::Cancelled)));
    }
}
