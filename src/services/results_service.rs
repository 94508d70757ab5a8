use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::dto::report_dto::{AggregationSource, CodingReport, RawResults};
use crate::error::Result;
use crate::models::schedule::ScheduleResult;
use crate::services::backend_client::ResultsBackend;
use crate::services::export_service::ExportService;
use crate::services::progress_reducer::{reduce_embedded, reduce_snapshot, ProgressAggregates};
use crate::services::tree_walker::ExerciseTreeWalker;

/// Decoded schedule with the effective exercise list, plus both backend
/// documents as received.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResults {
    pub results: ScheduleResult,
    pub raw: RawResults,
}

#[derive(Clone)]
pub struct ResultsService {
    backend: Arc<dyn ResultsBackend>,
    walker: ExerciseTreeWalker,
}

impl ResultsService {
    pub fn new(backend: Arc<dyn ResultsBackend>, walk_concurrency: usize, request_timeout: Duration) -> Self {
        let walker = ExerciseTreeWalker::new(backend.clone(), walk_concurrency, request_timeout);
        Self { backend, walker }
    }

    /// Schedule plus its assigned exercises. Any failure here is fatal for
    /// the request.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_results(
        &self,
        schedule_id: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedResults> {
        let schedule = self
            .walker
            .guarded(cancel, self.backend.get_schedule(schedule_id))
            .await?;

        let base = self
            .walker
            .guarded(
                cancel,
                self.backend.get_candidate_exercise_results(schedule_id),
            )
            .await?;

        let mut results = schedule.data;
        if !base.data.detailed_results.is_empty() {
            results.detailed_results = base.data.detailed_results;
        }

        Ok(FetchedResults {
            results,
            raw: RawResults {
                schedule: schedule.raw,
                exercise_results: base.raw,
            },
        })
    }

    #[instrument(skip(self, candidate_token, cancel), fields(with_token = candidate_token.is_some()))]
    pub async fn build_report(
        &self,
        schedule_id: &str,
        candidate_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<CodingReport> {
        let fetched = self.fetch_results(schedule_id, cancel).await?;
        let assigned = &fetched.results.detailed_results;

        let (aggregates, failures, source) = match candidate_token {
            Some(token) => {
                let snapshot = self.walker.walk(token, assigned, cancel).await?;
                if !snapshot.failures.is_empty() {
                    warn!(
                        failures = snapshot.failures.len(),
                        "Coding report built from partial progress data"
                    );
                }
                let aggregates = reduce_snapshot(&snapshot);
                (aggregates, snapshot.failures, AggregationSource::Full)
            }
            None => {
                info!("No candidate token supplied, falling back to embedded summaries");
                let aggregates = ProgressAggregates {
                    global: reduce_embedded(assigned),
                    ..Default::default()
                };
                (aggregates, Vec::new(), AggregationSource::Embedded)
            }
        };

        info!(
            score = aggregates.global.real_overall_score,
            steps_total = aggregates.global.total_steps,
            "Coding report ready"
        );

        Ok(ExportService::build_report(
            fetched,
            aggregates,
            failures,
            source,
            chrono::Utc::now(),
        ))
    }
}
