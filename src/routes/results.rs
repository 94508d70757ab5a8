use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::dto::report_dto::{CandidateToken, CodingReport, ExportFormat, ResultsQuery};
use crate::error::{Error, Result};
use crate::services::export_service::{ExportService, JSON_CONTENT_TYPE, XLSX_CONTENT_TYPE};
use crate::AppState;

pub const CANDIDATE_TOKEN_HEADER: &str = "x-candidate-token";
pub const PARTIAL_FAILURES_HEADER: &str = "x-partial-failures";

/// Header wins over the query string; blank values count as absent.
fn candidate_token(headers: &HeaderMap, query: &ResultsQuery) -> Result<Option<String>> {
    let from_header = match headers.get(CANDIDATE_TOKEN_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| Error::BadRequest("Invalid candidate token header".to_string()))?
                .to_string(),
        ),
        None => None,
    };

    let token = from_header
        .or_else(|| query.candidate_token.clone())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match token {
        Some(value) => {
            let token = CandidateToken { value };
            token.validate()?;
            Ok(Some(token.value))
        }
        None => Ok(None),
    }
}

async fn build_report(
    state: &AppState,
    schedule_id: &str,
    headers: &HeaderMap,
    query: &ResultsQuery,
) -> Result<CodingReport> {
    if schedule_id.trim().is_empty() {
        return Err(Error::BadRequest("Schedule id is required".to_string()));
    }
    let token = candidate_token(headers, query)?;

    // Dropping the handler (client gone) or shutting down cancels the walk.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    state
        .results_service
        .build_report(schedule_id, token.as_deref(), &cancel)
        .await
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ResultsQuery>,
) -> Result<impl IntoResponse> {
    let report = build_report(&state, &schedule_id, &headers, &query).await?;
    Ok(Json(report))
}

/// Serve the report as a file download.
pub async fn export_results(
    State(state): State<AppState>,
    Path(schedule_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ResultsQuery>,
) -> Result<impl IntoResponse> {
    let report = build_report(&state, &schedule_id, &headers, &query).await?;

    let (content_type, extension, buffer) = match query.format {
        ExportFormat::Json => (JSON_CONTENT_TYPE, "json", ExportService::to_json(&report)?),
        ExportFormat::Xlsx => (
            XLSX_CONTENT_TYPE,
            "xlsx",
            ExportService::generate_report_xlsx(&report)?,
        ),
    };

    let filename = ExportService::report_filename(
        &report.metadata.candidate_name,
        report.metadata.generated_at,
        extension,
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (
                HeaderName::from_static(PARTIAL_FAILURES_HEADER),
                report.partial_failures.len().to_string(),
            ),
        ],
        buffer,
    ))
}
