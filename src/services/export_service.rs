use chrono::{DateTime, Utc};
use rust_xlsxwriter::*;

use crate::dto::report_dto::{
    AggregationSource, CodingReport, ReportMetadata, ReportSummary,
};
use crate::error::Result;
use crate::services::progress_reducer::{completion_rate, ProgressAggregates};
use crate::services::results_service::FetchedResults;
use crate::services::tree_walker::PartialFailure;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct ExportService;

impl ExportService {
    /// `coding-results-<candidate>-<YYYY-MM-DD>.<ext>`, with whitespace runs
    /// collapsed to `-` and anything unsafe for a header dropped.
    pub fn report_filename(candidate_name: &str, generated_at: DateTime<Utc>, extension: &str) -> String {
        let candidate = candidate_name
            .split_whitespace()
            .map(|part| {
                part.chars()
                    .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
                    .collect::<String>()
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let candidate = if candidate.is_empty() {
            "candidate".to_string()
        } else {
            candidate
        };

        format!(
            "coding-results-{}-{}.{}",
            candidate,
            generated_at.format("%Y-%m-%d"),
            extension
        )
    }

    pub fn build_report(
        fetched: FetchedResults,
        aggregates: ProgressAggregates,
        partial_failures: Vec<PartialFailure>,
        aggregation: AggregationSource,
        generated_at: DateTime<Utc>,
    ) -> CodingReport {
        let FetchedResults { results, raw } = fetched;
        let global = &aggregates.global;
        let metadata = ReportMetadata {
            report_id: uuid::Uuid::new_v4(),
            generated_at,
            schedule_id: results.id.clone(),
            candidate_name: results.candidate_name.clone(),
            position: results.position.clone(),
            interview_date: results.interview.as_ref().and_then(|i| i.scheduled_at),
        };
        let summary = ReportSummary {
            overall_score: global.real_overall_score,
            exercises_completed: global.exercises_completed,
            exercises_total: global.exercises_total,
            steps_completed: global.completed_steps,
            steps_total: global.total_steps,
            tests_passed: global.passed_tests,
            tests_total: global.total_tests,
            time_limit_minutes: results.time_limit_minutes,
            session_status: results.status.as_str().to_string(),
            aggregation,
        };

        CodingReport {
            metadata,
            summary,
            exercise_progress: aggregates.exercise_progress,
            challenge_progress: aggregates.challenge_progress,
            partial_failures,
            assigned_exercises: results.detailed_results,
            raw_results: raw,
        }
    }

    pub fn to_json(report: &CodingReport) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(report)?)
    }

    /// One row per assigned exercise followed by a totals row.
    pub fn generate_report_xlsx(report: &CodingReport) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Coding results")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);
        let rate_high = Color::RGB(0x10B981);
        let rate_mid = Color::RGB(0xF59E0B);
        let rate_low = Color::RGB(0xEF4444);

        let columns = [
            ("#", 6.0),
            ("Exercise", 34.0),
            ("Language", 14.0),
            ("Difficulty", 14.0),
            ("Challenges", 14.0),
            ("Steps", 12.0),
            ("Tests", 12.0),
            ("Completion (%)", 16.0),
            ("Status", 16.0),
        ];
        let last_col = (columns.len() - 1) as u16;

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(0, 36)?;
        let title = format!("Coding results: {}", report.metadata.candidate_name);
        worksheet.merge_range(0, 0, 0, last_col, &title, &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);
        worksheet.set_row_height(1, 22)?;
        let subtitle = format!(
            "{}  •  Score: {}%  •  Status: {}  •  Generated: {}",
            report.metadata.position.as_deref().unwrap_or("—"),
            report.summary.overall_score,
            report.summary.session_status,
            report.metadata.generated_at.format("%d.%m.%Y %H:%M UTC"),
        );
        worksheet.merge_range(1, 0, 1, last_col, &subtitle, &subtitle_format)?;

        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(Color::White)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        let header_row = 2;
        worksheet.set_row_height(header_row, 26)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        let data_start_row = 3;
        let assigned = &report.assigned_exercises;
        for (idx, result) in assigned.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };
            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);

            let exercise = &result.exercise;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &exercise.title, &base_fmt.clone().set_bold())?;
            worksheet.write_string_with_format(
                row,
                2,
                exercise.language.as_deref().unwrap_or("—"),
                &center_fmt,
            )?;
            worksheet.write_string_with_format(row, 3, exercise.difficulty.as_str(), &center_fmt)?;

            // Walked aggregates win over the backend's embedded counters.
            let (challenges, steps, tests, rate, completed) =
                match report.exercise_progress.get(&exercise.id) {
                    Some(info) => (
                        format!("{}/{}", info.completed_challenges, info.total_challenges),
                        format!("{}/{}", info.completed_steps, info.total_steps),
                        format!("{}/{}", info.passed_tests, info.total_tests),
                        Some(info.completion_rate),
                        info.completed,
                    ),
                    None => match &result.summary {
                        Some(summary) => (
                            "—".to_string(),
                            format!("{}/{}", summary.completed_steps, summary.total_steps),
                            format!("{}/{}", summary.passed_tests, summary.total_tests),
                            Some(completion_rate(summary.completed_steps, summary.total_steps)),
                            summary.is_completed,
                        ),
                        None => ("—".to_string(), "—".to_string(), "—".to_string(), None, false),
                    },
                };

            worksheet.write_string_with_format(row, 4, &challenges, &center_fmt)?;
            worksheet.write_string_with_format(row, 5, &steps, &center_fmt)?;
            worksheet.write_string_with_format(row, 6, &tests, &center_fmt)?;

            match rate {
                Some(rate) => {
                    let color = if rate >= 70 {
                        rate_high
                    } else if rate >= 40 {
                        rate_mid
                    } else {
                        rate_low
                    };
                    let rate_fmt = center_fmt.clone().set_bold().set_font_color(color);
                    worksheet.write_number_with_format(row, 7, rate as f64, &rate_fmt)?;
                }
                None => {
                    worksheet.write_string_with_format(row, 7, "—", &center_fmt)?;
                }
            }

            let status = if completed { "Completed" } else { "Incomplete" };
            worksheet.write_string_with_format(row, 8, status, &center_fmt)?;
        }

        let total_row = data_start_row + assigned.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);
        worksheet.set_row_height(total_row, 24)?;

        let summary = &report.summary;
        worksheet.merge_range(
            total_row,
            0,
            total_row,
            3,
            &format!(
                "Total: {}/{} exercises completed",
                summary.exercises_completed, summary.exercises_total
            ),
            &summary_fmt,
        )?;
        worksheet.write_string_with_format(total_row, 4, "", &summary_fmt)?;
        worksheet.write_string_with_format(
            total_row,
            5,
            &format!("{}/{}", summary.steps_completed, summary.steps_total),
            &summary_fmt,
        )?;
        worksheet.write_string_with_format(
            total_row,
            6,
            &format!("{}/{}", summary.tests_passed, summary.tests_total),
            &summary_fmt,
        )?;
        worksheet.write_number_with_format(total_row, 7, summary.overall_score as f64, &summary_fmt)?;
        let time_limit = summary
            .time_limit_minutes
            .map(|m| format!("{} min", m))
            .unwrap_or_else(|| "—".to_string());
        worksheet.write_string_with_format(total_row, 8, &time_limit, &summary_fmt)?;

        worksheet.set_freeze_panes(3, 0)?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}
