//! Pure folds from raw step progress up to exercise and report level counters.

use std::collections::BTreeMap;

use crate::models::exercise::{Challenge, Exercise};
use crate::models::progress::{
    ChallengeProgressInfo, ExerciseProgressInfo, GlobalProgress, StepProgressEntry,
};
use crate::models::schedule::DetailedExerciseResult;
use crate::services::tree_walker::ProgressSnapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressAggregates {
    pub exercise_progress: BTreeMap<String, ExerciseProgressInfo>,
    /// Keyed by exercise id, then challenge id; challenge ids are only
    /// unique inside their exercise.
    pub challenge_progress: BTreeMap<String, BTreeMap<String, ChallengeProgressInfo>>,
    pub global: GlobalProgress,
}

/// Counters come from the backend unchecked, so folds saturate instead of
/// overflowing.
fn saturating_sum(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0, u32::saturating_add)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Rounded percentage, `0` when there is nothing to complete.
pub fn completion_rate(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let rate = (completed.min(total) as f64 / total as f64 * 100.0).round();
    (rate as u32).min(100)
}

pub fn reduce_challenge(
    exercise_id: &str,
    challenge: &Challenge,
    steps: &[StepProgressEntry],
) -> ChallengeProgressInfo {
    let total_steps = count(steps.len());
    let completed_steps = count(steps.iter().filter(|s| s.progress.is_completed).count());
    let total_tests = saturating_sum(steps.iter().map(|s| s.progress.tests_total));
    // Clamped per step so malformed counters cannot push passed above total.
    let passed_tests = saturating_sum(
        steps
            .iter()
            .map(|s| s.progress.tests_passed.min(s.progress.tests_total)),
    );

    ChallengeProgressInfo {
        challenge_id: challenge.id.clone(),
        exercise_id: exercise_id.to_string(),
        title: challenge.title.clone(),
        attempted: steps.iter().any(|s| s.progress.is_attempted()),
        completed: total_steps > 0 && completed_steps == total_steps,
        total_steps,
        completed_steps,
        total_tests,
        passed_tests,
        steps: steps.to_vec(),
    }
}

pub fn reduce_exercise(
    exercise: &Exercise,
    challenges: &[ChallengeProgressInfo],
) -> ExerciseProgressInfo {
    let total_challenges = count(challenges.len());
    let completed_challenges = count(challenges.iter().filter(|c| c.completed).count());
    let total_steps = saturating_sum(challenges.iter().map(|c| c.total_steps));
    let completed_steps = saturating_sum(challenges.iter().map(|c| c.completed_steps));

    ExerciseProgressInfo {
        exercise_id: exercise.id.clone(),
        title: exercise.title.clone(),
        attempted: challenges.iter().any(|c| c.attempted),
        completed: total_challenges > 0 && completed_challenges == total_challenges,
        completion_rate: completion_rate(completed_steps, total_steps),
        total_steps,
        completed_steps,
        total_challenges,
        completed_challenges,
        total_tests: saturating_sum(challenges.iter().map(|c| c.total_tests)),
        passed_tests: saturating_sum(challenges.iter().map(|c| c.passed_tests)),
    }
}

pub fn reduce_global(exercises: &[ExerciseProgressInfo], exercises_total: u32) -> GlobalProgress {
    let total_steps = saturating_sum(exercises.iter().map(|e| e.total_steps));
    let completed_steps = saturating_sum(exercises.iter().map(|e| e.completed_steps));

    GlobalProgress {
        total_steps,
        completed_steps,
        total_tests: saturating_sum(exercises.iter().map(|e| e.total_tests)),
        passed_tests: saturating_sum(exercises.iter().map(|e| e.passed_tests)),
        exercises_total,
        exercises_completed: count(exercises.iter().filter(|e| e.completed).count()),
        real_overall_score: completion_rate(completed_steps, total_steps),
    }
}

pub fn reduce_snapshot(snapshot: &ProgressSnapshot) -> ProgressAggregates {
    let mut aggregates = ProgressAggregates::default();
    let mut exercise_infos = Vec::with_capacity(snapshot.exercises.len());

    for exercise in &snapshot.exercises {
        let challenge_infos: Vec<ChallengeProgressInfo> = exercise
            .challenges
            .iter()
            .map(|c| reduce_challenge(&exercise.exercise.id, &c.challenge, &c.steps))
            .collect();

        let info = reduce_exercise(&exercise.exercise, &challenge_infos);
        let by_challenge = aggregates
            .challenge_progress
            .entry(info.exercise_id.clone())
            .or_default();
        for challenge in challenge_infos {
            by_challenge.insert(challenge.challenge_id.clone(), challenge);
        }
        aggregates
            .exercise_progress
            .insert(info.exercise_id.clone(), info.clone());
        exercise_infos.push(info);
    }

    aggregates.global = reduce_global(&exercise_infos, snapshot.assigned_exercises);
    aggregates
}

/// Report-level counters from the summaries the backend embeds, used when
/// no candidate token allows walking the progress tree.
pub fn reduce_embedded(results: &[DetailedExerciseResult]) -> GlobalProgress {
    let mut global = GlobalProgress {
        exercises_total: count(results.len()),
        ..Default::default()
    };

    for summary in results.iter().filter_map(|r| r.summary.as_ref()) {
        global.total_steps = global.total_steps.saturating_add(summary.total_steps);
        global.completed_steps = global
            .completed_steps
            .saturating_add(summary.completed_steps.min(summary.total_steps));
        global.total_tests = global.total_tests.saturating_add(summary.total_tests);
        global.passed_tests = global
            .passed_tests
            .saturating_add(summary.passed_tests.min(summary.total_tests));
        if summary.is_completed {
            global.exercises_completed = global.exercises_completed.saturating_add(1);
        }
    }

    global.real_overall_score = completion_rate(global.completed_steps, global.total_steps);
    global
}
