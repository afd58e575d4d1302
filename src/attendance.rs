use uuid::Uuid;

use crate::config::{RiskConfig, StreakMode};
use crate::models::{AttendanceEvent, AttendanceStatus, AttendanceSummary, AttendanceType};

pub fn regular_only(events: &[AttendanceEvent]) -> Vec<AttendanceEvent> {
    events
        .iter()
        .filter(|event| event.attendance_type == AttendanceType::Regular)
        .cloned()
        .collect()
}

/// Reduces one student's events for a period to summary statistics.
///
/// Input order does not matter: events are stably sorted by date first, so
/// same-date sessions keep the order they were supplied in.
pub fn summarize(
    student_id: Uuid,
    events: &[AttendanceEvent],
    config: &RiskConfig,
) -> AttendanceSummary {
    let mut sorted: Vec<&AttendanceEvent> = events.iter().collect();
    sorted.sort_by_key(|event| event.date);

    let total_sessions = sorted.len();
    let present_count = sorted
        .iter()
        .filter(|event| counts_as_present(event.status, config))
        .count();

    let max_consecutive_absences = match config.streak_mode {
        StreakMode::Session => session_streak(&sorted),
        StreakMode::Day => day_streak(&sorted),
    };

    AttendanceSummary {
        student_id,
        total_sessions,
        present_count,
        attendance_percentage: attendance_percentage(present_count, total_sessions),
        max_consecutive_absences,
    }
}

fn counts_as_present(status: AttendanceStatus, config: &RiskConfig) -> bool {
    match status {
        AttendanceStatus::Present => true,
        AttendanceStatus::Late => config.count_late_as_present,
        AttendanceStatus::Absent => false,
    }
}

/// Integer percentage rounded half-up, `None` when there is nothing to divide.
pub fn attendance_percentage(present: usize, total: usize) -> Option<u32> {
    if total == 0 {
        return None;
    }
    let rounded = (200 * present + total) / (2 * total);
    Some(rounded as u32)
}

fn session_streak(sorted: &[&AttendanceEvent]) -> usize {
    let mut current = 0usize;
    let mut longest = 0usize;

    for event in sorted {
        if event.status == AttendanceStatus::Absent {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    longest
}

fn day_streak(sorted: &[&AttendanceEvent]) -> usize {
    let mut current = 0usize;
    let mut longest = 0usize;

    for day in sorted.chunk_by(|a, b| a.date == b.date) {
        if day.iter().all(|event| event.status == AttendanceStatus::Absent) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    longest
}
