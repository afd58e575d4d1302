use std::fmt::Write;

use chrono::NaiveDate;

use crate::config::RiskConfig;
use crate::models::{AtRiskStudent, RiskReason};
use crate::risk::{self, Severity};

pub fn count_by_reason(roster: &[AtRiskStudent]) -> Vec<(RiskReason, usize)> {
    [RiskReason::LowAttendance, RiskReason::ConsecutiveAbsences]
        .into_iter()
        .map(|reason| {
            let count = roster
                .iter()
                .filter(|student| student.risk_reasons.contains(&reason))
                .count();
            (reason, count)
        })
        .collect()
}

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    roster: &[AtRiskStudent],
    config: &RiskConfig,
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all students");

    let _ = writeln!(output, "# Attendance Early Warning Report");
    let _ = writeln!(output, "Generated for {} on {}", scope_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Thresholds");
    let _ = writeln!(
        output,
        "- Attendance below {}%",
        config.low_attendance_threshold
    );
    let _ = writeln!(
        output,
        "- {} or more consecutive absences ({} streaks)",
        config.consecutive_absence_threshold, config.streak_mode
    );
    let _ = writeln!(
        output,
        "- Late arrivals {} as present",
        if config.count_late_as_present {
            "count"
        } else {
            "do not count"
        }
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if roster.is_empty() {
        let _ = writeln!(output, "No students currently flagged as at risk.");
        return output;
    }

    for (reason, count) in count_by_reason(roster) {
        let _ = writeln!(output, "- {} ({}): {} students", reason.label(), reason, count);
    }
    let critical = roster
        .iter()
        .filter(|student| {
            risk::severity(student.attendance_percentage, student.max_consecutive_absences)
                == Severity::Critical
        })
        .count();
    let _ = writeln!(output, "- Critical: {} of {} flagged", critical, roster.len());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Flagged Students");

    for student in roster {
        let severity =
            risk::severity(student.attendance_percentage, student.max_consecutive_absences);
        let reasons: Vec<&str> = student.risk_reasons.iter().map(RiskReason::code).collect();
        let _ = writeln!(
            output,
            "- {} ({}, {} {}) attendance {}%, {} consecutive absences [{}] {}",
            student.name,
            student.username,
            student.course,
            student.year,
            student.attendance_percentage,
            student.max_consecutive_absences,
            severity.as_str(),
            reasons.join(", ")
        );
    }

    output
}
