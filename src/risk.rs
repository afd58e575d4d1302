use uuid::Uuid;

use crate::attendance;
use crate::config::RiskConfig;
use crate::models::{AttendanceEvent, AttendanceSummary, RiskAssessment, RiskReason};

pub fn classify(summary: &AttendanceSummary, config: &RiskConfig) -> RiskAssessment {
    let mut risk_reasons = Vec::new();

    // No sessions in scope is not evidence of risk.
    if summary.total_sessions > 0 {
        if let Some(pct) = summary.attendance_percentage {
            if pct < config.low_attendance_threshold {
                risk_reasons.push(RiskReason::LowAttendance);
            }
        }

        if summary.max_consecutive_absences >= config.consecutive_absence_threshold {
            risk_reasons.push(RiskReason::ConsecutiveAbsences);
        }
    }

    RiskAssessment {
        student_id: summary.student_id,
        is_at_risk: !risk_reasons.is_empty(),
        risk_reasons,
        attendance_percentage: summary.attendance_percentage,
        max_consecutive_absences: summary.max_consecutive_absences,
    }
}

/// Regular-category filter, aggregation and classification in one step.
pub fn assess(student_id: Uuid, events: &[AttendanceEvent], config: &RiskConfig) -> RiskAssessment {
    let regular = attendance::regular_only(events);
    let summary = attendance::summarize(student_id, &regular, config);
    classify(&summary, config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

pub fn severity(attendance_percentage: u32, max_consecutive_absences: usize) -> Severity {
    if attendance_percentage < 50 || max_consecutive_absences >= 5 {
        Severity::Critical
    } else {
        Severity::Warning
    }
}
