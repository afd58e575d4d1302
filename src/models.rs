use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            _ => Err(ValidationError::UnknownStatus(value.to_string())),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance category. Only `Regular` sessions feed the risk computation;
/// the periodic snapshots are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum AttendanceType {
    #[default]
    Regular,
    #[serde(rename = "Half-yearly")]
    HalfYearly,
    Final,
}

impl AttendanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceType::Regular => "Regular",
            AttendanceType::HalfYearly => "Half-yearly",
            AttendanceType::Final => "Final",
        }
    }

    /// Stored categories may be missing; those rows are regular sessions.
    pub fn from_stored(value: Option<&str>) -> Result<Self, ValidationError> {
        value.map_or(Ok(AttendanceType::Regular), str::parse::<AttendanceType>)
    }
}

impl FromStr for AttendanceType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("regular") {
            Ok(AttendanceType::Regular)
        } else if trimmed.eq_ignore_ascii_case("half-yearly") {
            Ok(AttendanceType::HalfYearly)
        } else if trimmed.eq_ignore_ascii_case("final") {
            Ok(AttendanceType::Final)
        } else {
            Err(ValidationError::UnknownCategory(value.to_string()))
        }
    }
}

impl TryFrom<String> for AttendanceType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AttendanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named school year; attendance rows may be tagged with one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: Uuid,
    pub year_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub attendance_type: AttendanceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub student_id: Uuid,
    pub total_sessions: usize,
    pub present_count: usize,
    pub attendance_percentage: Option<u32>,
    pub max_consecutive_absences: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskReason {
    LowAttendance,
    ConsecutiveAbsences,
}

impl RiskReason {
    pub fn code(&self) -> &'static str {
        match self {
            RiskReason::LowAttendance => "LOW_ATTENDANCE",
            RiskReason::ConsecutiveAbsences => "CONSECUTIVE_ABSENCES",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskReason::LowAttendance => "Attendance below threshold",
            RiskReason::ConsecutiveAbsences => "Consecutive absence streak",
        }
    }
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub student_id: Uuid,
    pub is_at_risk: bool,
    pub risk_reasons: Vec<RiskReason>,
    pub attendance_percentage: Option<u32>,
    pub max_consecutive_absences: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub course: String,
    pub year: String,
}

/// Row of the admin at-risk roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskStudent {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub course: String,
    pub year: String,
    pub attendance_percentage: u32,
    pub max_consecutive_absences: usize,
    pub risk_reasons: Vec<RiskReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSnapshot {
    pub is_at_risk: bool,
    pub attendance_percentage: u32,
    pub max_consecutive_absences: usize,
    pub risk_reasons: Vec<RiskReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentAttendanceView {
    pub records: Vec<AttendanceEvent>,
    pub risk: Option<RiskSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Absent".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Absent));
        assert_eq!(" late ".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Late));
        assert_eq!(
            "excused".parse::<AttendanceStatus>(),
            Err(ValidationError::UnknownStatus("excused".to_string()))
        );
    }

    #[test]
    fn blank_or_missing_category_is_regular() {
        assert_eq!("  ".parse::<AttendanceType>(), Ok(AttendanceType::Regular));
        assert_eq!(AttendanceType::from_stored(None), Ok(AttendanceType::Regular));
        assert_eq!(
            AttendanceType::from_stored(Some("Half-yearly")),
            Ok(AttendanceType::HalfYearly)
        );
        assert!("Weekly".parse::<AttendanceType>().is_err());
    }

    #[test]
    fn event_json_uses_wire_names() {
        let event = AttendanceEvent {
            student_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            status: AttendanceStatus::Late,
            subject: "Physics".to_string(),
            attendance_type: AttendanceType::HalfYearly,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "late");
        assert_eq!(json["attendanceType"], "Half-yearly");
        assert_eq!(json["date"], "2025-09-01");

        let parsed: AttendanceEvent = serde_json::from_value(serde_json::json!({
            "studentId": Uuid::nil(),
            "date": "2025-09-02",
            "status": "absent",
            "attendanceType": ""
        }))
        .unwrap();
        assert_eq!(parsed.attendance_type, AttendanceType::Regular);
        assert_eq!(parsed.subject, "");
    }

    #[test]
    fn roster_row_serializes_underscore_id() {
        let row = AtRiskStudent {
            id: Uuid::nil(),
            name: "Mira Shah".to_string(),
            username: "mira.shah".to_string(),
            course: "Science".to_string(),
            year: "Grade 10".to_string(),
            attendance_percentage: 60,
            max_consecutive_absences: 4,
            risk_reasons: vec![RiskReason::LowAttendance, RiskReason::ConsecutiveAbsences],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["_id"], Uuid::nil().to_string());
        assert_eq!(json["maxConsecutiveAbsences"], 4);
        assert_eq!(
            json["riskReasons"],
            serde_json::json!(["LOW_ATTENDANCE", "CONSECUTIVE_ABSENCES"])
        );
    }

    #[test]
    fn academic_year_json_uses_wire_names() {
        let year = AcademicYear {
            id: Uuid::nil(),
            year_name: "2025-2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        };
        let json = serde_json::to_value(&year).unwrap();
        assert_eq!(json["id"], Uuid::nil().to_string());
        assert_eq!(json["yearName"], "2025-2026");
        assert_eq!(json["startDate"], "2025-09-01");
        assert_eq!(json["endDate"], "2026-06-30");
    }
}
