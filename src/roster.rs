use futures::future::try_join_all;
use uuid::Uuid;

use crate::config::RiskConfig;
use crate::error::StoreError;
use crate::models::{AtRiskStudent, RiskSnapshot, StudentAttendanceView, StudentProfile};
use crate::risk;
use crate::store::{AttendanceStore, RosterFilter};

/// Flagged students in scope, lowest attendance first.
pub async fn at_risk_roster(
    store: &dyn AttendanceStore,
    filter: &RosterFilter,
    config: &RiskConfig,
) -> Result<Vec<AtRiskStudent>, StoreError> {
    let students = store.list_students(filter).await?;
    let scanned = students.len();

    let flagged = try_join_all(
        students
            .into_iter()
            .map(|student| assess_student(store, student, filter.academic_year, config)),
    )
    .await?;

    let mut roster: Vec<AtRiskStudent> = flagged.into_iter().flatten().collect();
    roster.sort_by(|a, b| {
        a.attendance_percentage
            .cmp(&b.attendance_percentage)
            .then(b.max_consecutive_absences.cmp(&a.max_consecutive_absences))
            .then_with(|| a.name.cmp(&b.name))
    });

    tracing::info!(scanned, flagged = roster.len(), "at-risk roster computed");
    Ok(roster)
}

async fn assess_student(
    store: &dyn AttendanceStore,
    student: StudentProfile,
    academic_year: Option<Uuid>,
    config: &RiskConfig,
) -> Result<Option<AtRiskStudent>, StoreError> {
    let events = store.fetch_events(student.id, academic_year).await?;
    let assessment = risk::assess(student.id, &events, config);

    if !assessment.is_at_risk {
        return Ok(None);
    }

    // A flagged student always has at least one regular session.
    let Some(attendance_percentage) = assessment.attendance_percentage else {
        return Ok(None);
    };

    Ok(Some(AtRiskStudent {
        id: student.id,
        name: student.name,
        username: student.username,
        course: student.course,
        year: student.year,
        attendance_percentage,
        max_consecutive_absences: assessment.max_consecutive_absences,
        risk_reasons: assessment.risk_reasons,
    }))
}

/// A student's own attendance log with the risk over its regular sessions.
pub async fn student_view(
    store: &dyn AttendanceStore,
    student_id: Uuid,
    academic_year: Option<Uuid>,
    config: &RiskConfig,
) -> Result<StudentAttendanceView, StoreError> {
    store.fetch_student(student_id).await?;
    let mut records = store.fetch_events(student_id, academic_year).await?;
    records.sort_by_key(|event| event.date);

    let assessment = risk::assess(student_id, &records, config);
    let risk = assessment
        .attendance_percentage
        .map(|attendance_percentage| RiskSnapshot {
            is_at_risk: assessment.is_at_risk,
            attendance_percentage,
            max_consecutive_absences: assessment.max_consecutive_absences,
            risk_reasons: assessment.risk_reasons.clone(),
        });

    Ok(StudentAttendanceView { records, risk })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceEvent, AttendanceStatus, AttendanceType, RiskReason};
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, NaiveDate};

    use AttendanceStatus::{Absent, Late, Present};

    fn student(name: &str, course: &str) -> StudentProfile {
        StudentProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: name.to_lowercase().replace(' ', "."),
            course: course.to_string(),
            year: "Grade 9".to_string(),
        }
    }

    fn record(
        store: &mut MemoryStore,
        student_id: Uuid,
        year: Uuid,
        statuses: &[AttendanceStatus],
    ) {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        for (day, status) in statuses.iter().enumerate() {
            store.add_event(
                Some(year),
                AttendanceEvent {
                    student_id,
                    date: start + Duration::days(day as i64),
                    status: *status,
                    subject: "Science".to_string(),
                    attendance_type: AttendanceType::Regular,
                },
            );
        }
    }

    struct Fixture {
        store: MemoryStore,
        year: Uuid,
        steady: StudentProfile,
        slipping: StudentProfile,
        streaky: StudentProfile,
        unrecorded: StudentProfile,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        let year = Uuid::new_v4();
        let steady = student("Nina Park", "Science");
        let slipping = student("Omar Haddad", "Arts");
        let streaky = student("Lena Fischer", "Science");
        let unrecorded = student("Yusuf Ali", "Science");

        record(&mut store, steady.id, year, &[Present; 8]);
        record(
            &mut store,
            slipping.id,
            year,
            &[Present, Absent, Absent, Present, Absent, Absent, Late, Present],
        );
        record(
            &mut store,
            streaky.id,
            year,
            &[Present, Present, Present, Absent, Absent, Absent, Present, Present, Present, Present],
        );

        for profile in [&steady, &slipping, &streaky, &unrecorded] {
            store.add_student(profile.clone());
        }

        Fixture {
            store,
            year,
            steady,
            slipping,
            streaky,
            unrecorded,
        }
    }

    #[tokio::test]
    async fn roster_contains_only_flagged_students() {
        let fx = fixture();
        let filter = RosterFilter {
            academic_year: Some(fx.year),
            ..RosterFilter::default()
        };
        let roster = at_risk_roster(&fx.store, &filter, &RiskConfig::default())
            .await
            .unwrap();

        let ids: Vec<Uuid> = roster.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![fx.slipping.id, fx.streaky.id]);
        assert!(!ids.contains(&fx.steady.id));
        assert!(!ids.contains(&fx.unrecorded.id));

        assert_eq!(roster[0].attendance_percentage, 38);
        assert_eq!(roster[0].risk_reasons, vec![RiskReason::LowAttendance]);
        assert_eq!(roster[1].attendance_percentage, 70);
        assert_eq!(
            roster[1].risk_reasons,
            vec![RiskReason::LowAttendance, RiskReason::ConsecutiveAbsences]
        );
    }

    #[tokio::test]
    async fn roster_honours_course_filter() {
        let fx = fixture();
        let filter = RosterFilter {
            course: Some("Science".to_string()),
            ..RosterFilter::default()
        };
        let roster = at_risk_roster(&fx.store, &filter, &RiskConfig::default())
            .await
            .unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, fx.streaky.id);
    }

    #[tokio::test]
    async fn other_academic_year_yields_empty_roster() {
        let fx = fixture();
        let filter = RosterFilter {
            academic_year: Some(Uuid::new_v4()),
            ..RosterFilter::default()
        };
        let roster = at_risk_roster(&fx.store, &filter, &RiskConfig::default())
            .await
            .unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn student_view_includes_all_categories() {
        let mut fx = fixture();
        fx.store.add_event(
            Some(fx.year),
            AttendanceEvent {
                student_id: fx.steady.id,
                date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                status: Absent,
                subject: "Final review".to_string(),
                attendance_type: AttendanceType::Final,
            },
        );

        let view = student_view(&fx.store, fx.steady.id, Some(fx.year), &RiskConfig::default())
            .await
            .unwrap();
        assert_eq!(view.records.len(), 9);
        assert_eq!(view.records[0].attendance_type, AttendanceType::Final);

        let risk = view.risk.unwrap();
        assert!(!risk.is_at_risk);
        assert_eq!(risk.attendance_percentage, 100);
    }

    #[tokio::test]
    async fn student_without_records_has_no_risk() {
        let fx = fixture();
        let view = student_view(&fx.store, fx.unrecorded.id, None, &RiskConfig::default())
            .await
            .unwrap();
        assert!(view.records.is_empty());
        assert!(view.risk.is_none());
    }

    #[tokio::test]
    async fn unknown_student_is_an_error() {
        let fx = fixture();
        let result = student_view(&fx.store, Uuid::new_v4(), None, &RiskConfig::default()).await;
        assert!(matches!(result, Err(StoreError::StudentNotFound(_))));
    }
}
