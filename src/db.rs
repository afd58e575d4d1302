use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{StoreError, ValidationError};
use crate::models::{
    AcademicYear, AttendanceEvent, AttendanceStatus, AttendanceType, StudentProfile,
};
use crate::store::{AttendanceStore, RosterFilter};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn fetch_academic_year_by_name(
    pool: &PgPool,
    year_name: &str,
) -> anyhow::Result<Option<AcademicYear>> {
    let row = sqlx::query(
        r#"
        SELECT id, year_name, start_date, end_date
        FROM attendance_early_warning.academic_years
        WHERE year_name = $1
        "#,
    )
    .bind(year_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| AcademicYear {
        id: row.get("id"),
        year_name: row.get("year_name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let academic_year = AcademicYear {
        id: Uuid::parse_str("7b1e8f0c-52a4-4c1e-9f0e-2d7f6f3c9a10")?,
        year_name: "2025-2026".to_string(),
        start_date: NaiveDate::from_ymd_opt(2025, 9, 1).context("invalid date")?,
        end_date: NaiveDate::from_ymd_opt(2026, 6, 30).context("invalid date")?,
    };

    sqlx::query(
        r#"
        INSERT INTO attendance_early_warning.academic_years (id, year_name, start_date, end_date)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (year_name) DO NOTHING
        "#,
    )
    .bind(academic_year.id)
    .bind(&academic_year.year_name)
    .bind(academic_year.start_date)
    .bind(academic_year.end_date)
    .execute(pool)
    .await?;

    let academic_year = fetch_academic_year_by_name(pool, &academic_year.year_name)
        .await?
        .context("seeded academic year is missing")?;

    // One character per school day: P present, A absent, L late.
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Aarav Mehta",
            "aarav.mehta",
            "Science",
            "Grade 10",
            "PPPPLPPPPPPAPPPPPPPP",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Sara Iqbal",
            "sara.iqbal",
            "Commerce",
            "Grade 11",
            "PAAPAPPAAPAPAAPLAPAP",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Daniel Osei",
            "daniel.osei",
            "Science",
            "Grade 10",
            "PPPPPPAAAAPPPPPPPPPP",
        ),
    ];

    for (id, name, username, course, year, pattern) in students {
        let student_id = upsert_student(pool, id, name, username, course, year).await?;

        let school_year = school_days(academic_year.start_date)
            .take_while(|date| *date <= academic_year.end_date);
        for (index, (date, code)) in school_year.zip(pattern.chars()).enumerate() {
            let status = match code {
                'A' => AttendanceStatus::Absent,
                'L' => AttendanceStatus::Late,
                _ => AttendanceStatus::Present,
            };
            let event = AttendanceEvent {
                student_id,
                date,
                status,
                subject: "Homeroom".to_string(),
                attendance_type: AttendanceType::Regular,
            };
            insert_attendance(
                pool,
                &event,
                Some(academic_year.id),
                &format!("seed-{username}-{index:03}"),
            )
            .await?;
        }

        let snapshot = AttendanceEvent {
            student_id,
            date: NaiveDate::from_ymd_opt(2026, 1, 15).context("invalid date")?,
            status: AttendanceStatus::Present,
            subject: "Half-yearly summary".to_string(),
            attendance_type: AttendanceType::HalfYearly,
        };
        insert_attendance(
            pool,
            &snapshot,
            Some(academic_year.id),
            &format!("seed-{username}-half-yearly"),
        )
        .await?;
    }

    Ok(())
}

fn school_days(start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..)
        .map(move |offset| start + Duration::days(offset))
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    username: &str,
    course: &str,
    year: &str,
) -> anyhow::Result<Uuid> {
    let student_id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_early_warning.students (id, full_name, username, course, year)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (username) DO UPDATE
        SET full_name = EXCLUDED.full_name, course = EXCLUDED.course, year = EXCLUDED.year
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(username)
    .bind(course)
    .bind(year)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(student_id)
}

async fn insert_attendance(
    pool: &PgPool,
    event: &AttendanceEvent,
    academic_year_id: Option<Uuid>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_early_warning.attendance
        (id, student_id, academic_year_id, session_date, status, subject, attendance_type, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(event.student_id)
    .bind(academic_year_id)
    .bind(event.date)
    .bind(event.status.as_str())
    .bind(&event.subject)
    .bind(event.attendance_type.as_str())
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Turns stored or imported text columns into a typed event.
fn event_from_columns(
    student_id: Uuid,
    date: NaiveDate,
    status: &str,
    subject: String,
    attendance_type: Option<&str>,
) -> Result<AttendanceEvent, ValidationError> {
    Ok(AttendanceEvent {
        student_id,
        date,
        status: status.parse()?,
        subject,
        attendance_type: AttendanceType::from_stored(attendance_type)?,
    })
}

#[derive(Debug, serde::Deserialize)]
struct ImportRow {
    full_name: String,
    username: String,
    course: String,
    year: String,
    academic_year: Option<String>,
    date: NaiveDate,
    status: String,
    subject: String,
    attendance_type: Option<String>,
    source_key: Option<String>,
}

impl ImportRow {
    /// The student id is filled in once the student row has been upserted.
    fn to_event(&self) -> Result<AttendanceEvent, ValidationError> {
        event_from_columns(
            Uuid::nil(),
            self.date,
            &self.status,
            self.subject.clone(),
            self.attendance_type.as_deref(),
        )
    }
}

/// Imports attendance rows. The whole file is validated before anything is written.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("line {line}: malformed row"))?;
        let event = row
            .to_event()
            .with_context(|| format!("line {line}: invalid attendance row"))?;
        rows.push((line, row, event));
    }

    let mut inserted = 0usize;
    for (line, row, mut event) in rows {
        let academic_year_id = match row.academic_year.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(
                fetch_academic_year_by_name(pool, name)
                    .await?
                    .with_context(|| format!("line {line}: unknown academic year {name:?}"))?
                    .id,
            ),
            _ => None,
        };

        event.student_id = upsert_student(
            pool,
            Uuid::new_v4(),
            &row.full_name,
            &row.username,
            &row.course,
            &row.year,
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_attendance(pool, &event, academic_year_id, &source_key).await? {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "attendance import finished");
    Ok(inserted)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> StudentProfile {
    StudentProfile {
        id: row.get("id"),
        name: row.get("full_name"),
        username: row.get("username"),
        course: row.get("course"),
        year: row.get("year"),
    }
}

#[async_trait]
impl AttendanceStore for PgStore {
    async fn list_students(&self, filter: &RosterFilter) -> Result<Vec<StudentProfile>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, full_name, username, course, year
            FROM attendance_early_warning.students
            WHERE ($1::uuid IS NULL OR id = $1)
              AND ($2::text IS NULL OR username = $2)
              AND ($3::text IS NULL OR course = $3)
            ORDER BY full_name
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.username.as_deref())
        .bind(filter.course.as_deref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(student_from_row).collect())
    }

    async fn fetch_student(&self, student_id: Uuid) -> Result<StudentProfile, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, username, course, year
            FROM attendance_early_warning.students
            WHERE id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::StudentNotFound(student_id))?;

        Ok(student_from_row(&row))
    }

    async fn fetch_events(
        &self,
        student_id: Uuid,
        academic_year: Option<Uuid>,
    ) -> Result<Vec<AttendanceEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT session_date, status, subject, attendance_type
            FROM attendance_early_warning.attendance
            WHERE student_id = $1
              AND ($2::uuid IS NULL OR academic_year_id = $2)
            ORDER BY session_date, created_at
            "#,
        )
        .bind(student_id)
        .bind(academic_year)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            let attendance_type: Option<String> = row.get("attendance_type");
            events.push(event_from_columns(
                student_id,
                row.get("session_date"),
                &status,
                row.get("subject"),
                attendance_type.as_deref(),
            )?);
        }

        tracing::debug!(%student_id, count = events.len(), "loaded attendance events");
        Ok(events)
    }
}
