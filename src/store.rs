use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AttendanceEvent, StudentProfile};

/// Students in scope for a roster query. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterFilter {
    pub student_id: Option<Uuid>,
    pub username: Option<String>,
    pub course: Option<String>,
    pub academic_year: Option<Uuid>,
}

/// Data-access collaborator supplying students and their raw attendance.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn list_students(&self, filter: &RosterFilter) -> Result<Vec<StudentProfile>, StoreError>;

    async fn fetch_student(&self, student_id: Uuid) -> Result<StudentProfile, StoreError>;

    /// All categories for the student, optionally limited to one academic year.
    async fn fetch_events(
        &self,
        student_id: Uuid,
        academic_year: Option<Uuid>,
    ) -> Result<Vec<AttendanceEvent>, StoreError>;
}
