use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::RiskConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{AtRiskStudent, StudentAttendanceView};
use crate::roster;
use crate::store::{AttendanceStore, RosterFilter};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AttendanceStore>,
    pub config: RiskConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/admin/at-risk", get(at_risk_students))
        .route("/student/attendance", get(student_attendance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to install shutdown signal handler");
            }
        })
        .await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtRiskQuery {
    pub student_id: Option<String>,
    pub course: Option<String>,
    pub academic_year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceQuery {
    pub student_id: Option<String>,
    pub academic_year: Option<String>,
}

/// Blank values and the dashboard's `All` option do not filter.
fn filter_value(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

fn filter_id(raw: Option<String>, name: &str) -> ApiResult<Option<Uuid>> {
    filter_value(raw)
        .map(|value| {
            Uuid::parse_str(&value)
                .map_err(|_| ApiError::BadRequest(format!("{name} must be a UUID, got {value:?}")))
        })
        .transpose()
}

/// The admin search box sends either the student's id or their username.
fn student_lookup(raw: Option<String>) -> (Option<Uuid>, Option<String>) {
    match filter_value(raw) {
        Some(value) => match Uuid::parse_str(&value) {
            Ok(id) => (Some(id), None),
            Err(_) => (None, Some(value)),
        },
        None => (None, None),
    }
}

async fn at_risk_students(
    State(state): State<AppState>,
    Query(query): Query<AtRiskQuery>,
) -> ApiResult<Json<Vec<AtRiskStudent>>> {
    let (student_id, username) = student_lookup(query.student_id);
    let filter = RosterFilter {
        student_id,
        username,
        course: filter_value(query.course),
        academic_year: filter_id(query.academic_year, "academicYear")?,
    };

    let roster = roster::at_risk_roster(state.store.as_ref(), &filter, &state.config).await?;
    Ok(Json(roster))
}

async fn student_attendance(
    State(state): State<AppState>,
    Query(query): Query<StudentAttendanceQuery>,
) -> ApiResult<Json<StudentAttendanceView>> {
    let student_id = filter_id(query.student_id, "studentId")?
        .ok_or_else(|| ApiError::BadRequest("studentId is required".to_string()))?;
    let academic_year = filter_id(query.academic_year, "academicYear")?;

    let view =
        roster::student_view(state.store.as_ref(), student_id, academic_year, &state.config)
            .await?;
    Ok(Json(view))
}
