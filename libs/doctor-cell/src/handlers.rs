use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::auth_context;

use crate::models::{CreateDoctorRequest, CreateWindowRequest, DoctorScheduleResponse, DoctorSearchQuery};
use crate::router::DoctorState;

/// Doctor directory, optionally filtered by specialty.
#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<DoctorState>>,
    Query(query): Query<DoctorSearchQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} searching doctors (specialty: {:?})", user.id, query.specialty);

    let doctors = state.directory.search(query.specialty.as_deref()).await?;

    Ok(Json(json!({
        "total": doctors.len(),
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<DoctorState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ctx = auth_context(&user)?;
    let doctor = state.directory.register(&ctx, request).await?;

    Ok((StatusCode::CREATED, Json(json!(doctor))))
}

/// Doctor with their weekly schedule.
#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = state.directory.profile(doctor_id).await?;
    Ok(Json(json!(profile)))
}

/// Weekly availability windows of a doctor.
#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} reading availability of doctor {}", user.id, doctor_id);

    let windows = state.directory.weekly_schedule(doctor_id).await?;

    Ok(Json(json!(DoctorScheduleResponse { doctor_id, windows })))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<DoctorState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ctx = auth_context(&user)?;
    let window = state.directory.add_window(&ctx, doctor_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(window))))
}
