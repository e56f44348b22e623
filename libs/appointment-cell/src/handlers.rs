// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::auth_context;

use crate::models::{
    Appointment, BookableSlotsResponse, CreateAppointmentRequest, SetStatusRequest, UpdateAppointmentRequest,
};
use crate::router::AppointmentState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityCheckQuery {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub upcoming: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TodayQuery {
    pub date: Option<NaiveDate>,
}

/// Appointment with its status as of now.
fn appointment_json(appointment: &Appointment) -> Value {
    let now = Utc::now();
    let mut value = json!(appointment);
    value["status"] = json!(appointment.effective_status(now));
    value
}

fn appointments_json(appointments: &[Appointment]) -> Value {
    json!({
        "appointments": appointments.iter().map(appointment_json).collect::<Vec<_>>(),
        "total": appointments.len(),
    })
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_bookable_slots(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<SlotsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} requesting slots of doctor {} on {}", user.id, query.doctor_id, query.date);

    let slots = state
        .projector
        .bookable_slots(query.doctor_id, query.date, Utc::now())
        .await?;

    Ok(Json(json!(BookableSlotsResponse {
        doctor_id: query.doctor_id,
        date: query.date,
        slot_minutes: state.projector.slot_minutes(),
        slots,
    })))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<AvailabilityCheckQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let result = state
        .projector
        .check_availability(query.doctor_id, query.start_time, query.end_time)
        .await?;

    Ok(Json(json!(result)))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let ctx = auth_context(&user)?;
    let appointment = state.booking.create_appointment(&ctx, request).await?;

    Ok((StatusCode::CREATED, Json(appointment_json(&appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let appointment = state.booking.get_appointment(&ctx, appointment_id).await?;

    Ok(Json(appointment_json(&appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let appointment = state.booking.update_appointment(&ctx, appointment_id, request).await?;

    Ok(Json(appointment_json(&appointment)))
}

#[axum::debug_handler]
pub async fn set_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let appointment = state.booking.set_status(&ctx, appointment_id, request.action).await?;

    Ok(Json(appointment_json(&appointment)))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let appointments = if query.upcoming {
        state.booking.upcoming_patient_appointments(&ctx, patient_id).await?
    } else {
        state.booking.patient_appointments(&ctx, patient_id).await?
    };

    Ok(Json(appointments_json(&appointments)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let appointments = if query.upcoming {
        state.booking.upcoming_doctor_appointments(&ctx, doctor_id).await?
    } else {
        state.booking.doctor_appointments(&ctx, doctor_id).await?
    };

    Ok(Json(appointments_json(&appointments)))
}

#[axum::debug_handler]
pub async fn get_todays_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<TodayQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let ctx = auth_context(&user)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let appointments = state.booking.todays_doctor_appointments(&ctx, doctor_id, date).await?;

    Ok(Json(appointments_json(&appointments)))
}
