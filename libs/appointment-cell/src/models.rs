// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::CandidateSlot;
use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Status as seen at `now`: an active appointment whose end has passed reads as completed.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AppointmentStatus {
        if self.status.blocks_schedule() && self.end_time <= now {
            AppointmentStatus::Completed
        } else {
            self.status
        }
    }

    /// Whether this appointment currently holds its interval on the doctor's calendar.
    pub fn blocks_schedule(&self) -> bool {
        self.status.blocks_schedule()
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        shared_utils::interval::intervals_overlap(self.start_time, self.end_time, start, end)
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.doctor_id == user_id || self.patient_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Requested,
    Confirmed,
    Declined,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Statuses that take part in conflict detection.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Requested, AppointmentStatus::Confirmed];

    pub fn blocks_schedule(&self) -> bool {
        matches!(self, AppointmentStatus::Requested | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.blocks_schedule()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "REQUESTED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::Declined => write!(f, "DECLINED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Status change requested by a participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    Confirm,
    Decline,
    Cancel,
}

impl StatusAction {
    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            StatusAction::Confirm => AppointmentStatus::Confirmed,
            StatusAction::Decline => AppointmentStatus::Declined,
            StatusAction::Cancel => AppointmentStatus::Cancelled,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Reschedule and/or notes edit. Omitted times keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    pub fn changes_times(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub action: StatusAction,
}

/// Single write applied by the store for a reschedule and/or notes edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentChanges {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AppointmentChanges {
    /// A time change only applies to an appointment that still blocks the schedule.
    pub fn moves_times(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

/// Filter for appointment listings. Empty `statuses` means any status.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub statuses: Vec<AppointmentStatus>,
    pub starts_from: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
}

impl AppointmentQuery {
    pub fn for_doctor(doctor_id: Uuid) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::default()
        }
    }

    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&appointment.status))
            && self.starts_from.map_or(true, |from| appointment.start_time >= from)
            && self.starts_before.map_or(true, |before| appointment.start_time < before)
    }
}

// ==============================================================================
// CONFLICT DETECTION / AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_minutes: i64,
    pub slots: Vec<CandidateSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityCheckResponse {
    pub available: bool,
    pub within_schedule: bool,
    pub has_conflict: bool,
}

// ==============================================================================
// LIFECYCLE EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEventKind {
    AppointmentRequested,
    AppointmentConfirmed,
    AppointmentDeclined,
    AppointmentCancelled,
    AppointmentRescheduled,
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEventKind::AppointmentRequested => write!(f, "APPOINTMENT_REQUESTED"),
            LifecycleEventKind::AppointmentConfirmed => write!(f, "APPOINTMENT_CONFIRMED"),
            LifecycleEventKind::AppointmentDeclined => write!(f, "APPOINTMENT_DECLINED"),
            LifecycleEventKind::AppointmentCancelled => write!(f, "APPOINTMENT_CANCELLED"),
            LifecycleEventKind::AppointmentRescheduled => write!(f, "APPOINTMENT_RESCHEDULED"),
        }
    }
}

/// Notification-worthy fact emitted after a committed lifecycle write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub recipient_user_id: Uuid,
    pub kind: LifecycleEventKind,
    pub appointment_id: Uuid,
    /// When the appointment takes place.
    pub occurs_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("The selected time is not available")]
    SlotUnavailable,

    #[error("The selected time conflicts with another appointment")]
    ScheduleConflict,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Invalid appointment time: {0}")]
    InvalidInterval(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppointmentError::NotFound(what),
            other => AppointmentError::StoreFailure(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::SlotUnavailable | AppointmentError::ScheduleConflict => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidInterval(msg) => AppError::BadRequest(msg),
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::StoreFailure(msg) => AppError::Internal(msg),
        }
    }
}
