// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::AuthContext;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, LifecycleEvent, LifecycleEventKind, StatusAction,
};

/// Appointment state machine and the rules around it.
///
/// ```text
/// REQUESTED ──confirm──▶ CONFIRMED
///     │  └──decline──▶ DECLINED
///     └──────┴──cancel──▶ CANCELLED   (only before start)
/// ```
/// COMPLETED is never written; it is read off `Appointment::effective_status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Requested => &[
                AppointmentStatus::Confirmed,
                AppointmentStatus::Declined,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => &[AppointmentStatus::Cancelled],
            // Terminal states
            AppointmentStatus::Declined | AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
        }
    }

    pub fn validate_status_transition(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        let current = appointment.effective_status(now);
        debug!("Validating status transition from {} to {}", current, new_status);

        if !self.valid_transitions(current).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current,
                to: new_status,
            });
        }

        if new_status == AppointmentStatus::Cancelled && appointment.start_time <= now {
            warn!("Appointment {} has already started and can no longer be cancelled", appointment.id);
            return Err(AppointmentError::InvalidTransition {
                from: current,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Rescheduling is only possible for an active appointment that has not started.
    pub fn validate_reschedule(&self, appointment: &Appointment, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        let current = appointment.effective_status(now);
        if !current.blocks_schedule() || appointment.start_time <= now {
            warn!("Appointment {} cannot be rescheduled from {}", appointment.id, current);
            return Err(AppointmentError::InvalidTransition { from: current, to: current });
        }
        Ok(())
    }

    /// A bookable interval is non-empty and starts in the future.
    pub fn validate_new_interval(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::InvalidInterval(
                "start_time must be before end_time".to_string(),
            ));
        }
        if start_time <= now {
            return Err(AppointmentError::InvalidInterval(
                "Cannot book appointments in the past".to_string(),
            ));
        }
        Ok(())
    }

    // ==========================================================================
    // AUTHORIZATION
    // ==========================================================================

    pub fn authorize_booking(&self, ctx: &AuthContext, patient_id: Uuid) -> Result<(), AppointmentError> {
        if ctx.acts_for(patient_id) {
            Ok(())
        } else {
            Err(AppointmentError::Unauthorized(
                "Appointments can only be booked by the patient or an admin".to_string(),
            ))
        }
    }

    pub fn authorize_action(
        &self,
        ctx: &AuthContext,
        appointment: &Appointment,
        action: StatusAction,
    ) -> Result<(), AppointmentError> {
        let allowed = match action {
            StatusAction::Confirm | StatusAction::Decline => ctx.acts_for(appointment.doctor_id),
            StatusAction::Cancel => ctx.is_admin() || appointment.involves(ctx.user_id),
        };

        if allowed {
            Ok(())
        } else {
            Err(AppointmentError::Unauthorized(format!(
                "Not allowed to {:?} appointment {}",
                action, appointment.id
            )))
        }
    }

    /// Reads, reschedules and notes edits: either participant or an admin.
    pub fn authorize_participant(&self, ctx: &AuthContext, appointment: &Appointment) -> Result<(), AppointmentError> {
        if ctx.is_admin() || appointment.involves(ctx.user_id) {
            Ok(())
        } else {
            Err(AppointmentError::Unauthorized(format!(
                "Not a participant of appointment {}",
                appointment.id
            )))
        }
    }

    // ==========================================================================
    // LIFECYCLE EVENTS
    // ==========================================================================

    pub fn requested_event(&self, appointment: &Appointment) -> LifecycleEvent {
        self.event(appointment, LifecycleEventKind::AppointmentRequested, appointment.doctor_id)
    }

    pub fn rescheduled_event(&self, appointment: &Appointment, actor: &AuthContext) -> LifecycleEvent {
        self.event(
            appointment,
            LifecycleEventKind::AppointmentRescheduled,
            Self::other_party(appointment, actor),
        )
    }

    pub fn status_event(&self, appointment: &Appointment, action: StatusAction, actor: &AuthContext) -> LifecycleEvent {
        match action {
            StatusAction::Confirm => {
                self.event(appointment, LifecycleEventKind::AppointmentConfirmed, appointment.patient_id)
            }
            StatusAction::Decline => {
                self.event(appointment, LifecycleEventKind::AppointmentDeclined, appointment.patient_id)
            }
            StatusAction::Cancel => self.event(
                appointment,
                LifecycleEventKind::AppointmentCancelled,
                Self::other_party(appointment, actor),
            ),
        }
    }

    fn other_party(appointment: &Appointment, actor: &AuthContext) -> Uuid {
        if actor.user_id == appointment.patient_id {
            appointment.doctor_id
        } else {
            appointment.patient_id
        }
    }

    fn event(&self, appointment: &Appointment, kind: LifecycleEventKind, recipient_user_id: Uuid) -> LifecycleEvent {
        LifecycleEvent {
            recipient_user_id,
            kind,
            appointment_id: appointment.id,
            occurs_at: appointment.start_time,
            emitted_at: Utc::now(),
        }
    }
}
