// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::services::AvailabilityStore;
use shared_database::StoreError;
use shared_models::auth::AuthContext;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentQuery, AppointmentStatus,
    CreateAppointmentRequest, LifecycleEvent, StatusAction, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictResolver;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::DoctorLocks;
use crate::services::notifier::Notifier;
use crate::services::projector::day_bounds;
use crate::services::store::AppointmentStore;

/// Entry point for every appointment write and read.
///
/// Creates and reschedules run their conflict check and store write while
/// holding the doctor's lock; the store's own constraint catches writers in
/// other processes. Events go out after the write commits.
pub struct AppointmentBookingService {
    appointments: Arc<dyn AppointmentStore>,
    availability: Arc<dyn AvailabilityStore>,
    conflicts: ConflictResolver,
    lifecycle: AppointmentLifecycleService,
    locks: DoctorLocks,
    notifier: Arc<dyn Notifier>,
}

impl AppointmentBookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        availability: Arc<dyn AvailabilityStore>,
        notifier: Arc<dyn Notifier>,
        locks: DoctorLocks,
    ) -> Self {
        Self {
            conflicts: ConflictResolver::new(appointments.clone()),
            appointments,
            availability,
            lifecycle: AppointmentLifecycleService::new(),
            locks,
            notifier,
        }
    }

    /// Book a new appointment in REQUESTED state.
    pub async fn create_appointment(
        &self,
        ctx: &AuthContext,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking request from {} for doctor {} at {}", ctx.user_id, request.doctor_id, request.start_time);

        self.lifecycle.authorize_booking(ctx, request.patient_id)?;
        self.lifecycle.validate_new_interval(request.start_time, request.end_time, Utc::now())?;

        if !self.availability.doctor_exists(request.doctor_id).await? {
            return Err(AppointmentError::NotFound(format!("Doctor {}", request.doctor_id)));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: AppointmentStatus::Requested,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let created = {
            let _guard = self.locks.acquire(appointment.doctor_id).await?;

            if self
                .conflicts
                .has_conflict(appointment.doctor_id, appointment.start_time, appointment.end_time, None)
                .await?
            {
                warn!("Slot {} - {} for doctor {} is taken", appointment.start_time, appointment.end_time, appointment.doctor_id);
                return Err(AppointmentError::SlotUnavailable);
            }

            self.appointments.insert(appointment).await.map_err(|e| match e {
                StoreError::Conflict(msg) => {
                    warn!("Store rejected overlapping booking: {}", msg);
                    AppointmentError::SlotUnavailable
                }
                other => Self::store_failure(other),
            })?
        };

        info!("Appointment {} requested with doctor {}", created.id, created.doctor_id);
        self.emit(self.lifecycle.requested_event(&created)).await;

        Ok(created)
    }

    /// Reschedule and/or edit notes. Only a time change emits an event.
    pub async fn update_appointment(
        &self,
        ctx: &AuthContext,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.lifecycle.authorize_participant(ctx, &appointment)?;

        if !request.changes_times() {
            let changes = AppointmentChanges {
                notes: request.notes,
                ..AppointmentChanges::default()
            };
            let updated = self
                .appointments
                .update_details(appointment_id, changes)
                .await
                .map_err(Self::store_failure)?;
            debug!("Notes updated on appointment {}", appointment_id);
            return Ok(updated);
        }

        let start_time = request.start_time.unwrap_or(appointment.start_time);
        let end_time = request.end_time.unwrap_or(appointment.end_time);
        self.lifecycle.validate_reschedule(&appointment, Utc::now())?;
        self.lifecycle.validate_new_interval(start_time, end_time, Utc::now())?;

        let updated = {
            let _guard = self.locks.acquire(appointment.doctor_id).await?;

            // Status may have moved while waiting for the lock.
            let current = self.load(appointment_id).await?;
            self.lifecycle.validate_reschedule(&current, Utc::now())?;

            if self
                .conflicts
                .has_conflict(current.doctor_id, start_time, end_time, Some(appointment_id))
                .await?
            {
                warn!("Reschedule of {} to {} - {} conflicts", appointment_id, start_time, end_time);
                return Err(AppointmentError::ScheduleConflict);
            }

            let changes = AppointmentChanges {
                start_time: Some(start_time),
                end_time: Some(end_time),
                notes: request.notes,
            };
            match self.appointments.update_details(appointment_id, changes).await {
                Ok(updated) => updated,
                Err(StoreError::Conflict(msg)) => {
                    warn!("Store rejected reschedule of {}: {}", appointment_id, msg);
                    // A status change that bypassed the lock is not an overlap.
                    let latest = self.load(appointment_id).await?;
                    let status = latest.effective_status(Utc::now());
                    return Err(if status.blocks_schedule() {
                        AppointmentError::ScheduleConflict
                    } else {
                        AppointmentError::InvalidTransition { from: status, to: status }
                    });
                }
                Err(StoreError::Invalid(msg)) => return Err(AppointmentError::InvalidInterval(msg)),
                Err(other) => return Err(Self::store_failure(other)),
            }
        };

        info!("Appointment {} rescheduled to {}", updated.id, updated.start_time);
        self.emit(self.lifecycle.rescheduled_event(&updated, ctx)).await;

        Ok(updated)
    }

    /// Confirm, decline or cancel.
    pub async fn set_status(
        &self,
        ctx: &AuthContext,
        appointment_id: Uuid,
        action: StatusAction,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.lifecycle.authorize_action(ctx, &appointment, action)?;

        let target = action.target_status();
        self.lifecycle.validate_status_transition(&appointment, target, Utc::now())?;

        let updated = match self
            .appointments
            .update_status(appointment_id, appointment.status, target)
            .await
        {
            Ok(updated) => updated,
            Err(StoreError::Conflict(_)) => {
                // Lost a race with another status change.
                let current = self.load(appointment_id).await?;
                warn!("Appointment {} changed to {} concurrently", appointment_id, current.status);
                return Err(AppointmentError::InvalidTransition {
                    from: current.effective_status(Utc::now()),
                    to: target,
                });
            }
            Err(other) => return Err(Self::store_failure(other)),
        };

        info!("Appointment {} is now {}", updated.id, updated.status);
        self.emit(self.lifecycle.status_event(&updated, action, ctx)).await;

        Ok(updated)
    }

    pub async fn get_appointment(&self, ctx: &AuthContext, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.lifecycle.authorize_participant(ctx, &appointment)?;
        Ok(appointment)
    }

    pub async fn patient_appointments(&self, ctx: &AuthContext, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Self::authorize_listing(ctx, patient_id)?;
        self.search(AppointmentQuery::for_patient(patient_id)).await
    }

    pub async fn doctor_appointments(&self, ctx: &AuthContext, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Self::authorize_listing(ctx, doctor_id)?;
        self.search(AppointmentQuery::for_doctor(doctor_id)).await
    }

    pub async fn upcoming_patient_appointments(
        &self,
        ctx: &AuthContext,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Self::authorize_listing(ctx, patient_id)?;
        self.search(Self::upcoming(AppointmentQuery::for_patient(patient_id))).await
    }

    pub async fn upcoming_doctor_appointments(
        &self,
        ctx: &AuthContext,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Self::authorize_listing(ctx, doctor_id)?;
        self.search(Self::upcoming(AppointmentQuery::for_doctor(doctor_id))).await
    }

    /// Confirmed appointments starting on `date`.
    pub async fn todays_doctor_appointments(
        &self,
        ctx: &AuthContext,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Self::authorize_listing(ctx, doctor_id)?;

        let (day_start, day_end) = day_bounds(date)?;
        let query = AppointmentQuery {
            doctor_id: Some(doctor_id),
            statuses: vec![AppointmentStatus::Confirmed],
            starts_from: Some(day_start),
            starts_before: Some(day_end),
            ..AppointmentQuery::default()
        };
        self.search(query).await
    }

    fn upcoming(query: AppointmentQuery) -> AppointmentQuery {
        AppointmentQuery {
            statuses: AppointmentStatus::ACTIVE.to_vec(),
            starts_from: Some(Utc::now()),
            ..query
        }
    }

    fn authorize_listing(ctx: &AuthContext, participant_id: Uuid) -> Result<(), AppointmentError> {
        if ctx.acts_for(participant_id) {
            Ok(())
        } else {
            Err(AppointmentError::Unauthorized(
                "Appointments can only be listed by their participant or an admin".to_string(),
            ))
        }
    }

    async fn search(&self, query: AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.search(&query).await.map_err(Self::store_failure)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await
            .map_err(Self::store_failure)?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", appointment_id)))
    }

    async fn emit(&self, event: LifecycleEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!("Failed to deliver {} for appointment {}: {:#}", event.kind, event.appointment_id, e);
        }
    }

    fn store_failure(err: StoreError) -> AppointmentError {
        match err {
            StoreError::NotFound(what) => AppointmentError::NotFound(what),
            other => {
                error!("Appointment store failure: {}", other);
                AppointmentError::StoreFailure(other.to_string())
            }
        }
    }
}
