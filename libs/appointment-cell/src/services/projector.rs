use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{day_of_week, AvailabilityWindow, CandidateSlot};
use doctor_cell::services::{AvailabilityStore, SlotGenerator};

use crate::models::{AppointmentError, AppointmentStatus, AvailabilityCheckResponse};
use crate::services::conflict::{first_conflict, ConflictResolver};
use crate::services::store::AppointmentStore;

/// `[00:00, next 00:00)` of `date`. Fails for the last representable date.
pub fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
    let next = date
        .succ_opt()
        .ok_or_else(|| AppointmentError::InvalidInterval(format!("Date {} is out of range", date)))?;
    let midnight = |day: NaiveDate| day.and_time(NaiveTime::default()).and_utc();
    Ok((midnight(date), midnight(next)))
}

/// Turns a doctor's weekly windows and booked appointments into bookable slots.
pub struct AvailabilityProjector {
    availability: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    conflicts: ConflictResolver,
    generator: SlotGenerator,
}

impl AvailabilityProjector {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        appointments: Arc<dyn AppointmentStore>,
        generator: SlotGenerator,
    ) -> Self {
        Self {
            availability,
            conflicts: ConflictResolver::new(appointments.clone()),
            appointments,
            generator,
        }
    }

    pub fn slot_minutes(&self) -> i64 {
        self.generator.slot_minutes()
    }

    /// Free slots for `doctor_id` on `date` whose start lies after `now`.
    ///
    /// The result is a snapshot; booking re-checks under the doctor's lock.
    pub async fn bookable_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateSlot>, AppointmentError> {
        self.ensure_doctor(doctor_id).await?;

        let (day_start, day_end) = day_bounds(date)?;
        let (windows, booked) = futures::try_join!(
            async {
                self.availability
                    .list_windows(doctor_id, day_of_week(date))
                    .await
                    .map_err(AppointmentError::from)
            },
            async {
                self.appointments
                    .find_overlapping(doctor_id, day_start, day_end, &AppointmentStatus::ACTIVE, None)
                    .await
                    .map_err(AppointmentError::from)
            },
        )?;

        let candidates = self.generator.generate(date, &windows);
        let total = candidates.len();

        let slots: Vec<CandidateSlot> = candidates
            .into_iter()
            .filter(|slot| slot.start_time > now)
            .filter(|slot| first_conflict(&booked, slot.start_time, slot.end_time, None).is_none())
            .collect();

        debug!(
            "Doctor {} on {}: {} of {} candidate slots bookable ({} appointments)",
            doctor_id,
            date,
            slots.len(),
            total,
            booked.len()
        );

        Ok(slots)
    }

    /// Point check: inside one of the doctor's windows and free of conflicts.
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<AvailabilityCheckResponse, AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::InvalidInterval(
                "start_time must be before end_time".to_string(),
            ));
        }
        self.ensure_doctor(doctor_id).await?;

        let date = start_time.date_naive();
        let windows = self.availability.list_windows(doctor_id, day_of_week(date)).await?;
        let within_schedule = windows.iter().any(|w| w.covers(start_time, end_time));

        let has_conflict = self.conflicts.has_conflict(doctor_id, start_time, end_time, None).await?;

        Ok(AvailabilityCheckResponse {
            available: within_schedule && !has_conflict,
            within_schedule,
            has_conflict,
        })
    }

    pub async fn list_doctor_windows(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, AppointmentError> {
        self.ensure_doctor(doctor_id).await?;
        Ok(self.availability.list_all_windows(doctor_id).await?)
    }

    pub async fn ensure_doctor(&self, doctor_id: Uuid) -> Result<(), AppointmentError> {
        if self.availability.doctor_exists(doctor_id).await? {
            Ok(())
        } else {
            Err(AppointmentError::NotFound(format!("Doctor {}", doctor_id)))
        }
    }
}
