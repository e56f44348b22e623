use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, ConflictCheckResponse};
use crate::services::store::AppointmentStore;

/// First appointment in `existing` that blocks `[start, end)`.
///
/// Only REQUESTED and CONFIRMED appointments block; `exclude_id` skips the
/// appointment being rescheduled.
pub fn first_conflict<'a>(
    existing: &'a [Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<Uuid>,
) -> Option<&'a Appointment> {
    existing.iter().find(|appointment| blocks_interval(appointment, start, end, exclude_id))
}

fn blocks_interval(appointment: &Appointment, start: DateTime<Utc>, end: DateTime<Utc>, exclude_id: Option<Uuid>) -> bool {
    Some(appointment.id) != exclude_id && appointment.blocks_schedule() && appointment.overlaps(start, end)
}

/// Answers whether a proposed interval clashes with a doctor's active appointments.
pub struct ConflictResolver {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        Ok(self.check_conflicts(doctor_id, start_time, end_time, exclude_id).await?.has_conflict)
    }

    pub async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}", doctor_id, start_time, end_time);

        let candidates = self
            .store
            .find_overlapping(doctor_id, start_time, end_time, &AppointmentStatus::ACTIVE, exclude_id)
            .await?;

        // Re-check locally; the store filter is a pre-selection.
        let conflicting_appointments: Vec<Appointment> = candidates
            .into_iter()
            .filter(|a| blocks_interval(a, start_time, end_time, exclude_id))
            .collect();

        if !conflicting_appointments.is_empty() {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting_appointments.is_empty(),
            conflicting_appointments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
    }

    fn booked(start: DateTime<Utc>, minutes: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            status,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        let existing = vec![booked(at(9, 30), 30, AppointmentStatus::Confirmed)];

        assert!(first_conflict(&existing, at(9, 0), at(9, 30), None).is_none());
        assert!(first_conflict(&existing, at(10, 0), at(10, 30), None).is_none());
        assert!(first_conflict(&existing, at(9, 45), at(10, 15), None).is_some());
    }

    #[test]
    fn terminal_appointments_never_block() {
        let existing = vec![
            booked(at(9, 0), 30, AppointmentStatus::Cancelled),
            booked(at(9, 0), 30, AppointmentStatus::Declined),
            booked(at(9, 0), 30, AppointmentStatus::Completed),
        ];

        assert!(first_conflict(&existing, at(9, 0), at(9, 30), None).is_none());
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let existing = vec![booked(at(9, 0), 30, AppointmentStatus::Requested)];
        let own_id = existing[0].id;

        assert!(first_conflict(&existing, at(9, 15), at(9, 45), Some(own_id)).is_none());
        assert!(first_conflict(&existing, at(9, 15), at(9, 45), None).is_some());
    }

    #[test]
    fn enclosing_interval_conflicts() {
        let existing = vec![booked(at(10, 0), 15, AppointmentStatus::Requested)];
        assert!(first_conflict(&existing, at(9, 0), at(12, 0), None).is_some());
    }
}
