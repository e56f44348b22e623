use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{Appointment, AppointmentChanges, AppointmentQuery, AppointmentStatus};
use crate::services::conflict::first_conflict;

/// Persistence seam for appointments.
///
/// Implementations must refuse to hold two REQUESTED/CONFIRMED appointments
/// for the same doctor whose intervals overlap, answering `StoreError::Conflict`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Appointments of `doctor_id` in one of `statuses` that overlap `[start, end)`.
    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Compare-and-set on status: fails with `Conflict` when the stored status is no longer `from`.
    async fn update_status(&self, id: Uuid, from: AppointmentStatus, to: AppointmentStatus) -> Result<Appointment, StoreError>;

    /// Applies new times and/or notes in a single write.
    ///
    /// A time change is a compare-and-set on active status: it fails with
    /// `Conflict` when the appointment is no longer REQUESTED or CONFIRMED.
    async fn update_details(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError>;

    /// Matching appointments ordered by start time.
    async fn search(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }

    fn doctor_schedule(appointments: &HashMap<Uuid, Appointment>, doctor_id: Uuid) -> Vec<Appointment> {
        appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && Some(a.id) != exclude_id
                    && statuses.contains(&a.status)
                    && a.overlaps(start, end)
            })
            .cloned()
            .collect();

        found.sort_by_key(|a| a.start_time);
        Ok(found)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(StoreError::Conflict(format!("Appointment {} already exists", appointment.id)));
        }

        if appointment.blocks_schedule() {
            let schedule = Self::doctor_schedule(&appointments, appointment.doctor_id);
            if let Some(existing) = first_conflict(&schedule, appointment.start_time, appointment.end_time, None) {
                return Err(StoreError::Conflict(format!("Overlaps appointment {}", existing.id)));
            }
        }

        debug!("Stored appointment {} for doctor {}", appointment.id, appointment.doctor_id);
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(&self, id: Uuid, from: AppointmentStatus, to: AppointmentStatus) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;

        if appointment.status != from {
            return Err(StoreError::Conflict(format!(
                "Appointment {} is {}, expected {}",
                id, appointment.status, from
            )));
        }

        appointment.status = to;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn update_details(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let mut updated = appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;

        if changes.moves_times() && !updated.blocks_schedule() {
            return Err(StoreError::Conflict(format!(
                "Appointment {} is {} and cannot be moved",
                id, updated.status
            )));
        }

        if let Some(start) = changes.start_time {
            updated.start_time = start;
        }
        if let Some(end) = changes.end_time {
            updated.end_time = end;
        }
        if changes.notes.is_some() {
            updated.notes = changes.notes;
        }

        if updated.start_time >= updated.end_time {
            return Err(StoreError::Invalid("start_time must be before end_time".to_string()));
        }

        if updated.blocks_schedule() {
            let schedule = Self::doctor_schedule(&appointments, updated.doctor_id);
            if let Some(existing) = first_conflict(&schedule, updated.start_time, updated.end_time, Some(id)) {
                return Err(StoreError::Conflict(format!("Overlaps appointment {}", existing.id)));
            }
        }

        updated.updated_at = Utc::now();
        appointments.insert(id, updated.clone());
        Ok(updated)
    }

    async fn search(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();

        found.sort_by_key(|a| a.start_time);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
    }

    fn appointment(doctor_id: Uuid, start: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: Uuid::new_v4(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            status: AppointmentStatus::Requested,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[tokio::test]
    async fn overlapping_insert_is_refused() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        store.insert(appointment(doctor, at(9, 0))).await.unwrap();

        assert_matches!(store.insert(appointment(doctor, at(9, 15))).await, Err(StoreError::Conflict(_)));
        assert!(store.insert(appointment(doctor, at(9, 30))).await.is_ok());
        assert!(store.insert(appointment(Uuid::new_v4(), at(9, 0))).await.is_ok());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn cancelled_appointment_frees_interval() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        let first = store.insert(appointment(doctor, at(9, 0))).await.unwrap();

        store
            .update_status(first.id, AppointmentStatus::Requested, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        assert!(store.insert(appointment(doctor, at(9, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let store = InMemoryAppointmentStore::new();
        let stored = store.insert(appointment(Uuid::new_v4(), at(9, 0))).await.unwrap();

        store
            .update_status(stored.id, AppointmentStatus::Requested, AppointmentStatus::Confirmed)
            .await
            .unwrap();

        assert_matches!(
            store
                .update_status(stored.id, AppointmentStatus::Requested, AppointmentStatus::Declined)
                .await,
            Err(StoreError::Conflict(_))
        );
        assert_matches!(
            store
                .update_status(Uuid::new_v4(), AppointmentStatus::Requested, AppointmentStatus::Confirmed)
                .await,
            Err(StoreError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn moving_onto_another_appointment_leaves_original_untouched() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        let first = store.insert(appointment(doctor, at(9, 0))).await.unwrap();
        store.insert(appointment(doctor, at(10, 0))).await.unwrap();

        let changes = AppointmentChanges {
            start_time: Some(at(10, 0)),
            end_time: Some(at(10, 30)),
            notes: Some("moved".to_string()),
        };
        assert_matches!(store.update_details(first.id, changes).await, Err(StoreError::Conflict(_)));
        assert_eq!(store.get(first.id).await.unwrap(), Some(first.clone()));

        let shifted = AppointmentChanges {
            start_time: Some(at(9, 15)),
            end_time: Some(at(9, 45)),
            notes: None,
        };
        let moved = store.update_details(first.id, shifted).await.unwrap();
        assert_eq!(moved.start_time, at(9, 15));
    }

    #[tokio::test]
    async fn cancelled_appointment_cannot_be_moved() {
        let store = InMemoryAppointmentStore::new();
        let stored = store.insert(appointment(Uuid::new_v4(), at(9, 0))).await.unwrap();
        store
            .update_status(stored.id, AppointmentStatus::Requested, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let moved = AppointmentChanges {
            start_time: Some(at(11, 0)),
            end_time: Some(at(11, 30)),
            notes: None,
        };
        assert_matches!(store.update_details(stored.id, moved).await, Err(StoreError::Conflict(_)));

        let kept = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(kept.start_time, at(9, 0));
        assert_eq!(kept.status, AppointmentStatus::Cancelled);

        let notes = AppointmentChanges {
            notes: Some("late cancellation".to_string()),
            ..AppointmentChanges::default()
        };
        assert!(store.update_details(stored.id, notes).await.is_ok());
    }

    #[tokio::test]
    async fn search_orders_by_start() {
        let store = InMemoryAppointmentStore::new();
        let doctor = Uuid::new_v4();
        store.insert(appointment(doctor, at(11, 0))).await.unwrap();
        store.insert(appointment(doctor, at(9, 0))).await.unwrap();

        let found = store.search(&AppointmentQuery::for_doctor(doctor)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].start_time < found[1].start_time);
    }
}
