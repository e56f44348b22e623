use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::StoreError;
use shared_utils::interval::intervals_overlap;

use crate::models::{AvailabilityWindow, CreateWindowRequest, Doctor};

/// Doctor directory plus the doctors' weekly schedules.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Windows for one weekday, ordered by start time.
    async fn list_windows(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityWindow>, StoreError>;

    /// The whole weekly schedule, ordered by weekday then start time.
    async fn list_all_windows(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError>;

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError>;

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError>;

    /// Doctors ordered by name, optionally restricted to one specialty.
    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, StoreError>;

    /// Fails with `Conflict` when the id is already registered.
    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError>;

    /// Adds a window to a registered doctor's schedule.
    ///
    /// Rejects inverted ranges and weekdays outside 0..=6 with `Invalid`, an
    /// unknown doctor with `NotFound`, and a window overlapping another window
    /// of the same doctor on the same day with `Conflict`.
    async fn add_window(&self, doctor_id: Uuid, request: CreateWindowRequest) -> Result<AvailabilityWindow, StoreError>;
}

/// Builds and validates a new window.
pub fn new_window(doctor_id: Uuid, request: CreateWindowRequest) -> Result<AvailabilityWindow, StoreError> {
    let window = AvailabilityWindow {
        id: Uuid::new_v4(),
        doctor_id,
        day_of_week: request.day_of_week,
        start_time: request.start_time,
        end_time: request.end_time,
    };

    if !window.is_valid() {
        return Err(StoreError::Invalid(format!(
            "Invalid window: day {} {} - {}",
            window.day_of_week, window.start_time, window.end_time
        )));
    }
    Ok(window)
}

/// Whether `window` overlaps one of `schedule` on the same weekday.
pub fn clashes_with(schedule: &[AvailabilityWindow], window: &AvailabilityWindow) -> bool {
    schedule.iter().any(|existing| {
        existing.day_of_week == window.day_of_week
            && intervals_overlap(existing.start_time, existing.end_time, window.start_time, window.end_time)
    })
}

#[derive(Default)]
pub struct InMemoryAvailabilityStore {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
    windows: RwLock<HashMap<Uuid, Vec<AvailabilityWindow>>>,
}

impl InMemoryAvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn list_windows(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityWindow>, StoreError> {
        Ok(self
            .list_all_windows(doctor_id)
            .await?
            .into_iter()
            .filter(|w| w.day_of_week == day_of_week)
            .collect())
    }

    async fn list_all_windows(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError> {
        Ok(self.windows.read().await.get(&doctor_id).cloned().unwrap_or_default())
    }

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.doctors.read().await.contains_key(&doctor_id))
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, StoreError> {
        let mut doctors: Vec<Doctor> = self
            .doctors
            .read()
            .await
            .values()
            .filter(|d| specialty.map_or(true, |s| d.specialty.eq_ignore_ascii_case(s)))
            .cloned()
            .collect();

        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(doctors)
    }

    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError> {
        let mut doctors = self.doctors.write().await;
        if doctors.contains_key(&doctor.id) {
            return Err(StoreError::Conflict(format!("Doctor {} is already registered", doctor.id)));
        }

        debug!("Registered doctor {} ({})", doctor.id, doctor.specialty);
        doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn add_window(&self, doctor_id: Uuid, request: CreateWindowRequest) -> Result<AvailabilityWindow, StoreError> {
        let window = new_window(doctor_id, request)?;

        if !self.doctor_exists(doctor_id).await? {
            return Err(StoreError::NotFound(format!("Doctor {}", doctor_id)));
        }

        let mut windows = self.windows.write().await;
        let schedule = windows.entry(doctor_id).or_default();

        if clashes_with(schedule, &window) {
            return Err(StoreError::Conflict("Availability conflicts with existing schedule".to_string()));
        }

        schedule.push(window.clone());
        schedule.sort_by_key(|w| (w.day_of_week, w.start_time));
        debug!("Availability window {} added for doctor {}", window.id, doctor_id);

        Ok(window)
    }
}
