use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_models::auth::{AuthContext, Role};
use shared_models::error::AppError;

use crate::models::{AvailabilityWindow, CreateDoctorRequest, CreateWindowRequest, Doctor, DoctorProfileResponse};
use crate::services::availability::AvailabilityStore;

/// Doctor registration, lookup and schedule maintenance.
pub struct DoctorDirectory {
    store: Arc<dyn AvailabilityStore>,
}

impl DoctorDirectory {
    pub fn new(store: Arc<dyn AvailabilityStore>) -> Self {
        Self { store }
    }

    /// Doctors register themselves; admins may register anyone.
    pub async fn register(&self, ctx: &AuthContext, request: CreateDoctorRequest) -> Result<Doctor, AppError> {
        let id = match (ctx.role, request.doctor_id) {
            (Role::Admin, Some(id)) => id,
            (Role::Admin, None) => Uuid::new_v4(),
            (Role::Doctor, None) => ctx.user_id,
            (Role::Doctor, Some(id)) if id == ctx.user_id => id,
            _ => {
                warn!("User {} ({}) may not register doctor {:?}", ctx.user_id, ctx.role, request.doctor_id);
                return Err(AppError::Forbidden(
                    "Only doctors registering themselves or admins can add doctors".to_string(),
                ));
            }
        };

        let full_name = request.full_name.trim();
        let specialty = request.specialty.trim();
        if full_name.is_empty() || specialty.is_empty() {
            return Err(AppError::ValidationError("full_name and specialty are required".to_string()));
        }

        let doctor = self
            .store
            .add_doctor(Doctor {
                id,
                full_name: full_name.to_string(),
                specialty: specialty.to_ascii_uppercase(),
            })
            .await?;

        info!("Doctor {} registered as {}", doctor.id, doctor.specialty);
        Ok(doctor)
    }

    pub async fn profile(&self, doctor_id: Uuid) -> Result<DoctorProfileResponse, AppError> {
        let doctor = self
            .store
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;
        let windows = self.store.list_all_windows(doctor_id).await?;

        Ok(DoctorProfileResponse { doctor, windows })
    }

    pub async fn search(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, AppError> {
        Ok(self.store.list_doctors(specialty.map(str::trim).filter(|s| !s.is_empty())).await?)
    }

    pub async fn weekly_schedule(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, AppError> {
        if !self.store.doctor_exists(doctor_id).await? {
            return Err(AppError::NotFound("Doctor not found".to_string()));
        }
        Ok(self.store.list_all_windows(doctor_id).await?)
    }

    /// Only the doctor or an admin may edit a schedule.
    pub async fn add_window(
        &self,
        ctx: &AuthContext,
        doctor_id: Uuid,
        request: CreateWindowRequest,
    ) -> Result<AvailabilityWindow, AppError> {
        let own_schedule = ctx.role == Role::Doctor && ctx.user_id == doctor_id;
        if !own_schedule && !ctx.is_admin() {
            return Err(AppError::Forbidden(
                "Not authorized to create availability for this doctor".to_string(),
            ));
        }

        let window = self.store.add_window(doctor_id, request).await?;
        info!(
            "Doctor {} now available on day {} {} - {}",
            doctor_id, window.day_of_week, window.start_time, window.end_time
        );
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;

    use crate::services::InMemoryAvailabilityStore;

    fn directory() -> DoctorDirectory {
        DoctorDirectory::new(Arc::new(InMemoryAvailabilityStore::new()))
    }

    fn registration(doctor_id: Option<Uuid>) -> CreateDoctorRequest {
        CreateDoctorRequest {
            doctor_id,
            full_name: "Dr. Sarah Smith".to_string(),
            specialty: "cardiologist".to_string(),
        }
    }

    fn morning() -> CreateWindowRequest {
        CreateWindowRequest {
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn doctor_registers_under_own_id() {
        let directory = directory();
        let me = AuthContext::doctor(Uuid::new_v4());

        let doctor = directory.register(&me, registration(None)).await.unwrap();

        assert_eq!(doctor.id, me.user_id);
        assert_eq!(doctor.specialty, "CARDIOLOGIST");
        assert_matches!(
            directory.register(&me, registration(Some(Uuid::new_v4()))).await,
            Err(AppError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn patients_cannot_register_doctors() {
        let patient = AuthContext::patient(Uuid::new_v4());
        assert_matches!(directory().register(&patient, registration(None)).await, Err(AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admin_registers_chosen_id() {
        let directory = directory();
        let chosen = Uuid::new_v4();

        let doctor = directory
            .register(&AuthContext::admin(Uuid::new_v4()), registration(Some(chosen)))
            .await
            .unwrap();

        assert_eq!(doctor.id, chosen);
        assert_eq!(directory.profile(chosen).await.unwrap().doctor, doctor);
    }

    #[tokio::test]
    async fn only_owner_or_admin_edits_schedule() {
        let directory = directory();
        let owner = AuthContext::doctor(Uuid::new_v4());
        directory.register(&owner, registration(None)).await.unwrap();

        let other = AuthContext::doctor(Uuid::new_v4());
        assert_matches!(
            directory.add_window(&other, owner.user_id, morning()).await,
            Err(AppError::Forbidden(_))
        );

        directory.add_window(&owner, owner.user_id, morning()).await.unwrap();
        assert_matches!(
            directory.add_window(&AuthContext::admin(Uuid::new_v4()), owner.user_id, morning()).await,
            Err(AppError::Conflict(_))
        );
        assert_eq!(directory.weekly_schedule(owner.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_doctor_profile_is_not_found() {
        assert_matches!(directory().profile(Uuid::new_v4()).await, Err(AppError::NotFound(_)));
    }
}
