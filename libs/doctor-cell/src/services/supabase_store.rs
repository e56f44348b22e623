use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{AvailabilityWindow, CreateWindowRequest, Doctor};
use crate::services::availability::{clashes_with, new_window, AvailabilityStore};

const DOCTOR_COLUMNS: &str = "id,full_name,specialty";

/// `AvailabilityStore` over the PostgREST `availabilities` and `doctors` tables.
///
/// Overlapping windows are also refused by the table's exclusion constraint,
/// which PostgREST reports as HTTP 409.
pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| StoreError::Backend(format!("Failed to parse {}: {}", what, e)))
    }

    async fn fetch_windows(&self, path: &str) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;
        Self::parse_rows(rows, "availability windows")
    }

    async fn fetch_doctors(&self, path: &str) -> Result<Vec<Doctor>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;
        Self::parse_rows(rows, "doctors")
    }

    async fn insert_row<T: DeserializeOwned>(&self, path: &str, body: Value, what: &str) -> Result<T, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, path, Some(body), Some(SupabaseClient::return_representation()))
            .await?;

        Self::parse_rows::<T>(rows, what)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("Insert into {} returned no rows", what)))
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn list_windows(&self, doctor_id: Uuid, day_of_week: u8) -> Result<Vec<AvailabilityWindow>, StoreError> {
        debug!("Fetching day {} availability for doctor {}", day_of_week, doctor_id);

        let path = format!(
            "/rest/v1/availabilities?doctor_id=eq.{}&day_of_week=eq.{}&order=start_time.asc",
            doctor_id, day_of_week
        );
        self.fetch_windows(&path).await
    }

    async fn list_all_windows(&self, doctor_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError> {
        debug!("Fetching weekly availability for doctor {}", doctor_id);

        let path = format!(
            "/rest/v1/availabilities?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        self.fetch_windows(&path).await
    }

    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select={}", doctor_id, DOCTOR_COLUMNS);
        Ok(self.fetch_doctors(&path).await?.into_iter().next())
    }

    async fn list_doctors(&self, specialty: Option<&str>) -> Result<Vec<Doctor>, StoreError> {
        let mut path = format!("/rest/v1/doctors?select={}&order=full_name.asc", DOCTOR_COLUMNS);
        if let Some(specialty) = specialty {
            path.push_str(&format!("&specialty=ilike.{}", urlencoding::encode(specialty)));
        }
        self.fetch_doctors(&path).await
    }

    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError> {
        debug!("Registering doctor {}", doctor.id);

        let body = json!({
            "id": doctor.id,
            "full_name": doctor.full_name,
            "specialty": doctor.specialty,
        });
        self.insert_row("/rest/v1/doctors", body, "doctors").await
    }

    async fn add_window(&self, doctor_id: Uuid, request: CreateWindowRequest) -> Result<AvailabilityWindow, StoreError> {
        let window = new_window(doctor_id, request)?;

        if !self.doctor_exists(doctor_id).await? {
            return Err(StoreError::NotFound(format!("Doctor {}", doctor_id)));
        }
        if clashes_with(&self.list_windows(doctor_id, window.day_of_week).await?, &window) {
            return Err(StoreError::Conflict("Availability conflicts with existing schedule".to_string()));
        }

        let body = serde_json::to_value(&window)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize window: {}", e)))?;
        self.insert_row("/rest/v1/availabilities", body, "availability windows").await
    }
}
