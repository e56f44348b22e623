use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{Appointment, AppointmentChanges, AppointmentQuery, AppointmentStatus};
use crate::services::store::AppointmentStore;

/// `AppointmentStore` over the PostgREST `appointments` table.
///
/// Non-overlap of active appointments is enforced by the table's exclusion
/// constraint; PostgREST reports a violation as HTTP 409.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn timestamp(value: DateTime<Utc>) -> String {
        urlencoding::encode(&value.to_rfc3339()).into_owned()
    }

    fn status_list(statuses: &[AppointmentStatus]) -> String {
        statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",")
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                error!("Failed to parse appointment rows: {}", e);
                StoreError::Backend(format!("Failed to parse appointments: {}", e))
            })
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;
        Self::parse_rows(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, Some(body), Some(SupabaseClient::return_representation()))
            .await?;
        Self::parse_rows(rows)
    }

    fn search_path(query: &AppointmentQuery) -> String {
        let mut filters = Vec::new();

        if let Some(doctor_id) = query.doctor_id {
            filters.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            filters.push(format!("patient_id=eq.{}", patient_id));
        }
        if !query.statuses.is_empty() {
            filters.push(format!("status=in.({})", Self::status_list(&query.statuses)));
        }
        if let Some(from) = query.starts_from {
            filters.push(format!("start_time=gte.{}", Self::timestamp(from)));
        }
        if let Some(before) = query.starts_before {
            filters.push(format!("start_time=lt.{}", Self::timestamp(before)));
        }
        filters.push("order=start_time.asc".to_string());

        format!("/rest/v1/appointments?{}", filters.join("&"))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn find_overlapping(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.({})&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            doctor_id,
            Self::status_list(statuses),
            Self::timestamp(end),
            Self::timestamp(start)
        );
        if let Some(exclude_id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", exclude_id));
        }

        self.fetch(&path).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);

        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(format!("Failed to serialize appointment: {}", e)))?;

        self.write(Method::POST, "/rest/v1/appointments", body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Insert returned no rows".to_string()))
    }

    async fn update_status(&self, id: Uuid, from: AppointmentStatus, to: AppointmentStatus) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, from);
        let body = json!({
            "status": to,
            "updated_at": Utc::now().to_rfc3339(),
        });

        if let Some(updated) = self.write(Method::PATCH, &path, body).await?.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or its status moved on.
        match self.get(id).await? {
            Some(current) => Err(StoreError::Conflict(format!(
                "Appointment {} is {}, expected {}",
                id, current.status, from
            ))),
            None => Err(StoreError::NotFound(format!("Appointment {}", id))),
        }
    }

    async fn update_details(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError> {
        let moves_times = changes.moves_times();
        let mut body = Map::new();
        if let Some(start) = changes.start_time {
            body.insert("start_time".to_string(), json!(start.to_rfc3339()));
        }
        if let Some(end) = changes.end_time {
            body.insert("end_time".to_string(), json!(end.to_rfc3339()));
        }
        if let Some(notes) = changes.notes {
            body.insert("notes".to_string(), json!(notes));
        }
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut path = format!("/rest/v1/appointments?id=eq.{}", id);
        if moves_times {
            path.push_str(&format!("&status=in.({})", Self::status_list(&AppointmentStatus::ACTIVE)));
        }

        if let Some(updated) = self.write(Method::PATCH, &path, Value::Object(body)).await?.into_iter().next() {
            return Ok(updated);
        }

        match self.get(id).await? {
            Some(current) if moves_times => Err(StoreError::Conflict(format!(
                "Appointment {} is {} and cannot be moved",
                id, current.status
            ))),
            _ => Err(StoreError::NotFound(format!("Appointment {}", id))),
        }
    }

    async fn search(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        self.fetch(&Self::search_path(query)).await
    }
}
