use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AvailabilityStore, DoctorDirectory};

pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub directory: DoctorDirectory,
}

impl DoctorState {
    pub fn new(config: Arc<AppConfig>, availability: Arc<dyn AvailabilityStore>) -> Self {
        Self {
            config,
            directory: DoctorDirectory::new(availability),
        }
    }
}

pub fn doctor_routes(state: Arc<DoctorState>) -> Router {
    Router::new()
        .route("/", get(handlers::search_doctors).post(handlers::create_doctor))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route(
            "/{doctor_id}/availability",
            get(handlers::get_doctor_availability).post(handlers::create_availability),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
