use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;

use crate::state::AppStates;

pub fn create_router(states: AppStates) -> Router {
    Router::new()
        .route("/", get(|| async { "Telebridge scheduling API is running!" }))
        .nest("/doctors", doctor_routes(states.doctor))
        .nest("/appointments", appointment_routes(states.appointment))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::{to_bytes, Body}, http::{Request, StatusCode}};
    use chrono::{Datelike, Duration, Utc, Weekday};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_config::AppConfig;
    use shared_utils::test_utils::{JwtTestUtils, TestUser};

    use super::*;
    use crate::state;

    fn app() -> Router {
        create_router(state::build(Arc::new(AppConfig::default())))
    }

    #[tokio::test]
    async fn root_answers_without_token() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cell_routes_require_token() {
        for uri in ["/appointments/slots", "/doctors/00000000-0000-0000-0000-000000000000/availability"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    const SECRET: &str = "router-test-secret";

    async fn call(app: &Router, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        let token = JwtTestUtils::create_test_token(user, SECRET, None);
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", JwtTestUtils::bearer(&token))
            .header("Content-Type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn in_memory_mode_can_be_populated_through_the_api() {
        let config = AppConfig {
            supabase_jwt_secret: SECRET.to_string(),
            ..AppConfig::default()
        };
        let app = create_router(state::build(Arc::new(config)));
        let doctor = TestUser::doctor("dr.smith@example.com");
        let patient = TestUser::patient("patient@example.com");

        let (status, _) = call(
            &app,
            "POST",
            "/doctors",
            &doctor,
            Some(json!({ "full_name": "Dr. Sarah Smith", "specialty": "CARDIOLOGIST" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/doctors/{}/availability", doctor.id),
            &doctor,
            Some(json!({ "day_of_week": 1, "start_time": "09:00:00", "end_time": "12:00:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let mut monday = Utc::now().date_naive() + Duration::days(1);
        while monday.weekday() != Weekday::Mon {
            monday += Duration::days(1);
        }
        let (status, body) = call(
            &app,
            "GET",
            &format!("/appointments/slots?doctor_id={}&date={}", doctor.id, monday),
            &patient,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slots"].as_array().unwrap().len(), 6);
    }
}
