use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;
use crate::onboarding::models::{apply_answer, validate_email, CreateUserRequest, OnboardingAnswer};
use crate::state::AppState;

/// POST /api/v1/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let email = validate_email(&req.email)?;
    let full_name = req
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let user = User::new(email, full_name);
    state.store.create_user(&user).await?;
    info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = load_user(&state, id).await?;
    Ok(Json(user))
}

/// PUT /api/v1/users/:id/onboarding
pub async fn handle_onboarding_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<OnboardingAnswer>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(answer) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let mut user = load_user(&state, id).await?;

    let step = answer.step();
    apply_answer(&mut user, answer)?;
    state.store.update_user(&user).await?;

    info!(
        "User {id} answered onboarding step {step}, next: {}",
        user.onboarding_step
    );
    Ok(Json(user))
}

async fn load_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .store
        .user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::build_router;
    use crate::test_support::TestApp;

    fn json_request(method: &str, uri: String, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_user(app: &TestApp, email: &str) -> Response {
        build_router(app.state.clone())
            .oneshot(json_request(
                "POST",
                "/api/v1/users".into(),
                json!({"email": email, "full_name": " Ada Lovelace "}),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let app = TestApp::new();
        let response = create_user(&app, "Ada@Example.com").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["email"], "ada@example.com");
        assert_eq!(created["full_name"], "Ada Lovelace");
        assert_eq!(created["onboarding_step"], "university");

        let id = created["id"].as_str().unwrap();
        let response = build_router(app.state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/users/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["id"], id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let app = TestApp::new();
        assert_eq!(create_user(&app, "ada@example.com").await.status(), StatusCode::CREATED);
        assert_eq!(create_user(&app, "ADA@example.com").await.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let app = TestApp::new();
        assert_eq!(create_user(&app, "not-an-email").await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_onboarding_step_updates_user() {
        let app = TestApp::new();
        let created = json_body(create_user(&app, "ada@example.com").await).await;
        let id = created["id"].as_str().unwrap();

        let response = build_router(app.state.clone())
            .oneshot(json_request(
                "PUT",
                format!("/api/v1/users/{id}/onboarding"),
                json!({"step": "university", "value": "University of London"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user = json_body(response).await;
        assert_eq!(user["university"], "University of London");
        assert_eq!(user["onboarding_step"], "career_path");
        assert_eq!(user["completed_steps"], json!(["university"]));
    }

    #[tokio::test]
    async fn test_onboarding_rejects_bad_answers() {
        let app = TestApp::new();
        let created = json_body(create_user(&app, "ada@example.com").await).await;
        let id = created["id"].as_str().unwrap();

        for body in [
            json!({"step": "work_model", "value": "office"}),
            json!({"step": "horoscope", "value": "leo"}),
            json!({"step": "industry", "value": []}),
            json!({"step": "career_goal", "value": ""}),
        ] {
            let response = build_router(app.state.clone())
                .oneshot(json_request(
                    "PUT",
                    format!("/api/v1/users/{id}/onboarding"),
                    body,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_onboarding_unknown_user_is_not_found() {
        let app = TestApp::new();
        let response = build_router(app.state.clone())
            .oneshot(json_request(
                "PUT",
                format!("/api/v1/users/{}/onboarding", Uuid::new_v4()),
                json!({"step": "university", "value": "MIT"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
