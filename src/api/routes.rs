use crate::{
    api::{auth, contact, health, incidents, middleware, users},
    config::SecurityConfig,
    observability::HealthChecker,
    services::Services,
};
use axum::{
    extract::FromRef,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub services: Services,
    pub health_checker: Arc<HealthChecker>,
    pub metrics_enabled: bool,
}

pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    Router::new()
        // Service endpoints
        .route("/", get(health::root))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        // Public endpoints
        .route("/auth/login", post(auth::login))
        .route("/users/create-user", post(users::create_user))
        .route("/users/forgot-password/request-otp", post(users::request_otp))
        .route("/users/forgot-password/reset", post(users::reset_password))
        .route("/contact/send-email", post(contact::send_email))
        // Bearer-protected endpoints
        .merge(protected_routes(state.clone()))
        // Add middleware
        .layer(from_fn(middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(security))
        // Add state
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(users::me))
        .route("/users/all", get(users::list_users))
        .route("/users/:id", put(users::update_account).delete(users::delete_user))
        .route("/users/:id/profile", patch(users::update_profile))
        .route("/incidents/create-incident", post(incidents::create_incident))
        .route("/incidents/list-incidents", get(incidents::list_incidents))
        .route("/incidents/get-incident/:id", get(incidents::get_incident))
        .route("/incidents/update-incident/:id", put(incidents::update_incident))
        .route("/incidents/delete-incident/:id", delete(incidents::delete_incident))
        .route("/incidents/update-status/:id", patch(incidents::update_status))
        .route("/incidents/all", get(incidents::list_all))
        .route("/incidents/report", post(incidents::report))
        .route_layer(from_fn_with_state(state, middleware::require_user))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if security.cors_allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
