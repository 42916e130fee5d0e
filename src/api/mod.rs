use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod checklists;
mod cookies;
mod devices;
mod error;
mod observability;
mod pm_logs;
mod qr_tokens;
mod system;
mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn crate::services::AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn qr_service(&self) -> &Arc<dyn crate::services::QrService> {
        &self.shared.qr_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };

    let protected_routes = create_protected_router(state.clone());
    let admin_routes = create_admin_router(state.clone());
    let qr_capable_routes = create_qr_capable_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .merge(admin_routes)
        .merge(qr_capable_routes)
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/qr-tokens/validate/{token}", get(qr_tokens::validate))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/profile", get(auth::get_profile))
        .route("/auth/profile", put(auth::update_profile))
        .route("/devices", get(devices::list_devices))
        .route("/devices/{id}", get(devices::get_device))
        .route("/devices/search/{query}", get(devices::search_devices))
        .route("/pm-checklists", get(checklists::list_checklists))
        .route("/pm-checklists", post(checklists::create_checklist))
        .route("/pm-checklists/{id}", get(checklists::get_checklist))
        .route("/pm-checklists/{id}", put(checklists::update_checklist))
        .route("/pm-checklists/{id}", delete(checklists::delete_checklist))
        .route("/pm-checklists/{id}/tasks", post(checklists::create_task))
        .route("/pm-checklists/tasks/{task_id}", put(checklists::update_task))
        .route(
            "/pm-checklists/tasks/{task_id}/description",
            put(checklists::update_task_description),
        )
        .route(
            "/pm-checklists/tasks/{task_id}",
            delete(checklists::delete_task),
        )
        .route("/pm-logs", get(pm_logs::list_pm_logs))
        .route("/pm-logs", post(pm_logs::create_pm_log))
        .route("/pm-logs/{id}", put(pm_logs::update_pm_log))
        .route("/pm-logs/{id}/tasks", post(pm_logs::add_log_task))
        .route("/pm-logs/tasks/{task_id}", put(pm_logs::update_log_task))
        .route(
            "/pm-logs/statistics/overview",
            get(pm_logs::get_statistics),
        )
        .route("/qr-tokens/generate", post(qr_tokens::generate))
        .route("/qr-tokens/revoke/{token}", delete(qr_tokens::revoke))
        .route(
            "/qr-tokens/device/{device_id}",
            get(qr_tokens::list_for_device),
        )
        .route("/qr-tokens/cleanup", post(qr_tokens::cleanup))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

/// Admin routes wrap two gates: the bearer gate populates the identity,
/// the admin gate checks its role. Layer order matters, the last layer
/// added runs first.
fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/stats/overview", get(users::get_stats))
        .route("/devices", post(devices::create_device))
        .route("/devices/{id}", put(devices::update_device))
        .route("/devices/{id}", delete(devices::delete_device))
        .route("/pm-logs/{id}", delete(pm_logs::delete_pm_log))
        .route("/pm-logs/tasks/{task_id}", delete(pm_logs::delete_log_task))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(auth::require_admin))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

/// The two read-only routes a QR capability token can reach.
fn create_qr_capable_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/pm-logs/device/{device_id}", get(pm_logs::device_history))
        .route("/pm-logs/{id}", get(pm_logs::get_pm_log))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_or_qr_middleware,
        ))
}
