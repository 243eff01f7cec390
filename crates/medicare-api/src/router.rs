use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;

use medicare_gateway::connection;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::storage::MAX_PHOTO_SIZE;
use crate::{auth, dashboard, medications, notifications, patients, photos};

/// Every HTTP and WebSocket route. CORS and tracing layers are the caller's
/// business.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/photos/{file_name}", get(photos::get_photo))
        .route("/gateway", get(ws_upgrade));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/patients", get(patients::list_patients).post(patients::add_patient))
        .route(
            "/patients/{patient_id}/medications",
            get(medications::list_medications).post(medications::create_medication),
        )
        .route("/patients/{patient_id}/taken", post(medications::mark_all_taken))
        .route("/patients/{patient_id}/summary", get(dashboard::summary))
        .route(
            "/patients/{patient_id}/notification-settings",
            get(notifications::get_settings).put(notifications::update_settings),
        )
        .route("/patients/{patient_id}/reminders", post(notifications::send_reminder))
        .route(
            "/medications/{medication_id}",
            put(medications::update_medication).delete(medications::delete_medication),
        )
        .route("/medications/{medication_id}/taken", post(medications::mark_taken))
        .route(
            "/photos",
            post(photos::upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_SIZE + 1)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            state.jwt_secret.clone(),
        )
    })
}
