use axum::extract::State;
use axum::{http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use super::AppState;

/// Root landing page for users redirected into a verification flow
pub async fn welcome() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "message": "Welcome to the MFA Verification Page",
            "instructions": "Please follow the instructions sent to your device to complete verification."
        })),
    )
}

/// Health check. Sweeps expired challenges first so the reported
/// active count reflects live state.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.store.sweep_expired(Utc::now()).await;
    let active_challenges = state.store.active_count().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "authpay-api",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
            "active_challenges": active_challenges
        })),
    )
}
