use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health - liveness only; upstream is not contacted.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "upstream": state.upstream_host,
        }
    }))
}
