use axum::{
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};

pub async fn health_check() -> Result<Json<Value>, StatusCode> {
    let health_data = json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp(),
        "service": "trolley-backend",
        "version": env!("CARGO_PKG_VERSION")
    });

    Ok(Json(health_data))
}
