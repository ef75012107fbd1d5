//! Service health, liveness and readiness probes.

use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Basic response payload describing API health.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    /// `ok` when the probe passed.
    pub status: String,
}

/// Health check endpoint returning a trivial JSON payload.
#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Liveness probe; answers as long as the server is running.
#[openapi(tag = "Health")]
#[get("/health/live")]
pub fn live_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe; fails with 500 while the database is unreachable.
#[openapi(tag = "Health")]
#[get("/health/ready")]
pub async fn ready_health(pool: &State<PgPool>) -> Result<Json<HealthResponse>, ApiError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool.inner())
        .await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
