//! Workspace cycle listing with per-state-group issue statistics.

use rocket::State;
use rocket::get;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::auth::{AuthorizationError, WorkspaceViewer};
use crate::config::ServiceConfig;
use crate::cycles::{CycleOrdering, SharedCycleStatsReader};
use crate::error::ApiError;
use crate::models::CycleStats;

/// List the active cycles of a workspace with issue statistics.
///
/// `order_by` takes a field name, optionally prefixed with `-` for descending
/// order (default `-created_at`). An unknown workspace yields an empty list.
/// Callers the workspace authorizer rejects get a `Forbidden` error body.
#[openapi(tag = "Cycles")]
#[get("/workspaces/<slug>/cycles?<order_by>")]
pub async fn list_workspace_cycles(
    slug: String,
    order_by: Option<String>,
    viewer: Result<WorkspaceViewer, AuthorizationError>,
    reader: &State<SharedCycleStatsReader>,
    config: &State<ServiceConfig>,
) -> Result<Json<Vec<CycleStats>>, ApiError> {
    let viewer = viewer?;
    let ordering = match order_by.as_deref().map(str::trim).filter(|token| !token.is_empty()) {
        Some(token) => token.parse::<CycleOrdering>()?,
        None => config.default_ordering,
    };

    let cycles = reader.list_cycle_stats(&slug, ordering).await?;

    log::debug!(
        "listed {} cycles for workspace '{}' (principal: {})",
        cycles.len(),
        viewer.workspace_slug,
        viewer.principal.as_deref().unwrap_or("anonymous")
    );

    Ok(Json(cycles))
}
