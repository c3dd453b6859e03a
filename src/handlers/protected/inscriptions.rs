// handlers/protected/inscriptions.rs - Registration back office
//
// Every route here goes through `InscriptionService`, which commits the seat
// change together with the inscription write before any email is sent.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use tracing::info;
use uuid::Uuid;

use crate::database::models::inscription::InscriptionFilter;
use crate::database::models::Inscription;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::inscriptions::{InscriptionDetails, InscriptionUpdate, StatusUpdate};
use crate::state::AppState;

/// GET /api/inscriptions/admin?formation_id&status - Newest first
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<InscriptionFilter>, QueryRejection>,
) -> ApiResult<Vec<Inscription>> {
    let Query(filter) = query?;
    Ok(ApiResponse::success(state.inscriptions().list(&filter).await?))
}

/// GET /api/inscriptions/admin/:id - The inscription with its formation
pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<InscriptionDetails> {
    let Path(id) = path?;
    Ok(ApiResponse::success(state.inscriptions().get(id).await?))
}

/**
 * PUT /api/inscriptions/admin/:id - Edit registrant details
 *
 * A `status` in the body is applied first through the status workflow, so
 * the same seat and transition rules hold as for the status route.
 */
pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<InscriptionUpdate>, JsonRejection>,
) -> ApiResult<Inscription> {
    let Path(id) = path?;
    let Json(update) = payload?;
    let (patch, status) = update.validate()?;
    Ok(ApiResponse::success(state.inscriptions().update(id, patch, status).await?))
}

/**
 * PUT /api/inscriptions/admin/:id/status
 *
 * Expected Input: `{ "status": "ACCEPTED" }`
 *
 * PENDING → ACCEPTED | REFUSED | CANCELLED, ACCEPTED → REFUSED | CANCELLED.
 * Accepting takes a seat (400 when none is left), leaving ACCEPTED gives it
 * back. Re-sending the current status changes nothing.
 */
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Inscription> {
    let Path(id) = path?;
    let Json(body) = payload?;
    let inscription = state.inscriptions().update_status(id, body.status).await?;
    info!(inscription = %id, status = %inscription.status, by = %user.id, "inscription status set");
    Ok(ApiResponse::success(inscription))
}

/// DELETE /api/inscriptions/admin/:id - Frees the seat of an ACCEPTED inscription
pub async fn delete(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    state.inscriptions().remove(id).await?;
    Ok(ApiResponse::no_content())
}
