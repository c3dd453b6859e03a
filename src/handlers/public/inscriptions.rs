// handlers/public/inscriptions.rs - Registration and contact forms
//
// POST /api/inscriptions                     - register for a formation
// POST /api/inscriptions/sauvetage-sportif   - sports lifesaving sign-up (email only)
// POST /api/inscriptions/contact             - contact form (email only)
// POST /api/inscriptions/signalement         - incident report (email only)

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::database::models::Inscription;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::contact::{ContactRequest, ContactService, ReportRequest, SauvetageRequest};
use crate::services::inscriptions::InscriptionInput;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Submitted {
    pub message: &'static str,
}

/**
 * POST /api/inscriptions - Public registration
 *
 * Expected Input:
 * ```json
 * {
 *   "formation_id": "uuid",
 *   "first_name": "Léa", "last_name": "Martin",
 *   "email": "lea@example.org", "phone": "0600000000",
 *   "birth_date": "1998-03-21",
 *   "message": "optional"
 * }
 * ```
 *
 * Reserves one seat and stores a PENDING inscription in one transaction.
 * Confirmation and admin emails follow; their failure does not fail the
 * request. 400 when the formation has no seat left.
 */
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<InscriptionInput>, JsonRejection>,
) -> ApiResult<Inscription> {
    let Json(input) = payload?;
    let inscription = state.inscriptions().create(input.validate()?).await?;
    Ok(ApiResponse::created(inscription))
}

/// POST /api/inscriptions/sauvetage-sportif
pub async fn sauvetage(
    State(state): State<AppState>,
    payload: Result<Json<SauvetageRequest>, JsonRejection>,
) -> ApiResult<Submitted> {
    let Json(request) = payload?;
    ContactService::new(state.notifier.clone()).sauvetage(request).await?;
    Ok(ApiResponse::success(Submitted {
        message: "Votre demande d'inscription a bien été envoyée",
    }))
}

/// POST /api/inscriptions/contact
pub async fn contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> ApiResult<Submitted> {
    let Json(request) = payload?;
    ContactService::new(state.notifier.clone()).contact(request).await?;
    Ok(ApiResponse::success(Submitted {
        message: "Votre message a bien été envoyé",
    }))
}

/// POST /api/inscriptions/signalement
pub async fn signalement(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<Submitted> {
    let Json(request) = payload?;
    ContactService::new(state.notifier.clone()).report(request).await?;
    Ok(ApiResponse::success(Submitted {
        message: "Votre signalement a bien été envoyé",
    }))
}
