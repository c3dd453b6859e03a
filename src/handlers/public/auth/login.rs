// handlers/public/auth/login.rs - POST /api/auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{generate_jwt, Claims};
use crate::database::models::AdminProfile;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::UserService;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: u64,
    pub user: AdminProfile,
}

/**
 * POST /api/auth/login - Authenticate an administrator
 *
 * Expected Input:
 * ```json
 * { "email": "admin@example.org", "password": "********" }
 * ```
 *
 * Expected Output:
 * ```json
 * {
 *   "success": true,
 *   "data": {
 *     "access_token": "eyJhbGciOiJIUzI1NiI...",
 *     "token_type": "Bearer",
 *     "expires_in": 86400,
 *     "user": { "id": "...", "email": "...", "role": "ADMIN", ... }
 *   }
 * }
 * ```
 *
 * Unknown email and wrong password answer the same 401.
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    let mut errors = FieldErrors::new();
    let email = errors.required("email", request.email.as_deref());
    let password = errors.required("password", request.password.as_deref());
    errors.finish()?;

    let admin = UserService::new(state.pool.clone())
        .authenticate(&email, &password)
        .await?;

    let security = &state.config.security;
    let claims = Claims::new(admin.id, admin.email.clone(), admin.role, security.jwt_expiry_hours);
    let access_token = generate_jwt(&claims, security)?;

    info!(admin = %admin.id, role = %admin.role, "admin logged in");
    Ok(ApiResponse::success(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: security.jwt_expiry_hours * 3600,
        user: admin.into(),
    }))
}
