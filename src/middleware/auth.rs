use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::auth::{validate_jwt, Claims};
use crate::database::models::Role;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated admin extracted from the JWT, scoped to one request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

fn reject(api_error: ApiError) -> Response {
    (
        StatusCode::from_u16(api_error.status_code()).unwrap_or(StatusCode::UNAUTHORIZED),
        Json(api_error.to_json()),
    )
        .into_response()
}

/// Validate the bearer token and insert [`AuthUser`] into request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_jwt_from_headers(&headers).map_err(|msg| reject(ApiError::unauthorized(msg)))?;

    let claims = validate_jwt(&token, &state.config.security).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        reject(ApiError::unauthorized("Invalid or expired token"))
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

async fn require_roles(roles: &[Role], request: Request, next: Next) -> Result<Response, Response> {
    let Some(user) = request.extensions().get::<AuthUser>() else {
        return Err(reject(ApiError::unauthorized("Authentication required")));
    };

    if !user.has_any(roles) {
        tracing::warn!(user = %user.id, role = %user.role, "Access denied: insufficient role");
        return Err(reject(ApiError::forbidden("Insufficient permissions")));
    }

    Ok(next.run(request).await)
}

/// ADMIN or SUPER_ADMIN.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, Response> {
    require_roles(&[Role::Admin, Role::SuperAdmin], request, next).await
}

pub async fn require_super_admin(request: Request, next: Next) -> Result<Response, Response> {
    require_roles(&[Role::SuperAdmin], request, next).await
}

fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap_err(), "Empty JWT token");

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn role_capabilities() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            role: Role::Admin,
        };
        assert!(admin.has_any(&[Role::Admin, Role::SuperAdmin]));
        assert!(!admin.has_any(&[Role::SuperAdmin]));
        assert!(!admin.is_super_admin());
    }
}
