// handlers/public/system.rs - Service description and health

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::middleware::ApiResponse;
use crate::services::health;
use crate::state::AppState;

/// GET / - What this API is and where things live
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": format!("{} API", state.config.mail.site_name),
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Administration backend for first-aid training sessions",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health, /api/health (public)",
                "auth": "/api/auth/login (public), /api/auth/me (admin)",
                "formations": "/api/formations[/:id], /api/formations/catalog (public), /api/formations/admin/* (admin)",
                "inscriptions": "/api/inscriptions, /api/inscriptions/{sauvetage-sportif,contact,signalement} (public), /api/inscriptions/admin/* (admin)",
                "documents": "/api/documents, /api/documents/:id/download (public), /api/documents/admin/* (admin)",
                "gallery": "/api/galerie (public), /api/galerie/admin/* (admin)",
                "news": "/api/news[/:id] (public), /api/news/admin/* (admin)",
                "settings": "/api/settings (public), /api/settings/admin (admin read, super admin write)",
                "users": "/api/admin/users/* (admin)",
                "dashboard": "/api/dashboard/* (admin)",
                "database": "/api/database/* (super admin)",
                "uploads": "/uploads/* (public files)",
            }
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> Response {
    let report = health::check(&state.pool, state.started_at, state.config.environment).await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    ApiResponse::with_status(report, status).into_response()
}
