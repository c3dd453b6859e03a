// handlers/protected/dashboard.rs - Figures for the back-office home page

use axum::extract::State;

use crate::database::models::Formation;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::dashboard::{DashboardService, DashboardStats, MonthCount, MonthTrend, TypeCount};
use crate::state::AppState;

fn dashboard(state: &AppState) -> DashboardService {
    DashboardService::new(state.pool.clone(), state.registrations.clone())
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::success(dashboard(&state).stats().await?))
}

/// GET /api/dashboard/upcoming - Next five sessions
pub async fn upcoming(State(state): State<AppState>) -> ApiResult<Vec<Formation>> {
    Ok(ApiResponse::success(dashboard(&state).upcoming().await?))
}

/// GET /api/dashboard/formations-by-type
pub async fn formations_by_type(State(state): State<AppState>) -> ApiResult<Vec<TypeCount>> {
    Ok(ApiResponse::success(dashboard(&state).formations_by_type().await?))
}

/// GET /api/dashboard/formations-by-month - Last twelve months, oldest first
pub async fn formations_by_month(State(state): State<AppState>) -> ApiResult<Vec<MonthCount>> {
    Ok(ApiResponse::success(dashboard(&state).formations_by_month().await?))
}

/// GET /api/dashboard/inscription-trends
pub async fn inscription_trends(State(state): State<AppState>) -> ApiResult<Vec<MonthTrend>> {
    Ok(ApiResponse::success(dashboard(&state).inscription_trends().await?))
}
