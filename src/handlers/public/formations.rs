// handlers/public/formations.rs - Public formation listing and the Excel catalog

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::formation::FormationFilter;
use crate::database::models::{Formation, FormationType};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::excel::{CatalogEntry, CatalogPeriod};
use crate::state::AppState;

/// GET /api/formations?type&status&upcoming - Sessions ordered by date
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<FormationFilter>, QueryRejection>,
) -> ApiResult<Vec<Formation>> {
    let Query(filter) = query?;
    let formations = state.registrations.list_formations(&filter).await?;
    Ok(ApiResponse::success(formations))
}

/// GET /api/formations/:id
pub async fn get(State(state): State<AppState>, path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Formation> {
    let Path(id) = path?;
    Ok(ApiResponse::success(state.registrations.get_formation(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(rename = "type")]
    pub formation_type: Option<FormationType>,
    /// `all`, `recent` or a four digit year.
    pub period: Option<String>,
}

/**
 * GET /api/formations/catalog?type&period - Formations read from the imported workbook
 *
 * The stored spreadsheet is parsed on every call; an empty list is returned
 * until a workbook has been imported. An unknown `period` is a 400.
 */
pub async fn catalog(
    State(state): State<AppState>,
    query: Result<Query<CatalogQuery>, QueryRejection>,
) -> ApiResult<Vec<CatalogEntry>> {
    let Query(query) = query?;
    let period: CatalogPeriod = query.period.as_deref().unwrap_or("all").parse()?;
    let entries = state.catalog.list(query.formation_type, period).await?;
    Ok(ApiResponse::success(entries))
}
