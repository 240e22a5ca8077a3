//! HCP resource HTTP handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use deadpool_postgres::Pool;
use serde::Deserialize;

use crm_core::NewHcp;

use crate::db::HcpRepository;
use crate::error::AppError;

/// Offset pagination parameters
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// POST /api/v1/hcps - Register a new HCP
pub async fn create(
    State(pool): State<Pool>,
    Json(body): Json<NewHcp>,
) -> Result<impl IntoResponse, AppError> {
    let repo = HcpRepository::new(pool);

    if repo.find_by_name(&body.name).await?.is_some() {
        return Err(AppError::BadRequest(
            "HCP with this name already registered".to_string(),
        ));
    }

    let hcp = repo.create(&body).await?;
    tracing::info!(hcp_id = hcp.id, name = %hcp.name, "HCP registered");
    Ok((StatusCode::CREATED, Json(hcp)))
}

/// GET /api/v1/hcps - List HCPs
pub async fn list(
    State(pool): State<Pool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let repo = HcpRepository::new(pool);
    let hcps = repo.list(params.skip, params.limit).await?;
    Ok(Json(hcps))
}

/// GET /api/v1/hcps/{id} - Read an HCP
pub async fn read(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let repo = HcpRepository::new(pool);

    match repo.get(id).await? {
        Some(hcp) => Ok(Json(hcp)),
        None => Err(AppError::NotFound("HCP not found".to_string())),
    }
}
