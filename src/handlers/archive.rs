//! Repository-analysis archive endpoints

use crate::db::models::GithubAnalysis;
use crate::error::ApiResult;
use crate::handlers::JsonObject;
use crate::state::AppState;
use crate::validation;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub success: bool,
    pub data: Vec<GithubAnalysis>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub data: GithubAnalysis,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: bool,
}

fn analysis(data: GithubAnalysis) -> Json<AnalysisResponse> {
    Json(AnalysisResponse {
        success: true,
        data,
    })
}

/// `GET fetch-github-archive`
pub async fn fetch_archive(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ArchiveResponse>> {
    let filter = validation::archive_filter(&params)?;
    let page = state.archive.list(&filter).await?;
    Ok(Json(ArchiveResponse {
        success: true,
        data: page.rows,
        has_more: page.has_more,
    }))
}

/// `GET get-github-analysis?repository_url=`
pub async fn get_analysis(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<AnalysisResponse>> {
    let repository_url = validation::repository_url_param(&params)?;
    Ok(analysis(state.archive.get(&repository_url).await?))
}

/// `POST save-github-analysis`
pub async fn save_analysis(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<AnalysisResponse>> {
    let request = validation::save_analysis(&body)?;
    Ok(analysis(state.archive.save(request).await?))
}

/// `POST|DELETE delete-github-analysis`
pub async fn delete_analysis(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<DeleteResponse>> {
    let repository_url = validation::repository_url(&body)?;
    let deleted = state.archive.delete(&repository_url).await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// `POST toggle-star-analysis`
pub async fn toggle_star(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<AnalysisResponse>> {
    let request = validation::star_toggle(&body)?;
    Ok(analysis(state.archive.toggle_star(request).await?))
}

/// `POST update-analysis-metadata`
pub async fn update_metadata(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<AnalysisResponse>> {
    let request = validation::metadata_update(&body)?;
    Ok(analysis(state.archive.update_metadata(request).await?))
}
