//! Document store and RAG endpoints

use crate::db::models::DocumentSummary;
use crate::error::{ApiError, ApiResult};
use crate::handlers::JsonObject;
use crate::services::rag::{IngestedDocument, RagAnswer};
use crate::state::AppState;
use crate::validation;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(flatten)]
    pub document: IngestedDocument,
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub success: bool,
    pub data: Vec<DocumentSummary>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
}

/// `POST documents`
pub async fn ingest_document(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<IngestResponse>> {
    let request = validation::new_document(&body)?;
    let document = state.rag.ingest(request).await?;
    Ok(Json(IngestResponse {
        success: true,
        document,
    }))
}

/// `GET documents?limit&offset`
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<DocumentsResponse>> {
    let pagination = validation::pagination(&params)?;
    let data = state.rag.list(pagination).await?;
    Ok(Json(DocumentsResponse {
        success: true,
        data,
    }))
}

/// `DELETE documents/{id}`
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let id = Uuid::parse_str(&id).map_err(|e| {
        ApiError::Validation(validation::ValidationError::InvalidValue {
            field: "id",
            reason: e.to_string(),
        })
    })?;
    state.rag.delete(id).await?;
    Ok(Json(DeletedResponse { success: true }))
}

/// `POST rag-query`
pub async fn rag_query(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<RagAnswer>> {
    let request = validation::rag_question(&body)?;
    Ok(Json(state.rag.query(request).await?))
}
