use crate::error::ApiResult;
use crate::handlers::JsonObject;
use crate::services::crawler::{BatchCrawlItem, CrawlReport};
use crate::state::AppState;
use crate::validation;
use axum::{extract::State, Json};
use serde::Serialize;

/// `POST crawl`
pub async fn crawl(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<CrawlReport>> {
    let url = validation::crawl_url(&body)?;
    Ok(Json(state.crawler.crawl(&url).await?))
}

#[derive(Debug, Serialize)]
pub struct BatchCrawlResponse {
    pub success: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchCrawlItem>,
}

/// `POST crawl-batch`; per-URL failures are reported inline
pub async fn crawl_batch(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<BatchCrawlResponse>> {
    let urls = validation::crawl_urls(&body)?;
    let results = state.crawler.crawl_many(urls).await;
    let succeeded = results.iter().filter(|r| r.success).count();

    Ok(Json(BatchCrawlResponse {
        success: true,
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}
