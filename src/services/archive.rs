use crate::db::models::{AnalysisChanges, GithubAnalysis};
use crate::db::repositories::github_analyses::{ArchiveFilter, ArchiveStore};
use crate::services::ServiceError;
use crate::validation::{MetadataUpdate, SaveAnalysis, StarToggle};
use serde::Serialize;
use std::sync::Arc;

/// One page of the archive listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePage {
    pub rows: Vec<GithubAnalysis>,
    /// True when the page came back full. This does not count the rows that
    /// remain, so an exactly-full last page still reports `true`.
    pub has_more: bool,
}

/// Service for the repository-analysis archive
///
/// Every operation is a single keyed read or write against the store.
#[derive(Clone)]
pub struct ArchiveService {
    store: Arc<dyn ArchiveStore>,
}

impl ArchiveService {
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Filtered, sorted, paginated listing
    pub async fn list(&self, filter: &ArchiveFilter) -> Result<ArchivePage, ServiceError> {
        let rows = self.store.list(filter).await?;
        let has_more = rows.len() as i64 == filter.pagination.limit;
        tracing::debug!(returned = rows.len(), has_more, "Archive page fetched");
        Ok(ArchivePage { rows, has_more })
    }

    pub async fn get(&self, repository_url: &str) -> Result<GithubAnalysis, ServiceError> {
        self.store
            .find_by_url(repository_url)
            .await?
            .ok_or_else(|| not_found(repository_url))
    }

    pub async fn save(&self, request: SaveAnalysis) -> Result<GithubAnalysis, ServiceError> {
        let saved = self
            .store
            .upsert(
                &request.repository_url,
                &request.repository_name,
                request.analysis_data,
            )
            .await?;
        tracing::info!(repository_url = %saved.repository_url, "Analysis saved");
        Ok(saved)
    }

    /// Returns whether a row was removed. Deleting an unknown URL is not an error.
    pub async fn delete(&self, repository_url: &str) -> Result<bool, ServiceError> {
        let deleted = self.store.delete_by_url(repository_url).await?;
        tracing::info!(repository_url, deleted, "Analysis delete requested");
        Ok(deleted > 0)
    }

    pub async fn toggle_star(&self, request: StarToggle) -> Result<GithubAnalysis, ServiceError> {
        let changes = AnalysisChanges {
            starred: Some(request.starred),
            ..Default::default()
        };
        self.apply(&request.repository_url, changes).await
    }

    pub async fn update_metadata(
        &self,
        request: MetadataUpdate,
    ) -> Result<GithubAnalysis, ServiceError> {
        self.apply(&request.repository_url, request.changes).await
    }

    async fn apply(
        &self,
        repository_url: &str,
        changes: AnalysisChanges,
    ) -> Result<GithubAnalysis, ServiceError> {
        let updated = self
            .store
            .update_by_url(repository_url, changes)
            .await?
            .ok_or_else(|| not_found(repository_url))?;
        tracing::info!(repository_url, "Analysis updated");
        Ok(updated)
    }
}

fn not_found(repository_url: &str) -> ServiceError {
    ServiceError::NotFound(format!("No analysis found for {}", repository_url))
}
