//! Shared server state

use crate::config::Config;
use crate::db::repositories::github_analyses::ArchiveStore;
use crate::services::{
    ArchiveService, CrawlerService, IntelligenceService, OcrClient, ProviderError, RagService,
};
use std::sync::Arc;

/// Immutable handles shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub archive: ArchiveService,
    pub rag: RagService,
    pub ocr: OcrClient,
    pub crawler: CrawlerService,
}

impl AppState {
    /// Builds the service handles. Provider clients are constructed here but
    /// make no network calls until a request needs them.
    pub fn new(config: Config, archive_store: Arc<dyn ArchiveStore>) -> Result<Self, ProviderError> {
        let intelligence = Arc::new(IntelligenceService::new(&config.providers)?);
        Ok(Self {
            archive: ArchiveService::new(archive_store),
            rag: RagService::new(intelligence),
            ocr: OcrClient::new(&config.providers)?,
            crawler: CrawlerService::new(&config.providers)?,
            config: Arc::new(config),
        })
    }
}
