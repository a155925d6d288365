pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod services;
pub mod state;
pub mod validation;

use crate::config::Config;
use crate::db::repositories::github_analyses::{
    ArchiveStore, GithubAnalysisRepository, MemoryArchiveStore,
};
use crate::state::AppState;
use std::sync::Arc;

/// Initializes storage, builds the shared state and serves the API
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        bind = %config.bind_addr,
        environment = ?config.environment,
        "Starting document intelligence backend"
    );

    if std::env::var("OPENAI_API_KEY").is_err() {
        tracing::warn!("OPENAI_API_KEY is not set; document ingestion and RAG queries will fail");
    }

    let archive_store: Arc<dyn ArchiveStore> = match config.postgres_uri.as_deref() {
        Some(uri) => {
            db::init_db(uri).await?;
            tracing::info!("Database initialized");
            Arc::new(GithubAnalysisRepository::new())
        }
        None => {
            tracing::warn!("No Postgres URI configured; archive is kept in memory");
            Arc::new(MemoryArchiveStore::new())
        }
    };

    let state = AppState::new(config, archive_store)?;
    server::serve(state).await
}
