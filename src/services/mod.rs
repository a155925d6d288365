// Expose our service modules
pub mod archive;
pub mod crawler;
pub mod intelligence;
pub mod ocr;
pub mod rag;

// Convenience re-exports
pub use archive::ArchiveService;
pub use crawler::CrawlerService;
pub use intelligence::IntelligenceService;
pub use ocr::OcrClient;
pub use rag::RagService;

use crate::db::DbError;

/// Failures talking to OCR, crawl or LLM providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OpenAI API error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Errors from service operations that touch storage and providers
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    NotFound(String),
}

impl From<ServiceError> for crate::error::ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Db(e) => crate::error::ApiError::Database(e),
            ServiceError::Provider(e) => crate::error::ApiError::Provider(e),
            ServiceError::NotFound(msg) => crate::error::ApiError::NotFound(msg),
        }
    }
}
