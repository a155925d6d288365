//! Server configuration

use std::net::SocketAddr;

/// Deployment environment; error details are hidden in production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Outbound provider settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// DeepSeek OCR endpoint receiving multipart `image` uploads with mode fields
    pub ocr_url: String,

    /// Base64 JSON endpoints of the PDF-capable providers
    pub paddleocr_url: String,
    pub easyocr_url: String,
    pub dots_ocr_url: String,

    /// Timeout for OCR and crawl requests
    pub request_timeout_secs: u64,

    /// Embedding model for document chunks and questions
    pub embedding_model: String,

    /// Chat model answering RAG questions
    pub chat_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            ocr_url: "http://localhost:8000/api/ocr".to_string(),
            paddleocr_url: "http://localhost:5001/ocr".to_string(),
            easyocr_url: "http://localhost:5004/ocr".to_string(),
            dots_ocr_url: "http://localhost:5002/ocr".to_string(),
            request_timeout_secs: 30,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,

    /// PostgreSQL connection string; `None` keeps the archive in memory
    pub postgres_uri: Option<String>,

    pub environment: Environment,

    /// Value for `Access-Control-Allow-Origin`
    pub allowed_origin: String,

    /// Largest accepted JSON request body
    pub max_body_bytes: usize,

    /// Largest accepted OCR upload
    pub max_upload_bytes: usize,

    pub providers: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 54321)),
            postgres_uri: None,
            environment: Environment::Development,
            allowed_origin: "*".to_string(),
            max_body_bytes: 1024 * 1024,
            max_upload_bytes: 10 * 1024 * 1024,
            providers: ProviderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_and_permissive() {
        let config = Config::default();
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.allowed_origin, "*");
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert!(config.max_upload_bytes > config.max_body_bytes);
        assert!(!config.environment.is_production());
        assert!(config.postgres_uri.is_none());
    }
}
