use clap::Parser;
use docintel_lib::config::{Config, Environment, ProviderConfig};
use docintel_lib::logging::{self, LogFormat};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "docintel")]
#[command(about = "Document intelligence backend: archive, OCR, crawl and RAG APIs")]
#[command(version)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "DOCINTEL_BIND", default_value = "127.0.0.1:54321")]
    bind: SocketAddr,

    /// PostgreSQL connection string; the archive stays in memory without one
    #[arg(long, env = "DOCINTEL_POSTGRES_URI")]
    postgres_uri: Option<String>,

    /// Deployment environment; production hides error details
    #[arg(long, env = "DOCINTEL_ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    environment: Environment,

    /// Value of Access-Control-Allow-Origin
    #[arg(long, env = "DOCINTEL_ALLOWED_ORIGIN", default_value = "*")]
    allowed_origin: String,

    /// Largest accepted JSON body in bytes
    #[arg(long, env = "DOCINTEL_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
    max_body_bytes: usize,

    /// Largest accepted OCR upload in bytes
    #[arg(long, env = "DOCINTEL_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// DeepSeek OCR endpoint
    #[arg(long, env = "DOCINTEL_OCR_URL", default_value = "http://localhost:8000/api/ocr")]
    ocr_url: String,

    #[arg(long, env = "DOCINTEL_PADDLEOCR_URL", default_value = "http://localhost:5001/ocr")]
    paddleocr_url: String,

    #[arg(long, env = "DOCINTEL_EASYOCR_URL", default_value = "http://localhost:5004/ocr")]
    easyocr_url: String,

    #[arg(long, env = "DOCINTEL_DOTS_OCR_URL", default_value = "http://localhost:5002/ocr")]
    dots_ocr_url: String,

    /// Timeout for OCR and crawl requests in seconds
    #[arg(long, env = "DOCINTEL_PROVIDER_TIMEOUT_SECS", default_value_t = 30)]
    provider_timeout_secs: u64,

    #[arg(long, env = "DOCINTEL_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    #[arg(long, env = "DOCINTEL_CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    #[arg(long, value_enum, default_value_t = LogFormat::Plaintext)]
    log_format: LogFormat,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            bind_addr: args.bind,
            postgres_uri: args.postgres_uri.filter(|uri| !uri.trim().is_empty()),
            environment: args.environment,
            allowed_origin: args.allowed_origin,
            max_body_bytes: args.max_body_bytes,
            max_upload_bytes: args.max_upload_bytes,
            providers: ProviderConfig {
                ocr_url: args.ocr_url,
                paddleocr_url: args.paddleocr_url,
                easyocr_url: args.easyocr_url,
                dots_ocr_url: args.dots_ocr_url,
                request_timeout_secs: args.provider_timeout_secs,
                embedding_model: args.embedding_model,
                chat_model: args.chat_model,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.log_level, args.log_format)?;

    docintel_lib::run(args.into()).await
}
