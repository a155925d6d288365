//! HTTP router, middleware stack and server loop

use crate::config::Config;
use crate::error::ErrorDetails;
use crate::handlers;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{
        header::{self, HeaderName, HeaderValue},
        Method,
    },
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

const ALLOWED_HEADERS: [&str; 4] = ["authorization", "x-client-info", "apikey", "content-type"];

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config.allowed_origin.trim() {
        "*" => AllowOrigin::any(),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                tracing::warn!(origin, error = %e, "Invalid allowed origin, falling back to any");
                AllowOrigin::any()
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(ALLOWED_HEADERS.map(HeaderName::from_static))
}

/// Copies the `ErrorDetails` extension into the JSON envelope outside production
async fn attach_error_details(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if state.config.environment.is_production() {
        return response;
    }
    let Some(ErrorDetails(details)) = response.extensions().get::<ErrorDetails>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Could not buffer error body");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut envelope)) => {
            envelope.insert("details".to_string(), Value::String(details));
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from(Value::Object(envelope).to_string())
        }
        _ => Body::from(bytes),
    };
    Response::from_parts(parts, body)
}

/// Builds the application router with all routes and middleware
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let functions = Router::new()
        .route("/fetch-github-archive", get(handlers::archive::fetch_archive))
        .route("/get-github-analysis", get(handlers::archive::get_analysis))
        .route("/save-github-analysis", post(handlers::archive::save_analysis))
        .route(
            "/delete-github-analysis",
            post(handlers::archive::delete_analysis).delete(handlers::archive::delete_analysis),
        )
        .route("/toggle-star-analysis", post(handlers::archive::toggle_star))
        .route(
            "/update-analysis-metadata",
            post(handlers::archive::update_metadata),
        )
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::ingest_document),
        )
        .route("/documents/:id", delete(handlers::documents::delete_document))
        .route("/rag-query", post(handlers::documents::rag_query))
        .route("/crawl", post(handlers::crawl::crawl))
        .route("/crawl-batch", post(handlers::crawl::crawl_batch))
        .route(
            "/ocr",
            post(handlers::ocr::run_ocr).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        );

    let middleware_stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ));

    Router::new()
        .nest("/functions/v1", functions)
        .route("/health", get(handlers::health::health_check))
        .layer(from_fn_with_state(state.clone(), attach_error_details))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
        .layer(middleware_stack)
}

/// Binds the configured address and serves until the process is stopped
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
