//! Request handlers

pub mod archive;
pub mod crawl;
pub mod documents;
pub mod health;
pub mod ocr;

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
};
use serde_json::{Map, Value};

/// A request body that parsed as a JSON object.
///
/// Oversized bodies become 413 and anything that is not a JSON object
/// becomes 400, both in the standard error envelope.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Map<String, Value>);

/// Rejects a request whose declared length already exceeds `limit`
pub fn check_content_length(headers: &HeaderMap, limit: usize) -> Result<(), ApiError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(length) if length > limit as u64 => Err(ApiError::PayloadTooLarge { limit }),
        _ => Ok(()),
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::InvalidJson("request body is empty".to_string()));
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::InvalidJson(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::InvalidJson(e.to_string())),
    }
}

#[axum::async_trait]
impl FromRequest<AppState> for JsonObject {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let limit = state.config.max_body_bytes;
        check_content_length(req.headers(), limit)?;

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::PayloadTooLarge { limit }
                } else {
                    ApiError::InvalidJson(rejection.body_text())
                }
            })?;

        parse_object(&bytes).map(JsonObject)
    }
}
