//! OCR upload endpoint

use crate::error::{ApiError, ApiResult};
use crate::handlers::check_content_length;
use crate::services::ocr::{OcrMode, OcrOptions, OcrOutcome, OcrProvider, OcrUpload};
use crate::state::AppState;
use crate::validation::ValidationError;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};

fn form_bool(field: &'static str, raw: &str) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        _ => Err(ValidationError::InvalidType {
            field,
            expected: "true or false",
        }),
    }
}

fn non_empty(raw: String) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw)
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::Validation(ValidationError::InvalidValue {
            field: "multipart",
            reason: err.body_text(),
        })
    }
}

/// `POST ocr` with multipart fields `image` (or `file`), `provider`, `mode`,
/// `prompt`, `grounding`, `include_caption`, `find_term` and `schema`
pub async fn run_ocr(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> ApiResult<Json<OcrOutcome>> {
    let limit = state.config.max_upload_bytes;
    check_content_length(&headers, limit)?;
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::Validation(ValidationError::InvalidValue {
            field: "multipart",
            reason: rejection.body_text(),
        })
    })?;

    let mut upload = None;
    let mut options = OcrOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" || name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            upload = Some(OcrUpload {
                bytes: bytes.to_vec(),
                file_name,
                content_type,
            });
            continue;
        }

        let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
        match name.as_str() {
            "provider" => {
                options.provider = OcrProvider::parse(&value).ok_or_else(|| {
                    ValidationError::InvalidValue {
                        field: "provider",
                        reason: format!("unknown provider '{}'", value.trim()),
                    }
                })?
            }
            "mode" => {
                options.mode = OcrMode::parse(&value).ok_or_else(|| {
                    ValidationError::InvalidValue {
                        field: "mode",
                        reason: format!("unknown mode '{}'", value.trim()),
                    }
                })?
            }
            "prompt" => options.prompt = non_empty(value),
            "grounding" => options.grounding = form_bool("grounding", &value)?,
            "include_caption" => {
                options.include_caption = form_bool("include_caption", &value)?
            }
            "find_term" => options.find_term = non_empty(value),
            "schema" => options.schema = non_empty(value),
            _ => tracing::debug!(field = %name, "Ignoring unknown multipart field"),
        }
    }

    let upload = upload.ok_or(ValidationError::Missing("image"))?;
    if upload.bytes.is_empty() {
        return Err(ValidationError::Empty { field: "image" }.into());
    }

    Ok(Json(state.ocr.run(upload, &options).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_booleans() {
        assert_eq!(form_bool("grounding", "true"), Ok(true));
        assert_eq!(form_bool("grounding", "0"), Ok(false));
        assert_eq!(form_bool("grounding", ""), Ok(false));
        assert!(form_bool("grounding", "sometimes").is_err());
    }
}
