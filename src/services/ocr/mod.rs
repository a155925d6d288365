//! OCR provider proxy

pub mod grounding;
pub mod options;

pub use grounding::Detection;
pub use options::{OcrMode, OcrOptions, OcrProvider};

use crate::config::ProviderConfig;
use crate::error::ApiError;
use crate::services::ProviderError;
use crate::validation::ValidationError;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;
use std::time::Duration;

// Text shown when the provider answered with nothing
const EMPTY_OUTPUT: &str = "No text returned by model.";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// An uploaded image or PDF
#[derive(Debug, Clone)]
pub struct OcrUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

impl OcrUpload {
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(PDF_MAGIC)
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
    }

    fn media_type(&self) -> String {
        if self.is_pdf() {
            return "application/pdf".to_string();
        }
        self.content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageDims {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrMetadata {
    pub provider: OcrProvider,
    pub mode: OcrMode,
    pub grounding: bool,
    /// Page count, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
}

/// Post-processed provider output
#[derive(Debug, Clone, Serialize)]
pub struct OcrOutcome {
    pub success: bool,
    pub text: String,
    pub raw_text: String,
    pub boxes: Vec<Detection>,
    /// `None` for PDFs, which are not measured locally
    pub image_dims: Option<ImageDims>,
    pub metadata: OcrMetadata,
}

/// Reads the pixel size from the image header
pub fn image_dimensions(bytes: &[u8]) -> Result<ImageDims, ValidationError> {
    let unsupported = |reason: String| ValidationError::InvalidValue {
        field: "image",
        reason,
    };

    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| unsupported(e.to_string()))?
        .into_dimensions()
        .map_err(|e| unsupported(e.to_string()))?;
    Ok(ImageDims { w, h })
}

/// Turns raw provider text into display text plus scaled boxes.
///
/// Boxes need the pixel size, so without `dims` only the tags are stripped.
pub fn postprocess(raw_text: &str, dims: Option<ImageDims>, options: &OcrOptions) -> OcrOutcome {
    let raw_text = match raw_text.trim() {
        "" => EMPTY_OUTPUT.to_string(),
        trimmed => trimmed.to_string(),
    };

    let (mut text, boxes) = if grounding::has_grounding(&raw_text) {
        let boxes = dims
            .map(|d| grounding::parse_detections(&raw_text, d.w.max(1), d.h.max(1)))
            .unwrap_or_default();
        (grounding::clean_grounding_text(&raw_text), boxes)
    } else {
        (raw_text.clone(), Vec::new())
    };

    if text.is_empty() && !boxes.is_empty() {
        text = boxes
            .iter()
            .map(|b| b.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
    }

    OcrOutcome {
        success: true,
        text,
        raw_text,
        boxes,
        image_dims: dims,
        metadata: OcrMetadata {
            provider: options.provider,
            mode: options.mode,
            grounding: options.effective_grounding(),
            pages: None,
        },
    }
}

/// What a provider answered, before post-processing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub pages: Option<u64>,
}

// Providers answer with `{text}` / `{raw_text}` JSON or with plain text.
// A JSON body with `success: false` is a failure even on a 2xx status.
fn provider_reply(body: &str) -> Result<ProviderReply, ProviderError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                let reason = map
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("provider reported failure");
                return Err(ProviderError::InvalidResponse(reason.to_string()));
            }
            let text = ["raw_text", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            let pages = map
                .get("metadata")
                .and_then(|m| m.get("pages"))
                .and_then(Value::as_u64);
            Ok(ProviderReply { text, pages })
        }
        Ok(Value::String(text)) => Ok(ProviderReply { text, pages: None }),
        _ => Ok(ProviderReply {
            text: body.to_string(),
            pages: None,
        }),
    }
}

#[derive(Debug, Serialize)]
struct EncodedDocument {
    base64_data: String,
    content_type: String,
}

/// HTTP client for the configured OCR providers
#[derive(Debug, Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    deepseek_url: String,
    paddleocr_url: String,
    easyocr_url: String,
    dots_ocr_url: String,
}

impl OcrClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            deepseek_url: config.ocr_url.clone(),
            paddleocr_url: config.paddleocr_url.clone(),
            easyocr_url: config.easyocr_url.clone(),
            dots_ocr_url: config.dots_ocr_url.clone(),
        })
    }

    fn endpoint(&self, provider: OcrProvider) -> &str {
        match provider {
            OcrProvider::Deepseek => &self.deepseek_url,
            OcrProvider::Paddleocr => &self.paddleocr_url,
            OcrProvider::Easyocr => &self.easyocr_url,
            OcrProvider::DotsOcr => &self.dots_ocr_url,
        }
    }

    /// Sends the upload to the selected provider, returning its reply
    pub async fn recognize(
        &self,
        upload: OcrUpload,
        options: &OcrOptions,
    ) -> Result<ProviderReply, ProviderError> {
        let endpoint = self.endpoint(options.provider);
        let request = match options.provider {
            OcrProvider::Deepseek => {
                let mut part = Part::bytes(upload.bytes).file_name(upload.file_name);
                if let Some(content_type) = upload.content_type.as_deref() {
                    part = part.mime_str(content_type)?;
                }
                let form = options
                    .form_fields()
                    .into_iter()
                    .fold(Form::new().part("image", part), |form, (name, value)| {
                        form.text(name, value)
                    });
                self.http.post(endpoint).multipart(form)
            }
            _ => {
                let document = EncodedDocument {
                    content_type: upload.media_type(),
                    base64_data: STANDARD.encode(&upload.bytes),
                };
                self.http.post(endpoint).json(&document)
            }
        };

        tracing::debug!(
            endpoint,
            provider = options.provider.as_str(),
            mode = options.mode.as_str(),
            "Calling OCR provider"
        );
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        provider_reply(&body)
    }

    /// Full OCR round trip: size check, provider call, post-processing
    pub async fn run(
        &self,
        upload: OcrUpload,
        options: &OcrOptions,
    ) -> Result<OcrOutcome, ApiError> {
        let dims = if upload.is_pdf() {
            if !options.provider.accepts_pdf() {
                return Err(ValidationError::InvalidValue {
                    field: "provider",
                    reason: format!("{} does not accept PDF uploads", options.provider.as_str()),
                }
                .into());
            }
            None
        } else {
            Some(image_dimensions(&upload.bytes)?)
        };

        let reply = self.recognize(upload, options).await?;
        let mut outcome = postprocess(&reply.text, dims, options);
        outcome.metadata.pages = reply.pages;
        tracing::info!(
            provider = options.provider.as_str(),
            mode = options.mode.as_str(),
            boxes = outcome.boxes.len(),
            chars = outcome.text.len(),
            "OCR completed"
        );
        Ok(outcome)
    }
}
