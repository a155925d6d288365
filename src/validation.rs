//! Request contracts for the archive, document and provider endpoints.
//!
//! Bodies are validated as loose JSON objects so that a field which is
//! absent, `null`, or of the wrong type can each be reported precisely.

use crate::db::models::{AnalysisChanges, SourceType};
use crate::db::repositories::github_analyses::{ArchiveFilter, ArchiveSort};
use crate::db::repositories::Pagination;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_NAME_LENGTH: usize = 512;
pub const MAX_LABELS: usize = 50;
pub const MAX_LABEL_LENGTH: usize = 100;
pub const MAX_NOTES_LENGTH: usize = 10_000;
pub const MAX_SEARCH_LENGTH: usize = 200;
pub const MAX_TITLE_LENGTH: usize = 500;
pub const MAX_QUESTION_LENGTH: usize = 4_000;
pub const MAX_BATCH_URLS: usize = 10;
pub const DEFAULT_TOP_K: i64 = 5;
pub const MAX_TOP_K: i64 = 20;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    Missing(&'static str),

    #[error("{field} must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds maximum length of {max}")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} has more than {max} items")]
    TooMany { field: &'static str, max: usize },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("No updatable fields provided")]
    NoUpdatableFields,
}

type Fields = Map<String, Value>;

fn required_string(
    body: &Fields,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(ValidationError::Missing(field)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(ValidationError::Empty { field })
            } else if trimmed.chars().count() > max {
                Err(ValidationError::TooLong { field, max })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(ValidationError::InvalidType {
            field,
            expected: "a string",
        }),
    }
}

fn optional_bool(body: &Fields, field: &'static str) -> Result<Option<bool>, ValidationError> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ValidationError::InvalidType {
            field,
            expected: "a boolean",
        }),
    }
}

fn optional_labels(
    body: &Fields,
    field: &'static str,
) -> Result<Option<Vec<String>>, ValidationError> {
    let items = match body.get(field) {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field,
                expected: "an array of strings",
            })
        }
    };

    if items.len() > MAX_LABELS {
        return Err(ValidationError::TooMany {
            field,
            max: MAX_LABELS,
        });
    }

    let mut labels = Vec::with_capacity(items.len());
    for item in items {
        let label = item.as_str().ok_or(ValidationError::InvalidType {
            field,
            expected: "an array of strings",
        })?;
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if label.chars().count() > MAX_LABEL_LENGTH {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_LABEL_LENGTH,
            });
        }
        labels.push(label.to_string());
    }
    Ok(Some(labels))
}

/// `repository_url`: required string, non-blank, at most 2048 characters
pub fn repository_url(body: &Fields) -> Result<String, ValidationError> {
    required_string(body, "repository_url", MAX_URL_LENGTH)
}

/// Body of a toggle-star request
#[derive(Debug, Clone, PartialEq)]
pub struct StarToggle {
    pub repository_url: String,
    pub starred: bool,
}

pub fn star_toggle(body: &Fields) -> Result<StarToggle, ValidationError> {
    let repository_url = repository_url(body)?;
    let starred = optional_bool(body, "starred")?.ok_or(ValidationError::Missing("starred"))?;
    Ok(StarToggle {
        repository_url,
        starred,
    })
}

/// Body of a metadata-update request
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUpdate {
    pub repository_url: String,
    pub changes: AnalysisChanges,
}

pub fn metadata_update(body: &Fields) -> Result<MetadataUpdate, ValidationError> {
    let repository_url = repository_url(body)?;

    let notes = match body.get("notes") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => {
            if s.chars().count() > MAX_NOTES_LENGTH {
                return Err(ValidationError::TooLong {
                    field: "notes",
                    max: MAX_NOTES_LENGTH,
                });
            }
            Some(Some(s.clone()))
        }
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "notes",
                expected: "a string or null",
            })
        }
    };

    let metadata = match body.get("metadata") {
        None => None,
        Some(value @ Value::Object(_)) => Some(value.clone()),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "metadata",
                expected: "an object",
            })
        }
    };

    let last_viewed_at = match body.get("last_viewed_at") {
        None => None,
        Some(Value::String(s)) => Some(
            DateTime::parse_from_rfc3339(s)
                .map_err(|e| ValidationError::InvalidValue {
                    field: "last_viewed_at",
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc),
        ),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "last_viewed_at",
                expected: "an RFC 3339 timestamp string",
            })
        }
    };

    let changes = AnalysisChanges {
        tags: optional_labels(body, "tags")?,
        collections: optional_labels(body, "collections")?,
        notes,
        pinned: optional_bool(body, "pinned")?,
        starred: optional_bool(body, "starred")?,
        metadata,
        last_viewed_at,
        updated_at: None,
    };

    if changes.is_empty() {
        return Err(ValidationError::NoUpdatableFields);
    }

    Ok(MetadataUpdate {
        repository_url,
        changes,
    })
}

/// Body of a save-analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct SaveAnalysis {
    pub repository_url: String,
    pub repository_name: String,
    pub analysis_data: Value,
}

pub fn save_analysis(body: &Fields) -> Result<SaveAnalysis, ValidationError> {
    let repository_url = repository_url(body)?;
    let repository_name = required_string(body, "repository_name", MAX_NAME_LENGTH)?;
    let analysis_data = match body.get("analysis_data") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("analysis_data")),
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "analysis_data",
                expected: "an object",
            })
        }
    };
    Ok(SaveAnalysis {
        repository_url,
        repository_name,
        analysis_data,
    })
}

fn query_i64(
    params: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<i64>, ValidationError> {
    params
        .get(field)
        .map(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidType {
                    field,
                    expected: "an integer",
                })
        })
        .transpose()
}

fn query_bool(
    params: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<bool>, ValidationError> {
    params
        .get(field)
        .map(|raw| match raw.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ValidationError::InvalidType {
                field,
                expected: "true or false",
            }),
        })
        .transpose()
}

fn query_text(
    params: &HashMap<String, String>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match params.get(field).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(s) if s.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(s) => Ok(Some(s.to_string())),
    }
}

/// `limit` (1..=100, default 20) and `offset` (>= 0, default 0)
pub fn pagination(params: &HashMap<String, String>) -> Result<Pagination, ValidationError> {
    let limit = query_i64(params, "limit")?.unwrap_or(Pagination::DEFAULT_LIMIT);
    if !(1..=Pagination::MAX_LIMIT).contains(&limit) {
        return Err(ValidationError::InvalidValue {
            field: "limit",
            reason: format!("must be between 1 and {}", Pagination::MAX_LIMIT),
        });
    }

    let offset = query_i64(params, "offset")?.unwrap_or(0);
    if offset < 0 {
        return Err(ValidationError::InvalidValue {
            field: "offset",
            reason: "must not be negative".to_string(),
        });
    }

    Ok(Pagination { limit, offset })
}

/// Query string of the archive listing
pub fn archive_filter(params: &HashMap<String, String>) -> Result<ArchiveFilter, ValidationError> {
    let sort = match query_text(params, "sortBy", 32)? {
        None => ArchiveSort::default(),
        Some(raw) => ArchiveSort::parse(&raw).ok_or_else(|| ValidationError::InvalidValue {
            field: "sortBy",
            reason: format!("unknown sort '{}'", raw),
        })?,
    };

    Ok(ArchiveFilter {
        search: query_text(params, "search", MAX_SEARCH_LENGTH)?,
        language: query_text(params, "language", MAX_LABEL_LENGTH)?,
        starred: query_bool(params, "starred")?,
        pinned: query_bool(params, "pinned")?,
        collection: query_text(params, "collection", MAX_LABEL_LENGTH)?,
        sort,
        pagination: pagination(params)?,
    })
}

/// `repository_url` query parameter of the single-analysis lookup
pub fn repository_url_param(params: &HashMap<String, String>) -> Result<String, ValidationError> {
    match query_text(params, "repository_url", MAX_URL_LENGTH)? {
        Some(url) => Ok(url),
        None => Err(ValidationError::Missing("repository_url")),
    }
}

/// Body of a document ingestion request
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub source_type: SourceType,
    pub source_ref: Option<String>,
    pub metadata: Value,
}

pub fn new_document(body: &Fields) -> Result<NewDocument, ValidationError> {
    let title = required_string(body, "title", MAX_TITLE_LENGTH)?;
    let content = match body.get("content") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("content")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ValidationError::Empty { field: "content" })
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "content",
                expected: "a string",
            })
        }
    };

    let source_type = match body.get("source_type") {
        None | Some(Value::Null) => SourceType::default(),
        Some(Value::String(s)) => {
            SourceType::parse(s).ok_or_else(|| ValidationError::InvalidValue {
                field: "source_type",
                reason: format!("unknown source type '{}'", s),
            })?
        }
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "source_type",
                expected: "a string",
            })
        }
    };

    let source_ref = match body.get("source_ref") {
        None | Some(Value::Null) => None,
        Some(_) => Some(required_string(body, "source_ref", MAX_URL_LENGTH)?),
    };

    let metadata = match body.get("metadata") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value @ Value::Object(_)) => value.clone(),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "metadata",
                expected: "an object",
            })
        }
    };

    Ok(NewDocument {
        title,
        content,
        source_type,
        source_ref,
        metadata,
    })
}

/// Body of a RAG question
#[derive(Debug, Clone, PartialEq)]
pub struct RagQuestion {
    pub question: String,
    pub document_ids: Option<Vec<Uuid>>,
    pub top_k: i64,
}

pub fn rag_question(body: &Fields) -> Result<RagQuestion, ValidationError> {
    let question = required_string(body, "question", MAX_QUESTION_LENGTH)?;

    let document_ids = match body.get("document_ids") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            let ids = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .and_then(|s| Uuid::parse_str(s).ok())
                        .ok_or(ValidationError::InvalidType {
                            field: "document_ids",
                            expected: "an array of UUID strings",
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Some(ids)
        }
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "document_ids",
                expected: "an array of UUID strings",
            })
        }
    };

    let top_k = match body.get("top_k") {
        None | Some(Value::Null) => DEFAULT_TOP_K,
        Some(value) => value.as_i64().ok_or(ValidationError::InvalidType {
            field: "top_k",
            expected: "an integer",
        })?,
    };
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return Err(ValidationError::InvalidValue {
            field: "top_k",
            reason: format!("must be between 1 and {}", MAX_TOP_K),
        });
    }

    Ok(RagQuestion {
        question,
        document_ids,
        top_k,
    })
}

fn http_url(raw: &str, field: &'static str) -> Result<url::Url, ValidationError> {
    let parsed = url::Url::parse(raw).map_err(|e| ValidationError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ValidationError::InvalidValue {
            field,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// `url` of a crawl request: absolute http(s) URL
pub fn crawl_url(body: &Fields) -> Result<url::Url, ValidationError> {
    let raw = required_string(body, "url", MAX_URL_LENGTH)?;
    http_url(&raw, "url")
}

/// `urls` of a batch crawl: 1 to 10 absolute http(s) URLs
pub fn crawl_urls(body: &Fields) -> Result<Vec<url::Url>, ValidationError> {
    const EXPECTED: &str = "an array of URL strings";

    let items = match body.get("urls") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("urls")),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "urls",
                expected: EXPECTED,
            })
        }
    };
    if items.is_empty() {
        return Err(ValidationError::Empty { field: "urls" });
    }
    if items.len() > MAX_BATCH_URLS {
        return Err(ValidationError::TooMany {
            field: "urls",
            max: MAX_BATCH_URLS,
        });
    }

    items
        .iter()
        .map(|item| {
            let raw = item.as_str().ok_or(ValidationError::InvalidType {
                field: "urls",
                expected: EXPECTED,
            })?;
            if raw.chars().count() > MAX_URL_LENGTH {
                return Err(ValidationError::TooLong {
                    field: "urls",
                    max: MAX_URL_LENGTH,
                });
            }
            http_url(raw.trim(), "urls")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("test body must be an object"),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repository_url_length_cap() {
        let ok = "a".repeat(MAX_URL_LENGTH);
        assert!(repository_url(&fields(json!({ "repository_url": ok }))).is_ok());

        let long = "a".repeat(MAX_URL_LENGTH + 1);
        assert_eq!(
            repository_url(&fields(json!({ "repository_url": long }))),
            Err(ValidationError::TooLong {
                field: "repository_url",
                max: MAX_URL_LENGTH
            })
        );
    }

    #[test]
    fn repository_url_must_be_string() {
        assert_eq!(
            repository_url(&fields(json!({}))),
            Err(ValidationError::Missing("repository_url"))
        );
        assert!(matches!(
            repository_url(&fields(json!({ "repository_url": 42 }))),
            Err(ValidationError::InvalidType { .. })
        ));
        assert_eq!(
            repository_url(&fields(json!({ "repository_url": "   " }))),
            Err(ValidationError::Empty {
                field: "repository_url"
            })
        );
    }

    #[test]
    fn star_toggle_requires_boolean() {
        let body = fields(json!({ "repository_url": "https://github.com/a/b", "starred": "yes" }));
        assert!(matches!(
            star_toggle(&body),
            Err(ValidationError::InvalidType {
                field: "starred",
                ..
            })
        ));

        let body = fields(json!({ "repository_url": "https://github.com/a/b" }));
        assert_eq!(star_toggle(&body), Err(ValidationError::Missing("starred")));

        let body = fields(json!({ "repository_url": "https://github.com/a/b", "starred": true }));
        assert!(star_toggle(&body).unwrap().starred);
    }

    #[test]
    fn metadata_update_needs_a_field() {
        let body = fields(json!({ "repository_url": "https://github.com/a/b", "unknown": 1 }));
        assert_eq!(
            metadata_update(&body),
            Err(ValidationError::NoUpdatableFields)
        );
    }

    #[test]
    fn metadata_update_null_notes_clears() {
        let body = fields(json!({ "repository_url": "https://github.com/a/b", "notes": null }));
        let update = metadata_update(&body).unwrap();
        assert_eq!(update.changes.notes, Some(None));
    }

    #[test]
    fn metadata_update_parses_every_field() {
        let body = fields(json!({
            "repository_url": "https://github.com/a/b",
            "tags": [" rust ", "web"],
            "collections": ["favorites"],
            "notes": "worth a look",
            "pinned": true,
            "starred": false,
            "metadata": { "color": "blue" },
            "last_viewed_at": "2025-02-01T10:00:00Z"
        }));
        let update = metadata_update(&body).unwrap();
        assert_eq!(
            update.changes.tags,
            Some(vec!["rust".to_string(), "web".to_string()])
        );
        assert_eq!(update.changes.pinned, Some(true));
        assert_eq!(update.changes.starred, Some(false));
        assert!(update.changes.last_viewed_at.is_some());
    }

    #[test]
    fn metadata_update_rejects_bad_labels() {
        let body = fields(json!({ "repository_url": "u", "tags": ["ok", 3] }));
        assert!(matches!(
            metadata_update(&body),
            Err(ValidationError::InvalidType { field: "tags", .. })
        ));

        let too_many: Vec<String> = (0..=MAX_LABELS).map(|i| format!("t{}", i)).collect();
        let body = fields(json!({ "repository_url": "u", "collections": too_many }));
        assert!(matches!(
            metadata_update(&body),
            Err(ValidationError::TooMany {
                field: "collections",
                ..
            })
        ));

        let body = fields(json!({ "repository_url": "u", "last_viewed_at": "yesterday" }));
        assert!(matches!(
            metadata_update(&body),
            Err(ValidationError::InvalidValue {
                field: "last_viewed_at",
                ..
            })
        ));
    }

    #[test]
    fn archive_filter_defaults() {
        let filter = archive_filter(&HashMap::new()).unwrap();
        assert_eq!(filter.sort, ArchiveSort::Recent);
        assert_eq!(filter.pagination, Pagination::default());
        assert!(filter.search.is_none());
    }

    #[test]
    fn archive_filter_rejects_bad_params() {
        assert!(archive_filter(&params(&[("limit", "abc")])).is_err());
        assert!(archive_filter(&params(&[("limit", "0")])).is_err());
        assert!(archive_filter(&params(&[("limit", "101")])).is_err());
        assert!(archive_filter(&params(&[("offset", "-1")])).is_err());
        assert!(archive_filter(&params(&[("sortBy", "popularity")])).is_err());
        assert!(archive_filter(&params(&[("starred", "maybe")])).is_err());
    }

    #[test]
    fn archive_filter_blank_search_is_ignored() {
        let filter =
            archive_filter(&params(&[("search", "  "), ("language", "Rust")])).unwrap();
        assert!(filter.search.is_none());
        assert_eq!(filter.language.as_deref(), Some("Rust"));
    }

    #[test]
    fn rag_question_bounds_top_k() {
        let body = fields(json!({ "question": "What is this?" }));
        assert_eq!(rag_question(&body).unwrap().top_k, DEFAULT_TOP_K);

        let body = fields(json!({ "question": "q", "top_k": 50 }));
        assert!(rag_question(&body).is_err());

        let body = fields(json!({ "question": "q", "document_ids": ["not-a-uuid"] }));
        assert!(rag_question(&body).is_err());
    }

    #[test]
    fn new_document_defaults_source_type() {
        let body = fields(json!({ "title": "Invoice", "content": "Total: 42" }));
        let doc = new_document(&body).unwrap();
        assert_eq!(doc.source_type, SourceType::Upload);
        assert_eq!(doc.metadata, json!({}));

        let body = fields(json!({ "title": "Invoice", "content": "x", "source_type": "fax" }));
        assert!(new_document(&body).is_err());
    }

    #[test]
    fn crawl_url_requires_http() {
        assert!(crawl_url(&fields(json!({ "url": "https://example.com" }))).is_ok());
        assert!(crawl_url(&fields(json!({ "url": "ftp://example.com" }))).is_err());
        assert!(crawl_url(&fields(json!({ "url": "not a url" }))).is_err());
    }

    #[test]
    fn crawl_urls_bounds_and_schemes() {
        let urls = crawl_urls(&fields(json!({ "urls": ["https://a.example", " http://b.example/x "] })))
            .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].as_str(), "http://b.example/x");

        assert_eq!(
            crawl_urls(&fields(json!({}))),
            Err(ValidationError::Missing("urls"))
        );
        assert_eq!(
            crawl_urls(&fields(json!({ "urls": [] }))),
            Err(ValidationError::Empty { field: "urls" })
        );
        let many: Vec<String> = (0..=MAX_BATCH_URLS)
            .map(|i| format!("https://example.com/{}", i))
            .collect();
        assert!(matches!(
            crawl_urls(&fields(json!({ "urls": many }))),
            Err(ValidationError::TooMany { .. })
        ));
        assert!(crawl_urls(&fields(json!({ "urls": ["file:///etc/passwd"] }))).is_err());
        assert!(crawl_urls(&fields(json!({ "urls": [42] }))).is_err());
    }
}
