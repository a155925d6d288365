use crate::db::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// GithubAnalysis model
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    AsChangeset,
    Clone,
    PartialEq,
)]
#[diesel(table_name = github_analyses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GithubAnalysis {
    pub id: Uuid,
    pub repository_url: String,
    pub repository_name: String,
    pub analysis_data: serde_json::Value,
    pub tags: Vec<String>,
    pub collections: Vec<String>,
    pub notes: Option<String>,
    pub pinned: bool,
    pub starred: bool,
    pub metadata: serde_json::Value,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GithubAnalysis {
    /// Build a fresh row for a newly analyzed repository.
    pub fn new(
        repository_url: String,
        repository_name: String,
        analysis_data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repository_url,
            repository_name,
            analysis_data,
            tags: Vec::new(),
            collections: Vec::new(),
            notes: None,
            pinned: false,
            starred: false,
            metadata: serde_json::json!({}),
            last_viewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `analysis_data.metadata.language`, if the analysis recorded one.
    pub fn language(&self) -> Option<&str> {
        self.analysis_data
            .get("metadata")
            .and_then(|m| m.get("language"))
            .and_then(|l| l.as_str())
    }

    /// `analysis_data.metadata.stars`, if the analysis recorded one.
    pub fn stars(&self) -> Option<f64> {
        self.analysis_data
            .get("metadata")
            .and_then(|m| m.get("stars"))
            .and_then(|s| s.as_f64())
    }
}

/// Partial update for the user-editable archive fields.
///
/// `None` leaves a column untouched; `notes: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = github_analyses)]
pub struct AnalysisChanges {
    pub tags: Option<Vec<String>>,
    pub collections: Option<Vec<String>>,
    pub notes: Option<Option<String>>,
    pub pinned: Option<bool>,
    pub starred: Option<bool>,
    pub metadata: Option<serde_json::Value>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnalysisChanges {
    /// True when no user-editable field is set (`updated_at` does not count).
    pub fn is_empty(&self) -> bool {
        self.tags.is_none()
            && self.collections.is_none()
            && self.notes.is_none()
            && self.pinned.is_none()
            && self.starred.is_none()
            && self.metadata.is_none()
            && self.last_viewed_at.is_none()
    }

    /// Apply the changes to an in-memory row.
    pub fn apply_to(&self, row: &mut GithubAnalysis) {
        if let Some(tags) = &self.tags {
            row.tags = tags.clone();
        }
        if let Some(collections) = &self.collections {
            row.collections = collections.clone();
        }
        if let Some(notes) = &self.notes {
            row.notes = notes.clone();
        }
        if let Some(pinned) = self.pinned {
            row.pinned = pinned;
        }
        if let Some(starred) = self.starred {
            row.starred = starred;
        }
        if let Some(metadata) = &self.metadata {
            row.metadata = metadata.clone();
        }
        if let Some(viewed) = self.last_viewed_at {
            row.last_viewed_at = Some(viewed);
        }
        if let Some(updated) = self.updated_at {
            row.updated_at = updated;
        }
    }
}

// Document model
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Queryable,
    Selectable,
    Identifiable,
    Insertable,
    AsChangeset,
    Clone,
)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document listing row without the (potentially large) content column.
#[derive(Debug, Serialize, Deserialize, Queryable, Selectable, Clone)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    pub source_type: String,
    pub source_ref: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Where a document's text came from
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Upload,
    Ocr,
    Crawl,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Upload => "upload",
            SourceType::Ocr => "ocr",
            SourceType::Crawl => "crawl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(SourceType::Upload),
            "ocr" => Some(SourceType::Ocr),
            "crawl" => Some(SourceType::Crawl),
            _ => None,
        }
    }
}

// DocumentChunk model
#[derive(Debug, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = document_chunks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub content: String,
    pub token_count: i32,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
}
