use crate::db::models::{Document, DocumentSummary};
use crate::db::pgvector::{self, ChunkMatch};
use crate::db::repositories::documents::{DocumentRepository, NewChunk};
use crate::db::repositories::Pagination;
use crate::services::intelligence::{CHUNK_OVERLAP_TOKENS, CHUNK_TOKENS};
use crate::services::{IntelligenceService, ServiceError};
use crate::validation::{NewDocument, RagQuestion};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Characters of chunk text returned with each source
const EXCERPT_CHARS: usize = 300;

/// Answer given when retrieval finds nothing to ground on
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant information in the selected documents to answer this question.";

const SYSTEM_PROMPT: &str = "You answer questions about the user's documents. \
Use only the numbered sources provided. Cite sources inline as [1], [2], ... \
If the sources do not contain the answer, say so plainly.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedDocument {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagSource {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_index: i32,
    pub similarity: f32,
    pub excerpt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RagSource>,
}

/// Shortens chunk text to at most `max_chars` characters on a word boundary
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let content = content.trim();
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let cut: String = content.chars().take(max_chars).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}

/// User prompt listing each match as a numbered source ahead of the question
pub fn build_prompt(question: &str, matches: &[ChunkMatch]) -> String {
    let mut prompt = String::from("Sources:\n\n");
    for (i, chunk) in matches.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} (part {})\n{}\n\n",
            i + 1,
            chunk.title,
            chunk.chunk_index + 1,
            chunk.content.trim()
        ));
    }
    prompt.push_str(&format!("Question: {}", question));
    prompt
}

fn to_source(chunk: &ChunkMatch) -> RagSource {
    RagSource {
        document_id: chunk.document_id,
        title: chunk.title.clone(),
        chunk_index: chunk.chunk_index,
        similarity: chunk.similarity,
        excerpt: excerpt(&chunk.content, EXCERPT_CHARS),
    }
}

/// Document ingestion and retrieval-augmented answering
#[derive(Debug, Clone)]
pub struct RagService {
    intelligence: Arc<IntelligenceService>,
    documents: Arc<DocumentRepository>,
}

impl RagService {
    pub fn new(intelligence: Arc<IntelligenceService>) -> Self {
        Self {
            intelligence,
            documents: Arc::new(DocumentRepository::new()),
        }
    }

    /// Chunks, embeds and stores a document with its chunks in one transaction
    pub async fn ingest(&self, request: NewDocument) -> Result<IngestedDocument, ServiceError> {
        let chunks =
            self.intelligence
                .chunk_text(&request.content, CHUNK_TOKENS, CHUNK_OVERLAP_TOKENS)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.intelligence.embed(&texts).await?;

        let new_chunks = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                content: chunk.content,
                token_count: chunk.token_count,
                embedding,
            })
            .collect();

        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            title: request.title,
            source_type: request.source_type.as_str().to_string(),
            source_ref: request.source_ref,
            content: request.content,
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        };

        let (document, chunk_count) = self
            .documents
            .create_with_chunks(document, new_chunks)
            .await?;
        tracing::info!(document_id = %document.id, chunk_count, "Document ingested");

        Ok(IngestedDocument {
            document_id: document.id,
            title: document.title,
            chunk_count,
        })
    }

    pub async fn list(&self, pagination: Pagination) -> Result<Vec<DocumentSummary>, ServiceError> {
        Ok(self.documents.list_summaries(pagination).await?)
    }

    /// Deletes a document; its chunks go with it
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        if self.documents.delete_by_id(id).await? {
            tracing::info!(document_id = %id, "Document deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("No document found with id {}", id)))
        }
    }

    pub async fn query(&self, request: RagQuestion) -> Result<RagAnswer, ServiceError> {
        let embedding = self.intelligence.embed_one(&request.question).await?;
        let matches =
            pgvector::search_chunks(embedding, request.top_k, request.document_ids).await?;

        if matches.is_empty() {
            tracing::debug!("No chunks matched, skipping chat completion");
            return Ok(RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_prompt(&request.question, &matches);
        let answer = self.intelligence.complete(SYSTEM_PROMPT, &prompt).await?;
        tracing::info!(sources = matches.len(), "RAG answer generated");

        Ok(RagAnswer {
            answer,
            sources: matches.iter().map(to_source).collect(),
        })
    }
}
