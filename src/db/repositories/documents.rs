use crate::db::models::{Document, DocumentChunk, DocumentSummary};
use crate::db::repositories::{in_transaction, with_connection, Pagination};
use crate::db::schema::{document_chunks, documents};
use crate::db::DbError;
use chrono::Utc;
use diesel::prelude::*;
use pgvector::Vector;
use uuid::Uuid;

/// A chunk ready to be stored alongside its parent document
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub token_count: usize,
    pub embedding: Vec<f32>,
}

/// Repository for Document CRUD operations
#[derive(Debug, Default)]
pub struct DocumentRepository;

impl DocumentRepository {
    pub fn new() -> Self {
        Self {}
    }

    /// List documents newest first, without their content
    pub async fn list_summaries(
        &self,
        pagination: Pagination,
    ) -> Result<Vec<DocumentSummary>, DbError> {
        with_connection(move |conn| {
            documents::table
                .select(DocumentSummary::as_select())
                .order(documents::created_at.desc())
                .limit(pagination.limit)
                .offset(pagination.offset)
                .load::<DocumentSummary>(conn)
                .map_err(DbError::QueryError)
        })
        .await
    }

    /// Insert a document and all of its embedded chunks atomically
    pub async fn create_with_chunks(
        &self,
        document: Document,
        chunks: Vec<NewChunk>,
    ) -> Result<(Document, usize), DbError> {
        in_transaction(move |conn| {
            let document = diesel::insert_into(documents::table)
                .values(&document)
                .get_result::<Document>(conn)
                .map_err(DbError::QueryError)?;

            let now = Utc::now();
            let rows: Vec<DocumentChunk> = chunks
                .into_iter()
                .enumerate()
                .map(|(index, chunk)| DocumentChunk {
                    id: Uuid::new_v4(),
                    document_id: document.id,
                    chunk_index: index as i32,
                    content: chunk.content,
                    token_count: chunk.token_count as i32,
                    embedding: Vector::from(chunk.embedding),
                    created_at: now,
                })
                .collect();

            let inserted = diesel::insert_into(document_chunks::table)
                .values(&rows)
                .execute(conn)
                .map_err(|e| DbError::PgVectorError(format!("Failed to store chunks: {}", e)))?;

            tracing::debug!(document_id = %document.id, chunks = inserted, "Stored document");
            Ok((document, inserted))
        })
        .await
    }

    /// Delete a document by id; chunks cascade. Returns whether a row was removed.
    pub async fn delete_by_id(&self, id: Uuid) -> Result<bool, DbError> {
        let count = with_connection(move |conn| {
            diesel::delete(documents::table.filter(documents::id.eq(id)))
                .execute(conn)
                .map_err(DbError::QueryError)
        })
        .await?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_without_pool_is_not_initialized() {
        let result = DocumentRepository::new().delete_by_id(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DbError::NotInitialized)));
    }
}
