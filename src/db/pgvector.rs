use crate::db::repositories::with_connection;
use crate::db::DbError;
use diesel::prelude::*;
use diesel::sql_types::{Array, BigInt, Float4, Int4, Text};
use diesel::QueryableByName;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimension of the `document_chunks.embedding` column
pub const EMBEDDING_DIMENSION: usize = 1536;

/// A chunk matched by similarity search, with its parent document's title
#[derive(Debug, Clone, Serialize, Deserialize, QueryableByName)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct ChunkMatch {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub document_id: Uuid,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Int4)]
    pub chunk_index: i32,
    #[diesel(sql_type = Text)]
    pub content: String,
    #[diesel(sql_type = Float4)]
    pub similarity: f32,
}

fn check_dimension(embedding: &[f32]) -> Result<(), DbError> {
    if embedding.is_empty() {
        return Err(DbError::PgVectorError("Empty query vector".to_string()));
    }
    if embedding.len() != EMBEDDING_DIMENSION {
        return Err(DbError::PgVectorError(format!(
            "Expected {} dimensions, got {}",
            EMBEDDING_DIMENSION,
            embedding.len()
        )));
    }
    Ok(())
}

// Build the similarity query; `$1` is the query vector, `$2` the limit and
// `$3` (when filtering) the allowed document ids.
fn build_search_query(filter_documents: bool) -> String {
    let mut query_sql = String::from(
        "SELECT
            c.document_id AS document_id,
            d.title AS title,
            c.chunk_index AS chunk_index,
            c.content AS content,
            (1 - (c.embedding <=> $1))::float4 AS similarity
         FROM document_chunks c
         JOIN documents d ON d.id = c.document_id",
    );

    if filter_documents {
        query_sql.push_str(" WHERE c.document_id = ANY($3)");
    }

    query_sql.push_str(" ORDER BY c.embedding <=> $1 ASC LIMIT $2");
    query_sql
}

/// Cosine-similarity search over stored chunks, best match first
pub async fn search_chunks(
    query_embedding: Vec<f32>,
    top_k: i64,
    document_ids: Option<Vec<Uuid>>,
) -> Result<Vec<ChunkMatch>, DbError> {
    check_dimension(&query_embedding)?;
    tracing::debug!(top_k, filtered = document_ids.is_some(), "Vector search");

    with_connection(move |conn| {
        let query_vector = Vector::from(query_embedding);
        let results = match document_ids {
            Some(ids) => diesel::sql_query(build_search_query(true))
                .bind::<pgvector::sql_types::Vector, _>(query_vector)
                .bind::<BigInt, _>(top_k)
                .bind::<Array<diesel::sql_types::Uuid>, _>(ids)
                .load::<ChunkMatch>(conn),
            None => diesel::sql_query(build_search_query(false))
                .bind::<pgvector::sql_types::Vector, _>(query_vector)
                .bind::<BigInt, _>(top_k)
                .load::<ChunkMatch>(conn),
        };

        results.map_err(|e| DbError::PgVectorError(format!("Failed to search embeddings: {}", e)))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_only_filters_when_asked() {
        let unfiltered = build_search_query(false);
        assert!(!unfiltered.contains("ANY($3)"));
        assert!(unfiltered.ends_with("LIMIT $2"));

        let filtered = build_search_query(true);
        assert!(filtered.contains("WHERE c.document_id = ANY($3)"));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        assert!(check_dimension(&[]).is_err());
        assert!(check_dimension(&[0.1; 3]).is_err());
        assert!(check_dimension(&vec![0.0; EMBEDDING_DIMENSION]).is_ok());
    }
}
