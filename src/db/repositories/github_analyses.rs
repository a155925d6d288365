use crate::db::models::{AnalysisChanges, GithubAnalysis};
use crate::db::repositories::{with_connection, Pagination};
use crate::db::schema::github_analyses;
use crate::db::DbError;
use chrono::Utc;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Double, Nullable, Text};
use diesel::upsert::excluded;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Archive ordering options accepted by the `sortBy` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSort {
    #[default]
    Recent,
    Oldest,
    Name,
    Stars,
    Viewed,
}

impl ArchiveSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" | "created_at" | "newest" => Some(ArchiveSort::Recent),
            "oldest" => Some(ArchiveSort::Oldest),
            "name" | "repository_name" => Some(ArchiveSort::Name),
            "stars" => Some(ArchiveSort::Stars),
            "viewed" | "last_viewed_at" => Some(ArchiveSort::Viewed),
            _ => None,
        }
    }
}

/// Filter, sort and page for an archive listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveFilter {
    pub search: Option<String>,
    pub language: Option<String>,
    pub starred: Option<bool>,
    pub pinned: Option<bool>,
    pub collection: Option<String>,
    pub sort: ArchiveSort,
    pub pagination: Pagination,
}

/// Storage seam for the archive endpoints.
///
/// `GithubAnalysisRepository` talks to Postgres; `MemoryArchiveStore` keeps
/// rows in process for local runs without a database.
#[async_trait::async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn list(&self, filter: &ArchiveFilter) -> Result<Vec<GithubAnalysis>, DbError>;

    async fn find_by_url(&self, repository_url: &str) -> Result<Option<GithubAnalysis>, DbError>;

    /// Insert a new analysis or replace name/data of an existing one.
    async fn upsert(
        &self,
        repository_url: &str,
        repository_name: &str,
        analysis_data: serde_json::Value,
    ) -> Result<GithubAnalysis, DbError>;

    /// Returns the number of deleted rows.
    async fn delete_by_url(&self, repository_url: &str) -> Result<usize, DbError>;

    /// Returns `None` when no row has this URL.
    async fn update_by_url(
        &self,
        repository_url: &str,
        changes: AnalysisChanges,
    ) -> Result<Option<GithubAnalysis>, DbError>;
}

/// Escape LIKE wildcards so user input only ever matches literally
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for the `github_analyses` table
#[derive(Debug, Default)]
pub struct GithubAnalysisRepository;

impl GithubAnalysisRepository {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl ArchiveStore for GithubAnalysisRepository {
    async fn list(&self, filter: &ArchiveFilter) -> Result<Vec<GithubAnalysis>, DbError> {
        let filter = filter.clone();

        with_connection(move |conn| {
            let mut query = github_analyses::table.into_boxed();

            if let Some(search) = filter.search.as_deref() {
                let pattern = format!("%{}%", escape_like(search));
                query = query.filter(
                    github_analyses::repository_name
                        .ilike(pattern.clone())
                        .or(github_analyses::repository_url.ilike(pattern)),
                );
            }

            if let Some(language) = filter.language.as_deref() {
                query = query.filter(
                    sql::<Bool>("LOWER(analysis_data -> 'metadata' ->> 'language') = ")
                        .bind::<Text, _>(language.to_lowercase()),
                );
            }

            if let Some(starred) = filter.starred {
                query = query.filter(github_analyses::starred.eq(starred));
            }

            if let Some(pinned) = filter.pinned {
                query = query.filter(github_analyses::pinned.eq(pinned));
            }

            if let Some(collection) = filter.collection {
                query = query.filter(github_analyses::collections.contains(vec![collection]));
            }

            // Pinned rows always lead; the requested sort applies within each group
            query = query.order(github_analyses::pinned.desc());
            query = match filter.sort {
                ArchiveSort::Recent => query.then_order_by(github_analyses::created_at.desc()),
                ArchiveSort::Oldest => query.then_order_by(github_analyses::created_at.asc()),
                ArchiveSort::Name => {
                    query.then_order_by(sql::<Text>("LOWER(repository_name)").asc())
                }
                // Non-numeric star counts sort with the missing ones
                ArchiveSort::Stars => query.then_order_by(
                    sql::<Nullable<Double>>(
                        "CASE WHEN jsonb_typeof(analysis_data -> 'metadata' -> 'stars') = 'number' \
                         THEN (analysis_data -> 'metadata' ->> 'stars')::float8 END",
                    )
                    .desc()
                    .nulls_last(),
                ),
                ArchiveSort::Viewed => {
                    query.then_order_by(github_analyses::last_viewed_at.desc().nulls_last())
                }
            };

            query
                .then_order_by(github_analyses::id.asc())
                .limit(filter.pagination.limit)
                .offset(filter.pagination.offset)
                .load::<GithubAnalysis>(conn)
                .map_err(DbError::QueryError)
        })
        .await
    }

    async fn find_by_url(&self, repository_url: &str) -> Result<Option<GithubAnalysis>, DbError> {
        let url = repository_url.to_string();

        with_connection(move |conn| {
            github_analyses::table
                .filter(github_analyses::repository_url.eq(url))
                .first::<GithubAnalysis>(conn)
                .optional()
                .map_err(DbError::QueryError)
        })
        .await
    }

    async fn upsert(
        &self,
        repository_url: &str,
        repository_name: &str,
        analysis_data: serde_json::Value,
    ) -> Result<GithubAnalysis, DbError> {
        let row = GithubAnalysis::new(
            repository_url.to_string(),
            repository_name.to_string(),
            analysis_data,
        );

        with_connection(move |conn| {
            diesel::insert_into(github_analyses::table)
                .values(&row)
                .on_conflict(github_analyses::repository_url)
                .do_update()
                .set((
                    github_analyses::repository_name
                        .eq(excluded(github_analyses::repository_name)),
                    github_analyses::analysis_data.eq(excluded(github_analyses::analysis_data)),
                    github_analyses::updated_at.eq(Utc::now()),
                ))
                .get_result::<GithubAnalysis>(conn)
                .map_err(DbError::QueryError)
        })
        .await
    }

    async fn delete_by_url(&self, repository_url: &str) -> Result<usize, DbError> {
        let url = repository_url.to_string();

        with_connection(move |conn| {
            diesel::delete(
                github_analyses::table.filter(github_analyses::repository_url.eq(url)),
            )
            .execute(conn)
            .map_err(DbError::QueryError)
        })
        .await
    }

    async fn update_by_url(
        &self,
        repository_url: &str,
        changes: AnalysisChanges,
    ) -> Result<Option<GithubAnalysis>, DbError> {
        let url = repository_url.to_string();
        let changes = AnalysisChanges {
            updated_at: Some(Utc::now()),
            ..changes
        };

        with_connection(move |conn| {
            diesel::update(github_analyses::table.filter(github_analyses::repository_url.eq(url)))
                .set(&changes)
                .get_result::<GithubAnalysis>(conn)
                .optional()
                .map_err(DbError::QueryError)
        })
        .await
    }
}

/// In-process archive store with the same filter and ordering rules as the
/// Postgres repository.
#[derive(Debug, Default)]
pub struct MemoryArchiveStore {
    rows: RwLock<HashMap<String, GithubAnalysis>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing rows, keyed by `repository_url`.
    pub fn with_rows(rows: impl IntoIterator<Item = GithubAnalysis>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| (row.repository_url.clone(), row))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> DbError {
        DbError::Unknown(format!("Archive store lock poisoned: {}", e))
    }

    fn matches(row: &GithubAnalysis, filter: &ArchiveFilter) -> bool {
        if let Some(search) = filter.search.as_deref() {
            let needle = search.to_lowercase();
            if !row.repository_name.to_lowercase().contains(&needle)
                && !row.repository_url.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(language) = filter.language.as_deref() {
            match row.language() {
                Some(l) if l.to_lowercase() == language.to_lowercase() => {}
                _ => return false,
            }
        }
        if filter.starred.is_some_and(|s| s != row.starred) {
            return false;
        }
        if filter.pinned.is_some_and(|p| p != row.pinned) {
            return false;
        }
        if let Some(collection) = filter.collection.as_deref() {
            if !row.collections.iter().any(|c| c == collection) {
                return false;
            }
        }
        true
    }

    fn compare(a: &GithubAnalysis, b: &GithubAnalysis, sort: ArchiveSort) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        // Descending with missing values last
        fn desc_nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        b.pinned
            .cmp(&a.pinned)
            .then_with(|| match sort {
                ArchiveSort::Recent => b.created_at.cmp(&a.created_at),
                ArchiveSort::Oldest => a.created_at.cmp(&b.created_at),
                ArchiveSort::Name => a
                    .repository_name
                    .to_lowercase()
                    .cmp(&b.repository_name.to_lowercase()),
                ArchiveSort::Stars => desc_nulls_last(a.stars(), b.stars()),
                ArchiveSort::Viewed => desc_nulls_last(a.last_viewed_at, b.last_viewed_at),
            })
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait::async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn list(&self, filter: &ArchiveFilter) -> Result<Vec<GithubAnalysis>, DbError> {
        let rows = self.rows.read().map_err(Self::poisoned)?;
        let mut matched: Vec<GithubAnalysis> = rows
            .values()
            .filter(|row| Self::matches(row, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| Self::compare(a, b, filter.sort));

        let offset = usize::try_from(filter.pagination.offset).unwrap_or(0);
        let limit = usize::try_from(filter.pagination.limit).unwrap_or(0);
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_url(&self, repository_url: &str) -> Result<Option<GithubAnalysis>, DbError> {
        let rows = self.rows.read().map_err(Self::poisoned)?;
        Ok(rows.get(repository_url).cloned())
    }

    async fn upsert(
        &self,
        repository_url: &str,
        repository_name: &str,
        analysis_data: serde_json::Value,
    ) -> Result<GithubAnalysis, DbError> {
        let mut rows = self.rows.write().map_err(Self::poisoned)?;
        let row = rows
            .entry(repository_url.to_string())
            .and_modify(|row| {
                row.repository_name = repository_name.to_string();
                row.analysis_data = analysis_data.clone();
                row.updated_at = Utc::now();
            })
            .or_insert_with(|| {
                GithubAnalysis::new(
                    repository_url.to_string(),
                    repository_name.to_string(),
                    analysis_data.clone(),
                )
            });
        Ok(row.clone())
    }

    async fn delete_by_url(&self, repository_url: &str) -> Result<usize, DbError> {
        let mut rows = self.rows.write().map_err(Self::poisoned)?;
        Ok(usize::from(rows.remove(repository_url).is_some()))
    }

    async fn update_by_url(
        &self,
        repository_url: &str,
        changes: AnalysisChanges,
    ) -> Result<Option<GithubAnalysis>, DbError> {
        let mut rows = self.rows.write().map_err(Self::poisoned)?;
        Ok(rows.get_mut(repository_url).map(|row| {
            let changes = AnalysisChanges {
                updated_at: Some(Utc::now()),
                ..changes
            };
            changes.apply_to(row);
            row.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn row(url: &str, name: &str, language: &str, stars: i64, age_days: i64) -> GithubAnalysis {
        let mut row = GithubAnalysis::new(
            url.to_string(),
            name.to_string(),
            json!({ "metadata": { "language": language, "stars": stars } }),
        );
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        row.created_at = base - Duration::days(age_days);
        row
    }

    fn store() -> MemoryArchiveStore {
        MemoryArchiveStore::with_rows(vec![
            row("https://github.com/tokio-rs/axum", "axum", "Rust", 20000, 1),
            row("https://github.com/diesel-rs/diesel", "diesel", "Rust", 12000, 5),
            row("https://github.com/facebook/react", "react", "JavaScript", 220000, 3),
        ])
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn sort_parse_accepts_aliases() {
        assert_eq!(ArchiveSort::parse("recent"), Some(ArchiveSort::Recent));
        assert_eq!(ArchiveSort::parse("Stars"), Some(ArchiveSort::Stars));
        assert_eq!(ArchiveSort::parse("repository_name"), Some(ArchiveSort::Name));
        assert_eq!(ArchiveSort::parse("random"), None);
    }

    #[tokio::test]
    async fn memory_store_filters_by_language_case_insensitively() {
        let filter = ArchiveFilter {
            language: Some("rust".to_string()),
            ..Default::default()
        };
        let rows = store().list(&filter).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repository_name.as_str()).collect();
        assert_eq!(names, vec!["axum", "diesel"]);
    }

    #[tokio::test]
    async fn memory_store_sorts_by_stars_and_keeps_pinned_first() {
        let store = store();
        store
            .update_by_url(
                "https://github.com/diesel-rs/diesel",
                AnalysisChanges {
                    pinned: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let filter = ArchiveFilter {
            sort: ArchiveSort::Stars,
            ..Default::default()
        };
        let rows = store.list(&filter).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repository_name.as_str()).collect();
        assert_eq!(names, vec!["diesel", "react", "axum"]);
    }

    #[tokio::test]
    async fn memory_store_name_sort_ignores_case() {
        let store = MemoryArchiveStore::with_rows(vec![
            row("https://github.com/a/zebra", "Zebra", "Go", 1, 1),
            row("https://github.com/a/alpha", "alpha", "Go", 1, 2),
            row("https://github.com/a/mango", "Mango", "Go", 1, 3),
        ]);
        let filter = ArchiveFilter {
            sort: ArchiveSort::Name,
            ..Default::default()
        };
        let rows = store.list(&filter).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repository_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Mango", "Zebra"]);
    }

    #[tokio::test]
    async fn memory_store_non_numeric_stars_sort_last() {
        let mut texty = row("https://github.com/a/texty", "texty", "Go", 0, 1);
        texty.analysis_data = json!({ "metadata": { "language": "Go", "stars": "lots" } });
        let store = MemoryArchiveStore::with_rows(vec![
            texty,
            row("https://github.com/a/few", "few", "Go", 3, 2),
            row("https://github.com/a/many", "many", "Go", 900, 3),
        ]);
        let filter = ArchiveFilter {
            sort: ArchiveSort::Stars,
            ..Default::default()
        };
        let rows = store.list(&filter).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repository_name.as_str()).collect();
        assert_eq!(names, vec!["many", "few", "texty"]);
    }

    #[tokio::test]
    async fn memory_store_search_matches_url_or_name() {
        let filter = ArchiveFilter {
            search: Some("FACEBOOK".to_string()),
            ..Default::default()
        };
        let rows = store().list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].repository_name, "react");
    }

    #[tokio::test]
    async fn memory_store_pages_with_offset() {
        let filter = ArchiveFilter {
            pagination: Pagination {
                limit: 2,
                offset: 1,
            },
            ..Default::default()
        };
        let rows = store().list(&filter).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.repository_name.as_str()).collect();
        assert_eq!(names, vec!["react", "diesel"]);
    }

    #[tokio::test]
    async fn memory_store_update_missing_row_returns_none() {
        let result = store()
            .update_by_url(
                "https://github.com/nobody/nothing",
                AnalysisChanges {
                    starred: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn memory_store_upsert_replaces_analysis_but_keeps_user_fields() {
        let store = store();
        let url = "https://github.com/tokio-rs/axum";
        store
            .update_by_url(
                url,
                AnalysisChanges {
                    tags: Some(vec!["web".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let saved = store
            .upsert(url, "axum-renamed", json!({ "summary": "new" }))
            .await
            .unwrap();
        assert_eq!(saved.repository_name, "axum-renamed");
        assert_eq!(saved.tags, vec!["web".to_string()]);
        assert_eq!(saved.analysis_data["summary"], "new");
    }
}
