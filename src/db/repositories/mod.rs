pub mod documents;
pub mod github_analyses;

use crate::db::DbError;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Run blocking diesel work on a pooled connection without stalling the runtime
pub async fn with_connection<F, R>(f: F) -> Result<R, DbError>
where
    F: FnOnce(&mut diesel::pg::PgConnection) -> Result<R, DbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = crate::db::get_pg_connection()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| DbError::Unknown(format!("Task join error: {}", e)))?
}

/// Helper function for transactions
pub async fn in_transaction<F, R>(f: F) -> Result<R, DbError>
where
    F: FnOnce(&mut diesel::pg::PgConnection) -> Result<R, DbError> + Send + 'static,
    R: Send + 'static,
{
    with_connection(move |conn| conn.transaction(|tx_conn| f(tx_conn))).await
}

/// Limit/offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
