use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
pub mod models;
pub mod pgvector;
pub mod repositories;
pub mod schema;

// Embed PostgreSQL migrations
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/migrations");

const MAX_POOL_SIZE: u32 = 32;
const CONNECTION_TIMEOUT_SECS: u64 = 10;

// Database errors
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Query execution error: {0}")]
    QueryError(#[from] diesel::result::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("PgVector error: {0}")]
    PgVectorError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

// PostgreSQL pool type
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

// Global PostgreSQL pool
static PG_POOL: OnceLock<PgPool> = OnceLock::new();

/// Build the pool, run pending migrations and publish the pool globally.
///
/// Calling this more than once is harmless: later calls return early once a
/// pool has been stored.
pub async fn init_db(connection_string: &str) -> Result<(), DbError> {
    if connection_string.trim().is_empty() {
        return Err(DbError::ConfigError(
            "PostgreSQL connection string is empty".to_string(),
        ));
    }

    if PG_POOL.get().is_some() {
        tracing::debug!("PostgreSQL pool already initialized");
        return Ok(());
    }

    let start = Instant::now();
    tracing::info!("Starting database initialization");

    let conn_str = connection_string.to_string();
    let pool = tokio::task::spawn_blocking(move || -> Result<PgPool, DbError> {
        let manager = ConnectionManager::<PgConnection>::new(conn_str);
        let pool = Pool::builder()
            .max_size(MAX_POOL_SIZE)
            .connection_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .build(manager)
            .map_err(|e| {
                DbError::ConnectionError(format!("Failed to create connection pool: {}", e))
            })?;

        run_migrations_postgres(&pool)?;
        Ok(pool)
    })
    .await
    .map_err(|e| DbError::Unknown(format!("Task join error: {}", e)))??;

    // A concurrent initializer may have won the race; either pool is fine.
    if PG_POOL.set(pool).is_err() {
        tracing::debug!("PostgreSQL pool was stored by a concurrent initializer");
    }

    tracing::info!(elapsed = ?start.elapsed(), "Database initialization completed");
    Ok(())
}

// Run migrations on the PostgreSQL database
fn run_migrations_postgres(pool: &PgPool) -> Result<(), DbError> {
    let mut conn = pool.get().map_err(|e| {
        DbError::ConnectionError(format!("Failed to get connection from pool: {}", e))
    })?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DbError::MigrationError(format!("Failed to run migrations: {}", e)))?;
    tracing::info!(count = applied.len(), "Applied pending migrations");
    Ok(())
}

// Get a PostgreSQL connection from the pool
pub fn get_pg_connection() -> Result<PgPooledConnection, DbError> {
    PG_POOL
        .get()
        .ok_or(DbError::NotInitialized)?
        .get()
        .map_err(|e| DbError::ConnectionError(format!("Failed to get connection from pool: {}", e)))
}

/// True when the pool exists and can hand out a live connection.
pub async fn database_ready() -> bool {
    tokio::task::spawn_blocking(|| get_pg_connection().is_ok())
        .await
        .unwrap_or(false)
}
