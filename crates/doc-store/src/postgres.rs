use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Document, Result, StoreError, StorePath, Version, WriteIntent,
    store::{DocumentStore, validate_commit},
};

/// PostgreSQL-backed document store.
///
/// Every commit runs in one transaction. Each intent is applied with a
/// version-guarded statement; the first one that matches no row rolls the
/// whole transaction back and surfaces as `ConcurrencyConflict`.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let path: String = row.try_get("path")?;
        Ok(Document {
            path: StorePath::parse(path)?,
            version: Version::new(row.try_get("version")?),
            body: row.try_get("body")?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn read(&self, path: &StorePath) -> Result<Document> {
        let row = sqlx::query("SELECT path, version, body FROM documents WHERE path = $1")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_document(row),
            None => Ok(Document::absent(path.clone(), Version::initial())),
        }
    }

    async fn commit(&self, writes: Vec<WriteIntent>) -> Result<Vec<Version>> {
        validate_commit(&writes)?;

        let mut tx = self.pool.begin().await?;
        let mut versions = Vec::with_capacity(writes.len());

        for write in &writes {
            let next = write.expected.next();
            let body = write.body().cloned();

            let affected = if write.expected == Version::initial() {
                sqlx::query(
                    r#"
                    INSERT INTO documents (path, version, body, updated_at)
                    VALUES ($1, $2, $3, NOW())
                    ON CONFLICT (path) DO NOTHING
                    "#,
                )
                .bind(write.path.as_str())
                .bind(next.as_i64())
                .bind(body)
                .execute(&mut *tx)
                .await?
                .rows_affected()
            } else {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET version = $2, body = $3, updated_at = NOW()
                    WHERE path = $1 AND version = $4
                    "#,
                )
                .bind(write.path.as_str())
                .bind(next.as_i64())
                .bind(body)
                .bind(write.expected.as_i64())
                .execute(&mut *tx)
                .await?
                .rows_affected()
            };

            if affected == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM documents WHERE path = $1")
                        .bind(write.path.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;

                tracing::debug!(
                    path = %write.path,
                    expected = ?write.expected,
                    actual = ?actual,
                    "Commit rejected on version mismatch"
                );
                metrics::counter!("doc_store_conflicts_total").increment(1);
                return Err(StoreError::ConcurrencyConflict {
                    path: write.path.to_string(),
                    expected: write.expected,
                    actual: Version::new(actual.unwrap_or(0)),
                });
            }

            versions.push(next);
        }

        tx.commit().await?;
        metrics::counter!("doc_store_commits_total").increment(1);
        Ok(versions)
    }

    async fn list(&self, prefix: &StorePath) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT path, version, body
            FROM documents
            WHERE starts_with(path, $1) AND body IS NOT NULL
            ORDER BY path ASC
            "#,
        )
        .bind(format!("{}/", prefix.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }
}
