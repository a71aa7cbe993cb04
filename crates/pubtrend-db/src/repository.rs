//! Counts repository for SQLite.
//!
//! Three tables:
//! - `categories` - the seeded group/category taxonomy
//! - `publication_counts` - one row per `(category_id, year, month)`
//! - `sync_metadata` - key/value timestamps (`last_sync`, ...)
//!
//! Timestamps are stored as RFC 3339 text.

use chrono::{DateTime, Utc};
use pubtrend_core::error::AppError;
use pubtrend_core::models::{CategoryInfo, CountRow};
use pubtrend_core::sync::SyncMetadataKey;
use pubtrend_core::traits::CountsStore;
use sqlx::SqlitePool;
use tracing::debug;

/// Schema statements, applied in order by [`CountsRepository::migrate`].
/// Each statement must be executed separately.
const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        parent_category TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS publication_counts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_id TEXT NOT NULL,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
        count INTEGER NOT NULL CHECK (count >= 0),
        updated_at TEXT NOT NULL,
        UNIQUE (category_id, year, month)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_publication_counts_period ON publication_counts (year, month)",
    r#"CREATE TABLE IF NOT EXISTS sync_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
];

/// Repository for monthly publication counts.
///
/// # Examples
///
/// ```no_run
/// use sqlx::sqlite::SqlitePoolOptions;
/// use pubtrend_db::CountsRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePoolOptions::new()
///     .max_connections(5)
///     .connect("sqlite://pubtrend.db?mode=rwc")
///     .await?;
///
/// let repo = CountsRepository::new(pool);
/// repo.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CountsRepository {
    pool: SqlitePool,
}

impl CountsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the schema if it does not exist yet. Idempotent.
    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;
        }
        Ok(())
    }

    /// Inserts or replaces every row in one transaction.
    ///
    /// Returns the number of rows written. An empty slice is a no-op.
    pub async fn upsert_counts(&self, rows: &[CountRow]) -> Result<u64, AppError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;
        let mut written = 0u64;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO publication_counts (category_id, year, month, count, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (category_id, year, month)
                DO UPDATE SET
                    count = excluded.count,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&row.category_id)
            .bind(row.year)
            .bind(i64::from(row.month))
            .bind(i64::try_from(row.count).unwrap_or(i64::MAX))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;

            written += result.rows_affected();
        }

        tx.commit().await.map_err(AppError::DatabaseError)?;
        debug!(rows = written, "Upserted publication counts");

        Ok(written)
    }

    pub async fn record_sync_time(
        &self,
        key: SyncMetadataKey,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sync_metadata (key, value)
            VALUES (?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key.as_str())
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    /// Stored time for `key`, `None` if never recorded.
    ///
    /// # Errors
    ///
    /// `AppError::Generic` if the stored value is not RFC 3339.
    pub async fn last_sync_time(
        &self,
        key: SyncMetadataKey,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = ?")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;

        value
            .map(|v| {
                DateTime::parse_from_rfc3339(&v)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        AppError::Generic(format!("Bad timestamp for {}: {}", key.as_str(), e))
                    })
            })
            .transpose()
    }

    /// Every stored month of `category_id`, oldest first.
    pub async fn monthly_counts(&self, category_id: &str) -> Result<Vec<CountRow>, AppError> {
        let rows: Vec<CountDbRow> = sqlx::query_as(
            r#"
            SELECT category_id, year, month, count
            FROM publication_counts
            WHERE category_id = ?
            ORDER BY year, month
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(CountRow::from).collect())
    }

    /// Inserts groups and categories. Existing rows are left untouched.
    pub async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;

        for category in categories {
            sqlx::query(
                "INSERT OR IGNORE INTO categories (id, name, parent_category) VALUES (?, ?, ?)",
            )
            .bind(&category.id)
            .bind(&category.name)
            .bind(&category.parent_category)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;
        }

        tx.commit().await.map_err(AppError::DatabaseError)?;
        Ok(())
    }

    /// Seeded categories, groups first, then by id.
    pub async fn list_categories(&self) -> Result<Vec<CategoryInfo>, AppError> {
        let rows: Vec<CategoryDbRow> = sqlx::query_as(
            r#"
            SELECT id, name, parent_category
            FROM categories
            ORDER BY parent_category IS NOT NULL, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(CategoryInfo::from).collect())
    }

    /// Number of stored count rows.
    pub async fn count_rows(&self) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM publication_counts")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

impl CountsStore for CountsRepository {
    async fn upsert_counts(&self, rows: &[CountRow]) -> Result<u64, AppError> {
        CountsRepository::upsert_counts(self, rows).await
    }

    async fn record_sync_time(
        &self,
        key: SyncMetadataKey,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        CountsRepository::record_sync_time(self, key, at).await
    }

    async fn last_sync_time(
        &self,
        key: SyncMetadataKey,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        CountsRepository::last_sync_time(self, key).await
    }

    async fn monthly_counts(&self, category_id: &str) -> Result<Vec<CountRow>, AppError> {
        CountsRepository::monthly_counts(self, category_id).await
    }

    async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<(), AppError> {
        CountsRepository::seed_categories(self, categories).await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>, AppError> {
        CountsRepository::list_categories(self).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        CountsRepository::health_check(self).await
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct CountDbRow {
    category_id: String,
    year: i64,
    month: i64,
    count: i64,
}

impl From<CountDbRow> for CountRow {
    fn from(row: CountDbRow) -> Self {
        CountRow {
            category_id: row.category_id,
            year: i32::try_from(row.year).unwrap_or_default(),
            month: u32::try_from(row.month).unwrap_or_default(),
            count: u64::try_from(row.count).unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryDbRow {
    id: String,
    name: String,
    parent_category: Option<String>,
}

impl From<CategoryDbRow> for CategoryInfo {
    fn from(row: CategoryDbRow) -> Self {
        CategoryInfo {
            id: row.id,
            name: row.name,
            parent_category: row.parent_category,
        }
    }
}
