//! Postgres-backed product store.
//!
//! ## Schema
//!
//! One table keyed by `id`, with an **unconditional** unique index on `sku`
//! (soft-deleted rows keep holding their sku):
//!
//! ```sql
//! CREATE TABLE products (
//!     id          UUID PRIMARY KEY,
//!     sku         VARCHAR(100) NOT NULL,
//!     name        VARCHAR(200) NOT NULL,
//!     description TEXT,
//!     price       NUMERIC(19, 2) NOT NULL CHECK (price >= 0),
//!     stock       BIGINT NOT NULL CHECK (stock >= 0),
//!     category    VARCHAR(100),
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL,
//!     deleted_at  TIMESTAMPTZ,
//!     version     BIGINT NOT NULL,
//!     CONSTRAINT uk_products_sku UNIQUE (sku)
//! );
//! ```
//!
//! ## Concurrency
//!
//! Conditional mutations are single `UPDATE` statements whose `WHERE` carries
//! both the key and the assumed state (`deleted_at IS NULL`, and the expected
//! version for field updates). Postgres evaluates and applies them atomically,
//! so there is no read-before-write window to race through; a stale caller
//! simply affects zero rows.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateKey` | sku collision on insert or update |
//! | Database (other) | Any other | `Backend` | Check violations, unexpected database errors |
//! | PoolClosed / network / decode | N/A | `Backend` | Infrastructure failure, propagated unchanged |
//!
//! ## Thread Safety
//!
//! `PostgresProductStore` is `Send + Sync` and can be shared across tasks.
//! All operations go through the SQLx connection pool.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use tracing::{Span, instrument};
use uuid::Uuid;

use stockroom_core::{PageResult, ProductId};
use stockroom_products::{Product, SearchCriteria, SortDirection, SortField, UpdateProduct};

use super::r#trait::{ProductStore, StoreError};

/// Optional search filters as NULL-able bind predicates; shared by the count
/// and page queries so totals always agree with the returned slice.
const SEARCH_FILTER: &str = "($1::bool OR deleted_at IS NULL)
  AND ($2::text IS NULL OR lower(category) = lower($2))
  AND ($3::numeric IS NULL OR price >= $3)
  AND ($4::numeric IS NULL OR price <= $4)
  AND ($5::text IS NULL OR name ILIKE $5 OR description ILIKE $5)";

#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    /// Create a store backed by the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub async fn connect_from_env() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
        let pool = PgPool::connect(&url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[async_trait::async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(skip(self, product), fields(id = %product.id(), sku = product.sku()), err)]
    async fn insert(&self, product: &Product) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (
                id,
                sku,
                name,
                description,
                price,
                stock,
                category,
                created_at,
                updated_at,
                deleted_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING
                id, sku, name, description, price, stock, category,
                created_at, updated_at, deleted_at, version
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.description())
        .bind(product.price())
        .bind(product.stock())
        .bind(product.category())
        .bind(product.created_at())
        .bind(product.updated_at())
        .bind(product.deleted_at())
        .bind(product.version())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey(product.sku().to_string())
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;

        let stored = ProductRow::from_row(&row)
            .map_err(|e| StoreError::Backend(format!("failed to deserialize product row: {e}")))?;
        Ok(stored.into())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, sku, name, description, price, stock, category,
                created_at, updated_at, deleted_at, version
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        match row {
            Some(row) => {
                let stored = ProductRow::from_row(&row).map_err(|e| {
                    StoreError::Backend(format!("failed to deserialize product row: {e}"))
                })?;
                Ok(Some(stored.into()))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn exists_by_sku(&self, sku: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM products WHERE sku = $1)")
            .bind(sku)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_by_sku", e))
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists_active", e))
    }

    /// The compare-and-swap: both predicates (active, expected version) live
    /// in the same statement as the write, so a concurrent committer makes
    /// this affect zero rows instead of overwriting.
    #[instrument(
        skip(self, fields),
        fields(id = %id, expected_version = fields.expected_version),
        err
    )]
    async fn update_if_version_matches(
        &self,
        id: ProductId,
        fields: &UpdateProduct,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = $1,
                name = $2,
                price = $3,
                stock = $4,
                category = $5,
                updated_at = $6,
                version = version + 1
            WHERE id = $7 AND deleted_at IS NULL AND version = $8
            "#,
        )
        .bind(&fields.sku)
        .bind(&fields.name)
        .bind(fields.price)
        .bind(fields.stock)
        .bind(&fields.category)
        .bind(updated_at)
        .bind(id.as_uuid())
        .bind(fields.expected_version)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey(fields.sku.clone())
            } else {
                map_sqlx_error("update_if_version_matches", e)
            }
        })?;

        Span::current().record("rows_affected", result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn soft_delete(
        &self,
        id: ProductId,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = $1,
                version = version + 1
            WHERE id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(deleted_at)
        .bind(id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete", e))?;

        Span::current().record("rows_affected", result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, criteria), fields(page = criteria.page(), size = criteria.size()), err)]
    async fn search(&self, criteria: &SearchCriteria) -> Result<PageResult<Product>, StoreError> {
        let text_like = criteria.text().map(|t| format!("%{t}%"));

        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {SEARCH_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(criteria.include_deleted())
            .bind(criteria.category())
            .bind(criteria.min_price())
            .bind(criteria.max_price())
            .bind(text_like.as_deref())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?;

        // Sort column and direction come from matches over parsed enums, never
        // from raw caller input. `id` (UUIDv7, time-ordered) breaks ties so
        // pagination stays stable.
        let page_sql = format!(
            r#"
            SELECT
                id, sku, name, description, price, stock, category,
                created_at, updated_at, deleted_at, version
            FROM products
            WHERE {SEARCH_FILTER}
            ORDER BY {column} {direction}, id ASC
            LIMIT $6 OFFSET $7
            "#,
            column = sort_column(criteria.sort().field),
            direction = sort_keyword(criteria.sort().direction),
        );

        let rows = sqlx::query(&page_sql)
            .bind(criteria.include_deleted())
            .bind(criteria.category())
            .bind(criteria.min_price())
            .bind(criteria.max_price())
            .bind(text_like.as_deref())
            .bind(criteria.size() as i64)
            .bind(criteria.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_products", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = ProductRow::from_row(&row).map_err(|e| {
                StoreError::Backend(format!("failed to deserialize product row: {e}"))
            })?;
            items.push(stored.into());
        }

        Span::current().record("total_elements", total);
        Ok(PageResult::new(
            items,
            criteria.page(),
            criteria.size(),
            total as u64,
        ))
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::Name => "name",
        SortField::Sku => "sku",
        SortField::Price => "price",
        SortField::Stock => "stock",
    }
}

fn sort_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if let Some(code) = db_err.code() {
                if code.as_ref() == "23505" {
                    return StoreError::DuplicateKey(msg);
                }
            }
            StoreError::Backend(msg)
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row type

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i64,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            category: row.try_get("category")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product::from_stored(
            ProductId::from_uuid(row.id),
            row.sku,
            row.name,
            row.description,
            row.price,
            row.stock,
            row.category,
            row.created_at,
            row.updated_at,
            row.deleted_at,
            row.version,
        )
    }
}
