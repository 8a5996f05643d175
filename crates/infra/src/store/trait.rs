use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use stockroom_core::{PageResult, ProductId};
use stockroom_products::{Product, SearchCriteria, UpdateProduct};

/// Store operation error.
///
/// These are **infrastructure outcomes**: the conditions a backend reports
/// about a write or read. Deterministic domain failures (validation) are
/// rejected before the store is touched, and the caller-facing taxonomy
/// (not-found, version conflict) is derived from rows-affected counts at the
/// service layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write (sku collision). Authoritative —
    /// never reproduced by an in-memory pre-check.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The backing store failed in a way this core does not interpret
    /// (connectivity, pool exhaustion, corrupt row). Propagated unchanged.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Persistence port for the product catalog.
///
/// ## Conditional writes
///
/// `update_if_version_matches` and `soft_delete` must each execute as a
/// **single atomic statement** whose predicate carries both the key and the
/// state being assumed (`deleted_at IS NULL`, and for updates the expected
/// version). The check and the act are the same statement, so two racers on
/// the same expected version produce exactly one affected row between them —
/// no session locks, no read-modify-write window.
///
/// Both return the affected-row count (0 or 1) rather than an error: a zero
/// is ambiguous (missing vs. deleted vs. stale) and only the caller can
/// decide how to disambiguate, typically with [`ProductStore::exists_active`].
///
/// ## Uniqueness
///
/// The sku unique index is global — soft-deleted rows keep holding their sku.
/// [`ProductStore::exists_by_sku`] exists for a friendlier early error; the
/// index rejection surfacing as [`StoreError::DuplicateKey`] is the only
/// authoritative guard.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Persist a new product. Exactly one new row on success.
    async fn insert(&self, product: &Product) -> Result<Product, StoreError>;

    /// Point lookup by id. Returns soft-deleted records too; visibility is
    /// the caller's concern for lookups, unlike search.
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Advisory existence probe over all records, deleted included.
    async fn exists_by_sku(&self, sku: &str) -> Result<bool, StoreError>;

    /// True iff the record exists and is not soft-deleted.
    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError>;

    /// Conditional update: write `fields` and bump the version iff the record
    /// is active and at `fields.expected_version`. Returns rows affected.
    async fn update_if_version_matches(
        &self,
        id: ProductId,
        fields: &UpdateProduct,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Soft delete: set the deletion marker and bump the version iff the
    /// record is active. Returns rows affected; a second delete is always 0.
    async fn soft_delete(
        &self,
        id: ProductId,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Filtered, sorted, paginated search with global totals.
    async fn search(&self, criteria: &SearchCriteria) -> Result<PageResult<Product>, StoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, product: &Product) -> Result<Product, StoreError> {
        (**self).insert(product).await
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn exists_by_sku(&self, sku: &str) -> Result<bool, StoreError> {
        (**self).exists_by_sku(sku).await
    }

    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).exists_active(id).await
    }

    async fn update_if_version_matches(
        &self,
        id: ProductId,
        fields: &UpdateProduct,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        (**self)
            .update_if_version_matches(id, fields, updated_at)
            .await
    }

    async fn soft_delete(
        &self,
        id: ProductId,
        deleted_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        (**self).soft_delete(id, deleted_at).await
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<PageResult<Product>, StoreError> {
        (**self).search(criteria).await
    }
}
